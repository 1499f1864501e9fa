//! Output quality scoring.
//!
//! `readability_score` is an additive 0..=100 heuristic over surface traits
//! of the produced code. `blend_confidence` folds the stage success ratio
//! and the readability into one 0..=1 figure used to gate how much the
//! result should be trusted.

use crate::model::Transformation;

pub fn readability_score(code: &str) -> u8 {
    let mut score = 0u32;
    if code.contains('\n') {
        score += 20;
    }
    if code.contains("//") || code.contains("/*") {
        score += 10;
    }
    if mean_identifier_length(code) > 3.0 {
        score += 30;
    }
    if non_whitespace_density(code) < 0.8 {
        score += 20;
    }
    if !code.contains("_0x") && !code.contains("\\x") {
        score += 20;
    }
    score.min(100) as u8
}

pub fn blend_confidence(transformations: &[Transformation], readability: u8) -> f64 {
    let total = transformations.len();
    let ratio = if total == 0 {
        0.0
    } else {
        transformations.iter().filter(|t| t.success).count() as f64 / total as f64
    };
    (0.6 * ratio + 0.4 * f64::from(readability) / 100.0).clamp(0.0, 1.0)
}

fn mean_identifier_length(code: &str) -> f64 {
    let mut total = 0usize;
    let mut count = 0usize;
    for word in code.split(|c: char| !c.is_alphanumeric() && c != '_' && c != '$') {
        let mut chars = word.chars();
        match chars.next() {
            Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {
                total += word.len();
                count += 1;
            }
            _ => {}
        }
    }
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

fn non_whitespace_density(code: &str) -> f64 {
    if code.is_empty() {
        return 0.0;
    }
    let dense = code.chars().filter(|c| !c.is_whitespace()).count();
    dense as f64 / code.chars().count() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Transformation;

    #[test]
    fn readable_source_scores_high() {
        let code = "// greeting helper\nfunction greet(name) {\n  return 'hello ' + name;\n}\n";
        assert!(readability_score(code) >= 80);
    }

    #[test]
    fn minified_hex_soup_scores_low() {
        let code = "var _0xa=['\\x68\\x69'];_0xb(_0xa[0]);";
        assert!(readability_score(code) <= 30);
    }

    #[test]
    fn score_never_exceeds_hundred() {
        let code = "// c\nlet counter = 1;\nlet increment = 2;\n";
        assert!(readability_score(code) <= 100);
    }

    #[test]
    fn confidence_blends_success_ratio_and_readability() {
        let transformations = vec![
            Transformation::succeeded("a", "ok"),
            Transformation::failed("b", "bad"),
        ];
        let confidence = blend_confidence(&transformations, 50);
        assert!((confidence - (0.6 * 0.5 + 0.4 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn confidence_is_clamped() {
        let all_good = vec![Transformation::succeeded("a", "ok")];
        let confidence = blend_confidence(&all_good, 100);
        assert!(confidence <= 1.0);
        assert!(blend_confidence(&[], 0) >= 0.0);
    }
}
