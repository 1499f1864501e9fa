//! JSFuck unwrapping.
//!
//! Full JSFuck decoding means symbolically evaluating the `[]()!+` algebra.
//! The common real-world shape is cheaper: the program is an eval wrapper
//! whose payload is an ordinary quoted literal buried in the symbol soup.
//! Oversized payloads skip evaluation outright and report a partial result.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{RestoreInput, Restoration, VmRestorer};

/// Beyond this size a full symbolic decode is not worth the cost.
const MAX_DECODE_LEN: usize = 100_000;

static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""((?:[^"\\]|\\.)+)"|'((?:[^'\\]|\\.)+)'"#).expect("quoted payload regex")
});

pub struct JsFuckRestorer;

impl VmRestorer for JsFuckRestorer {
    fn restore(&self, input: &RestoreInput<'_>) -> Restoration {
        if input.code.len() > MAX_DECODE_LEN {
            return Restoration::untouched(
                input.code,
                0.35,
                format!(
                    "jsfuck: payload of {} chars exceeds the evaluation budget, returning a partial result",
                    input.code.len()
                ),
            );
        }

        // Property names like "constructor" are quoted too; the payload is
        // the literal that reads as code, with length as the tiebreaker.
        let payload = QUOTED_RE
            .captures_iter(input.code)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str())
            .max_by_key(|s| (looks_like_code(s), s.len()));

        match payload {
            Some(payload) if !payload.trim().is_empty() => {
                debug!(len = payload.len(), "unwrapped quoted jsfuck payload");
                Restoration {
                    code: payload.to_string(),
                    confidence: if payload.len() > 16 { 0.6 } else { 0.5 },
                    warnings: Vec::new(),
                    unresolved: Vec::new(),
                }
            }
            _ => Restoration::untouched(
                input.code,
                0.3,
                "jsfuck: no directly-quoted payload; full symbolic evaluation not attempted",
            ),
        }
    }
}

fn looks_like_code(payload: &str) -> bool {
    payload.contains('(') || payload.contains('=') || payload.contains(';')
}

#[cfg(test)]
mod tests {
    use super::*;
    use descramble_core::model::VmFeatures;

    fn restore(code: &str) -> Restoration {
        let features = VmFeatures::default();
        JsFuckRestorer.restore(&RestoreInput {
            code,
            aggressive: false,
            features: &features,
            llm: None,
        })
    }

    #[test]
    fn unwraps_quoted_payload() {
        let code = r#"[]["filter"]["constructor"]("alert(1)")()"#;
        let restoration = restore(code);
        assert_eq!(restoration.code, "alert(1)");
        assert!(restoration.confidence >= 0.5);
    }

    #[test]
    fn pure_symbol_soup_is_left_alone() {
        let code = "[][(![]+[])[+[]]+([![]]+[][[]])[+!+[]]]";
        let restoration = restore(code);
        assert_eq!(restoration.code, code);
        assert_eq!(restoration.warnings.len(), 1);
        assert!(restoration.confidence <= 0.3);
    }

    #[test]
    fn oversized_payload_skips_evaluation() {
        let code = "[]()!+".repeat(20_000);
        let restoration = restore(&code);
        assert_eq!(restoration.code, code);
        assert!(restoration.confidence < 0.5);
        assert!(restoration.warnings[0].contains("budget"));
    }
}
