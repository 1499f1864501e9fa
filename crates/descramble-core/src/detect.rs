//! Obfuscation-type detection.
//!
//! Independent, order-irrelevant heuristics over the raw source string. Each
//! heuristic only ever adds a tag; a sample with no matching heuristic is
//! tagged `Unknown`. The packer-family signature checks live here so the
//! unpacking crates and the orchestrator share one source of truth.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::ObfuscationType;

static PACKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"eval[ ]*\([ ]*function[ ]*\([ ]*p[ ]*,[ ]*a[ ]*,[ ]*c[ ]*,[ ]*k[ ]*,[ ]*e[ ]*,")
        .expect("packer signature regex")
});

static DISPATCH_LOOP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"while[ \t]*\((?s:.){0,40}?\)[ \t]*\{\s*switch[ \t]*\(")
        .expect("dispatch loop regex")
});

static OPAQUE_GUARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"typeof\s+\w+\s*!==?\s*['"]undefined['"]"#).expect("opaque guard regex")
});

static DEAD_BRANCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"if\s*\(\s*(?:false|!1|!\[\])\s*\)").expect("dead branch regex"));

static ROTATION_IIFE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*function\s*\(\s*_0x\w+\s*,\s*_0x\w+\s*\)").expect("rotation iife regex")
});

static EVAL_WRAPPED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"eval\s*\(\s*(?:['"]|atob\s*\()"#).expect("eval wrapper regex")
});

static URL_ESCAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%[0-9a-fA-F]{2}").expect("url escape regex"));

/// Detects which obfuscation techniques a source string shows traces of.
pub fn detect_obfuscation(code: &str) -> BTreeSet<ObfuscationType> {
    let mut tags = BTreeSet::new();

    if code.contains("_0x") {
        tags.insert(ObfuscationType::JavascriptObfuscator);
    }
    if code.contains("__webpack_require__") || code.contains("webpackJsonp") {
        tags.insert(ObfuscationType::Webpack);
    }
    if code.len() > 1000 && !code.contains('\n') {
        tags.insert(ObfuscationType::Uglify);
    }
    if code.contains("eval") && code.contains("Function") {
        tags.insert(ObfuscationType::VmProtection);
    }
    if contains_invisible_unicode(code) {
        tags.insert(ObfuscationType::InvisibleUnicode);
    }
    if DISPATCH_LOOP_RE.is_match(code) {
        tags.insert(ObfuscationType::ControlFlowFlattening);
    }
    if OPAQUE_GUARD_RE.is_match(code) && code.contains("_0x") {
        tags.insert(ObfuscationType::OpaquePredicates);
    }
    if DEAD_BRANCH_RE.is_match(code) {
        tags.insert(ObfuscationType::DeadCodeInjection);
    }
    if ROTATION_IIFE_RE.is_match(code) && code.contains("push") && code.contains("shift") {
        tags.insert(ObfuscationType::StringArrayRotation);
    }
    if is_jsfuck_body(code) {
        tags.insert(ObfuscationType::JsFuck);
    }
    if EVAL_WRAPPED_RE.is_match(code) {
        tags.insert(ObfuscationType::EvalObfuscation);
    }
    if contains_hex_escape(code) {
        tags.insert(ObfuscationType::HexEncoding);
    }
    if (code.contains("atob") || code.contains("btoa")) && longest_base64_run(code) >= 20 {
        tags.insert(ObfuscationType::Base64Encoding);
    }
    if is_packed(code) {
        tags.insert(ObfuscationType::Packer);
    }
    if is_aaencoded(code) {
        tags.insert(ObfuscationType::AaEncode);
    }
    if is_url_encoded(code) {
        tags.insert(ObfuscationType::UrlEncoded);
    }

    if tags.is_empty() {
        tags.insert(ObfuscationType::Unknown);
    }
    tags
}

/// Canonical `eval(function(p,a,c,k,e,` packer signature.
pub fn is_packed(code: &str) -> bool {
    PACKER_RE.is_match(code)
}

/// AAEncode opens with a katakana emoticon sigil chain.
pub fn is_aaencoded(code: &str) -> bool {
    code.contains("ﾟωﾟﾉ") || code.contains("ﾟДﾟ") || code.contains("ﾟΘﾟ")
}

/// Percent-escape density gate: at least three `%XX` escapes making up a
/// tenth of the body.
pub fn is_url_encoded(code: &str) -> bool {
    if code.is_empty() {
        return false;
    }
    let escapes = URL_ESCAPE_RE.find_iter(code).count();
    escapes >= 3 && (escapes * 3) as f64 / code.len() as f64 >= 0.1
}

fn contains_invisible_unicode(code: &str) -> bool {
    code.chars().any(|c| {
        matches!(c,
            '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{FEFF}')
    })
}

fn contains_hex_escape(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.windows(4).any(|w| {
        w[0] == b'\\' && w[1] == b'x' && w[2].is_ascii_hexdigit() && w[3].is_ascii_hexdigit()
    })
}

fn is_jsfuck_body(code: &str) -> bool {
    let body: Vec<char> = code.chars().filter(|c| !c.is_whitespace()).collect();
    body.len() >= 10 && body.iter().all(|c| matches!(c, '[' | ']' | '(' | ')' | '!' | '+'))
}

fn longest_base64_run(code: &str) -> usize {
    let mut max = 0usize;
    let mut run = 0usize;
    for b in code.bytes() {
        if b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=' {
            run += 1;
        } else {
            max = max.max(run);
            run = 0;
        }
    }
    max.max(run)
}

/// Shannon entropy over the raw bytes. High-entropy bodies usually mean
/// packed or encoded payloads rather than hand-written source.
pub fn shannon_entropy(code: &str) -> f64 {
    let data = code.as_bytes();
    if data.is_empty() {
        return 0.0;
    }
    let mut freq = [0usize; 256];
    for &b in data {
        freq[b as usize] += 1;
    }
    let len = data.len() as f64;
    let mut out = 0.0;
    for &c in freq.iter() {
        if c == 0 {
            continue;
        }
        let p = c as f64 / len;
        out -= p * p.log2();
    }
    out
}

/// Fraction of identifiers that look machine-generated (`_0x` prefixes,
/// digit-heavy names, uncommon single letters).
pub fn mangled_identifier_ratio(code: &str) -> f64 {
    let mut mangled = 0usize;
    let mut total = 0usize;
    for word in code.split(|c: char| !c.is_alphanumeric() && c != '_' && c != '$') {
        let mut chars = word.chars();
        let Some(first) = chars.next() else { continue };
        if !first.is_alphabetic() && first != '_' && first != '$' {
            continue;
        }
        total += 1;
        if word.starts_with("_0x")
            || (word.len() == 1 && !matches!(word, "i" | "j" | "k" | "x" | "y" | "z"))
            || (word.len() > 5
                && word.chars().filter(|c| c.is_ascii_digit()).count() > word.len() / 2)
        {
            mangled += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        mangled as f64 / total as f64
    }
}
