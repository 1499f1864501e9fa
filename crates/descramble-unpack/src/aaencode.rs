//! AAEncode ("Japanese emoticon") unwrapping.
//!
//! AAEncode rewrites a program into katakana emoticon sigils that rebuild
//! the original source character by character at runtime. The wrapper embeds
//! the payload it feeds to the constructed `Function`; recovering that quoted
//! payload is enough to read the program without evaluating anything.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::UnpackResult;

// The payload is the longest quoted literal inside the sigil wrapper.
static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'((?:[^'\\]|\\.)+)'|"((?:[^"\\]|\\.)+)""#).expect("quoted literal regex")
});

pub struct AaDecoder;

impl AaDecoder {
    pub fn detect(code: &str) -> bool {
        descramble_core::detect::is_aaencoded(code)
    }

    pub fn deobfuscate(code: &str) -> UnpackResult {
        if !Self::detect(code) {
            return UnpackResult::unchanged(code);
        }
        let payload = QUOTED_RE
            .captures_iter(code)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str())
            .max_by_key(|s| s.len());

        match payload {
            Some(payload) if !payload.trim().is_empty() => UnpackResult {
                code: unescape(payload),
                changed: true,
                warnings: Vec::new(),
            },
            _ => {
                warn!("aaencode wrapper without an extractable payload");
                let mut result = UnpackResult::unchanged(code);
                result.warnings.push("aaencode: no quoted payload found in wrapper".into());
                result
            }
        }
    }
}

fn unescape(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len());
    let mut chars = payload.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAPPER: &str = "ﾟωﾟﾉ= /｀ｍ´）ﾉ ~┻━┻   //*´∇｀*/ ['_']; o=(ﾟｰﾟ)  =_=3; \
        (ﾟДﾟ) ['_'] ( (ﾟДﾟ) ['_'] ('alert(\"hi\")') ) ('_');";

    #[test]
    fn detects_sigil_opener() {
        assert!(AaDecoder::detect(WRAPPER));
        assert!(!AaDecoder::detect("var a = 1;"));
    }

    #[test]
    fn extracts_the_quoted_payload() {
        let result = AaDecoder::deobfuscate(WRAPPER);
        assert!(result.changed);
        assert_eq!(result.code, "alert(\"hi\")");
    }

    #[test]
    fn wrapper_without_payload_is_returned_unchanged() {
        let code = "ﾟωﾟﾉ= /｀ｍ´）ﾉ ~┻━┻";
        let result = AaDecoder::deobfuscate(code);
        assert!(!result.changed);
        assert_eq!(result.code, code);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn plain_code_is_untouched() {
        let result = AaDecoder::deobfuscate("console.log(1)");
        assert!(!result.changed);
    }
}
