//! Percent-encoding recovery.
//!
//! Some droppers ship their second stage as one long percent-encoded string.
//! Decoding is a plain byte walk; a malformed escape keeps its original text
//! rather than failing the whole payload.

use tracing::warn;

use crate::UnpackResult;

pub struct UrlDecoder;

impl UrlDecoder {
    /// Requires a minimum density of `%XX` escapes so that CSS-style
    /// percent signs do not trigger a decode.
    pub fn detect(code: &str) -> bool {
        descramble_core::detect::is_url_encoded(code)
    }

    pub fn deobfuscate(code: &str) -> UnpackResult {
        if !Self::detect(code) {
            return UnpackResult::unchanged(code);
        }

        let mut bytes = Vec::with_capacity(code.len());
        let raw = code.as_bytes();
        let mut i = 0usize;
        while i < raw.len() {
            if raw[i] == b'%' && i + 2 < raw.len() {
                let hi = hex_value(raw[i + 1]);
                let lo = hex_value(raw[i + 2]);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    bytes.push(hi << 4 | lo);
                    i += 3;
                    continue;
                }
            }
            bytes.push(raw[i]);
            i += 1;
        }

        match String::from_utf8(bytes) {
            Ok(decoded) if decoded != code => {
                UnpackResult { code: decoded, changed: true, warnings: Vec::new() }
            }
            Ok(_) => UnpackResult::unchanged(code),
            Err(err) => {
                warn!(error = %err, "percent-decoded bytes are not valid utf-8");
                let mut result = UnpackResult::unchanged(code);
                result.warnings.push("urlencode: decoded payload is not valid UTF-8".into());
                result
            }
        }
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_dense_escapes() {
        let result = UrlDecoder::deobfuscate("%61%6c%65%72%74%28%31%29");
        assert!(result.changed);
        assert_eq!(result.code, "alert(1)");
    }

    #[test]
    fn sparse_percent_signs_are_not_decoded() {
        let css = "width: 100%; height: 50%";
        let result = UrlDecoder::deobfuscate(css);
        assert!(!result.changed);
        assert_eq!(result.code, css);
    }

    #[test]
    fn malformed_escape_keeps_original_text() {
        let result = UrlDecoder::deobfuscate("%61%6c%65%72%74%zz%28%29");
        assert!(result.changed);
        assert_eq!(result.code, "alert%zz()");
    }

    #[test]
    fn invalid_utf8_payload_is_returned_unchanged() {
        let code = "%ff%fe%61%62%63%64%65%66";
        let result = UrlDecoder::deobfuscate(code);
        assert!(!result.changed);
        assert_eq!(result.code, code);
        assert_eq!(result.warnings.len(), 1);
    }
}
