//! String-literal escape decoding.
//!
//! The parser already cooks `\xHH`/`\uHHHH` escapes into the literal's
//! value; the printer only keeps emitting them because the raw source text
//! is preserved on the node. Dropping the raw text for literals that carry
//! such escapes makes the printer emit the decoded characters.

use swc_core::ecma::ast::Str;
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use descramble_core::ast;
use descramble_core::error::StageError;

pub fn decode_string_literals(code: &str) -> Result<String, StageError> {
    let (cm, mut program) = ast::parse_program(code)?;
    program.visit_mut_with(&mut EscapeDecoder);
    ast::emit_program(&cm, &program)
}

struct EscapeDecoder;

impl VisitMut for EscapeDecoder {
    fn visit_mut_str(&mut self, node: &mut Str) {
        node.visit_mut_children_with(self);
        if let Some(raw) = &node.raw {
            if raw.contains("\\x") || raw.contains("\\u") {
                node.raw = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_hex_escapes() {
        let out = decode_string_literals(r#"var s = "\x68\x69";"#).unwrap();
        assert!(out.contains(r#""hi""#));
        assert!(!out.contains("\\x68"));
    }

    #[test]
    fn resolves_unicode_escapes() {
        let out = decode_string_literals(r#"var s = "\u0068\u0065\u0079";"#).unwrap();
        assert!(out.contains(r#""hey""#));
    }

    #[test]
    fn plain_strings_keep_their_text() {
        let out = decode_string_literals(r#"var s = 'already fine';"#).unwrap();
        assert!(out.contains("'already fine'"));
    }

    #[test]
    fn parse_error_is_reported() {
        assert!(decode_string_literals("var s = \"unterminated;").is_err());
    }
}
