//! Shared swc parse/emit plumbing.
//!
//! Every AST stage follows the same shape: parse a fresh tree, transform it,
//! print it back, drop the tree. The source map never outlives the stage, so
//! these helpers hand both back together and let the caller scope them.

use swc_core::common::sync::Lrc;
use swc_core::common::{FileName, SourceMap};
use swc_core::ecma::ast::Program;
use swc_core::ecma::codegen::text_writer::JsWriter;
use swc_core::ecma::codegen::Emitter;
use swc_core::ecma::parser::{EsSyntax, Parser, StringInput, Syntax};

use crate::error::StageError;

pub fn parse_program(code: &str) -> Result<(Lrc<SourceMap>, Program), StageError> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Custom("input.js".into()).into(), code.to_string());
    let mut parser = Parser::new(Syntax::Es(EsSyntax::default()), StringInput::from(&*fm), None);
    let parsed = parser.parse_program();
    let recovered = parser.take_errors();
    match parsed {
        // The parser recovers from some syntax errors; a stage must not
        // transform a tree it only half-understood.
        Ok(program) if recovered.is_empty() => Ok((cm, program)),
        Ok(_) => Err(StageError::Parse(format!("{:?}", recovered[0].kind()))),
        Err(err) => Err(StageError::Parse(format!("{:?}", err.kind()))),
    }
}

pub fn emit_program(cm: &Lrc<SourceMap>, program: &Program) -> Result<String, StageError> {
    let mut buf = Vec::new();
    {
        let writer = Box::new(JsWriter::new(cm.clone(), "\n", &mut buf, None));
        let mut emitter = Emitter {
            cfg: Default::default(),
            cm: cm.clone(),
            comments: None,
            wr: writer,
        };
        emitter.emit_program(program).map_err(|err| StageError::Codegen(err.to_string()))?;
    }
    String::from_utf8(buf).map_err(|err| StageError::Codegen(err.to_string()))
}

/// Parse-and-print without transformation. Used to normalise output of
/// string-level stages so every pipeline result is printed from an AST.
pub fn reprint(code: &str) -> Result<String, StageError> {
    let (cm, program) = parse_program(code)?;
    emit_program(&cm, &program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_reprints_a_script() {
        let out = reprint("var a = 1; function f() { return a; }").unwrap();
        assert!(out.contains("var a = 1"));
        assert!(out.contains("function f()"));
    }

    #[test]
    fn parse_failure_is_a_stage_error() {
        let err = reprint("var = = 1;").unwrap_err();
        assert!(matches!(err, StageError::Parse(_)));
    }
}
