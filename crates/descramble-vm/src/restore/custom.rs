//! Custom-VM handling.
//!
//! Unknown interpreters cannot be reversed generically. Basic mode applies
//! only semantics-preserving scrubbing; aggressive mode with a configured
//! collaborator asks it for the VM structure and a simplified rendition,
//! and accepts whatever subset of that it gets back.

use swc_core::common::{SyntaxContext, DUMMY_SP};
use swc_core::ecma::ast::{Expr, Ident, Lit, Stmt, UnaryExpr, UnaryOp};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};
use tracing::{debug, warn};

use descramble_core::ast;
use descramble_core::llm::{self, prompts, ChatOptions};

use super::{RestoreInput, Restoration, VmRestorer};

pub struct CustomRestorer;

impl VmRestorer for CustomRestorer {
    fn restore(&self, input: &RestoreInput<'_>) -> Restoration {
        match (input.aggressive, input.llm) {
            (true, Some(client)) => ai_assisted(input, client),
            _ => basic_scrub(input),
        }
    }
}

/// Generic cleanup: drop `debugger` bait, collapse `!!x`, fold `void 0`.
/// No logic recovery is attempted.
fn basic_scrub(input: &RestoreInput<'_>) -> Restoration {
    match scrub_tree(input.code) {
        Ok(code) => Restoration {
            code,
            confidence: 0.45,
            warnings: vec![
                "custom vm: applied generic cleanup only; interpreter logic was not recovered"
                    .into(),
            ],
            unresolved: Vec::new(),
        },
        Err(err) => Restoration::untouched(
            input.code,
            0.3,
            format!("custom vm: cleanup skipped ({err})"),
        ),
    }
}

fn scrub_tree(code: &str) -> Result<String, descramble_core::StageError> {
    let (cm, mut program) = ast::parse_program(code)?;
    program.visit_mut_with(&mut Scrub);
    ast::emit_program(&cm, &program)
}

struct Scrub;

impl VisitMut for Scrub {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        expr.visit_mut_children_with(self);
        let replacement = match expr {
            // !!x keeps only the operand; the boolean coercion is dropped.
            Expr::Unary(UnaryExpr { op: UnaryOp::Bang, arg, .. }) => match &**arg {
                Expr::Unary(UnaryExpr { op: UnaryOp::Bang, arg: inner, .. }) => {
                    Some((**inner).clone())
                }
                _ => None,
            },
            Expr::Unary(UnaryExpr { op: UnaryOp::Void, arg, .. }) => {
                if matches!(&**arg, Expr::Lit(Lit::Num(n)) if n.value == 0.0) {
                    Some(Expr::Ident(Ident {
                        span: DUMMY_SP,
                        ctxt: SyntaxContext::empty(),
                        sym: "undefined".into(),
                        optional: false,
                    }))
                } else {
                    None
                }
            }
            _ => None,
        };
        if let Some(replacement) = replacement {
            *expr = replacement;
        }
    }

    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        stmts.visit_mut_children_with(self);
        stmts.retain(|stmt| !matches!(stmt, Stmt::Debugger(_)));
    }
}

fn ai_assisted(input: &RestoreInput<'_>, client: &dyn llm::LlmClient) -> Restoration {
    let messages = prompts::vm_analysis(input.code, input.features);
    let response = match client.chat(&messages, &ChatOptions::default()) {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "vm analysis transport failed");
            let mut restoration = basic_scrub(input);
            restoration.warnings.push(format!("custom vm: collaborator unavailable ({err})"));
            return restoration;
        }
    };

    let Some(analysis) = llm::extract_json(&response.content) else {
        // Analysis-only answer: keep the code, keep what was learned.
        debug!("collaborator returned prose without JSON");
        let summary: String = response.content.chars().take(240).collect();
        let mut restoration = basic_scrub(input);
        restoration
            .warnings
            .push(format!("custom vm: collaborator sent analysis only: {summary}"));
        return restoration;
    };

    let mut warnings = Vec::new();
    if let Some(approach) = analysis.get("restorationApproach").and_then(|v| v.as_str()) {
        if !approach.is_empty() {
            warnings.push(format!("custom vm: restoration approach: {approach}"));
        }
    }
    if let Some(map) = analysis.get("instructionMap").and_then(|v| v.as_object()) {
        if !map.is_empty() {
            warnings.push(format!("custom vm: collaborator mapped {} opcodes", map.len()));
        }
    }
    if let Some(structure) = analysis.get("vmStructure") {
        if let Some(pc) = structure.get("pcVar").and_then(|v| v.as_str()) {
            if !pc.is_empty() {
                warnings.push(format!("custom vm: program counter variable is `{pc}`"));
            }
        }
    }

    match analysis.get("simplifiedLogic").and_then(|v| v.as_str()) {
        Some(logic) if !logic.trim().is_empty() => Restoration {
            code: logic.to_string(),
            confidence: 0.65,
            warnings,
            unresolved: Vec::new(),
        },
        _ => {
            let mut restoration = basic_scrub(input);
            warnings.push("custom vm: collaborator offered no simplified logic".into());
            restoration.warnings.extend(warnings);
            restoration
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use descramble_core::llm::{ChatMessage, ChatResponse, LlmClient};
    use descramble_core::model::VmFeatures;

    struct CannedLlm(&'static str);

    impl LlmClient for CannedLlm {
        fn chat(&self, _messages: &[ChatMessage], _options: &ChatOptions) -> Result<ChatResponse> {
            Ok(ChatResponse { content: self.0.to_string() })
        }
    }

    struct BrokenLlm;

    impl LlmClient for BrokenLlm {
        fn chat(&self, _messages: &[ChatMessage], _options: &ChatOptions) -> Result<ChatResponse> {
            anyhow::bail!("transport down")
        }
    }

    fn restore_with(code: &str, aggressive: bool, llm: Option<&dyn LlmClient>) -> Restoration {
        let features = VmFeatures::default();
        CustomRestorer.restore(&RestoreInput { code, aggressive, features: &features, llm })
    }

    #[test]
    fn basic_mode_scrubs_but_keeps_logic() {
        let code = "debugger; var x = !!flag; var y = void 0; run(x, y);";
        let restoration = restore_with(code, false, None);
        assert!(!restoration.code.contains("debugger"));
        assert!(!restoration.code.contains("!!"));
        assert!(restoration.code.contains("undefined"));
        assert!(restoration.code.contains("run(x, y)"));
        assert!(restoration.confidence < 0.5);
    }

    #[test]
    fn ai_mode_uses_simplified_logic() {
        let response = r#"{"vmStructure":{"interpreterLoop":"while","bytecodeVar":"ops","pcVar":"pc","stackVar":"st"},"instructionMap":{"0":"push"},"restorationApproach":"trace the loop","simplifiedLogic":"console.log('restored');"}"#;
        let llm = CannedLlm(response);
        let restoration = restore_with("while(1){switch(ops[pc++]){}}", true, Some(&llm));
        assert_eq!(restoration.code, "console.log('restored');");
        assert!(restoration.confidence > 0.6);
        assert!(restoration.warnings.iter().any(|w| w.contains("pc")));
    }

    #[test]
    fn analysis_only_response_keeps_code() {
        let llm = CannedLlm("This VM is a stack machine with twelve opcodes.");
        let restoration = restore_with("var keep = 1;", true, Some(&llm));
        assert!(restoration.code.contains("keep"));
        assert!(restoration.warnings.iter().any(|w| w.contains("analysis only")));
    }

    #[test]
    fn transport_failure_degrades_to_scrub() {
        let restoration = restore_with("debugger; var keep = 1;", true, Some(&BrokenLlm));
        assert!(restoration.code.contains("keep"));
        assert!(restoration.warnings.iter().any(|w| w.contains("unavailable")));
    }

    #[test]
    fn fenced_json_is_accepted() {
        let llm = CannedLlm("```json\n{\"simplifiedLogic\": \"var ok = true;\"}\n```");
        let restoration = restore_with("var x = 0;", true, Some(&llm));
        assert_eq!(restoration.code, "var ok = true;");
    }
}
