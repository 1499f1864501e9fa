//! Constant folding and literal-branch elimination.

use swc_core::common::DUMMY_SP;
use swc_core::ecma::ast::{BinExpr, BinaryOp, EmptyStmt, Expr, Lit, Number, Stmt, Str};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use descramble_core::ast;
use descramble_core::error::StageError;

pub fn fold_constants(code: &str) -> Result<String, StageError> {
    let (cm, mut program) = ast::parse_program(code)?;
    program.visit_mut_with(&mut Folder);
    ast::emit_program(&cm, &program)
}

struct Folder;

impl VisitMut for Folder {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        expr.visit_mut_children_with(self);
        let replacement = match expr {
            Expr::Bin(bin) => fold_binary(bin),
            Expr::Cond(cond) => match &*cond.test {
                Expr::Lit(Lit::Bool(test)) => {
                    let taken = if test.value { &cond.cons } else { &cond.alt };
                    Some((**taken).clone())
                }
                _ => None,
            },
            _ => None,
        };
        if let Some(replacement) = replacement {
            *expr = replacement;
        }
    }

    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        stmt.visit_mut_children_with(self);
        let replacement = match stmt {
            Stmt::If(if_stmt) => match &*if_stmt.test {
                Expr::Lit(Lit::Bool(test)) => {
                    let taken = if test.value {
                        Some((*if_stmt.cons).clone())
                    } else {
                        if_stmt.alt.as_deref().cloned()
                    };
                    Some(taken.unwrap_or(Stmt::Empty(EmptyStmt { span: DUMMY_SP })))
                }
                _ => None,
            },
            _ => None,
        };
        if let Some(replacement) = replacement {
            *stmt = replacement;
        }
    }
}

fn fold_binary(bin: &BinExpr) -> Option<Expr> {
    match (&*bin.left, &*bin.right) {
        (Expr::Lit(Lit::Num(left)), Expr::Lit(Lit::Num(right))) => {
            fold_numeric(bin.op, left.value, right.value)
        }
        (Expr::Lit(Lit::Str(left)), Expr::Lit(Lit::Str(right))) if bin.op == BinaryOp::Add => {
            Some(Expr::Lit(Lit::Str(Str {
                span: DUMMY_SP,
                value: format!("{}{}", left.value, right.value).into(),
                raw: None,
            })))
        }
        _ => None,
    }
}

fn fold_numeric(op: BinaryOp, left: f64, right: f64) -> Option<Expr> {
    let value = match op {
        BinaryOp::Add => left + right,
        BinaryOp::Sub => left - right,
        BinaryOp::Mul => left * right,
        // Division and modulo by zero stay unfolded so the Infinity/NaN
        // semantics remain visible in the output.
        BinaryOp::Div if right != 0.0 => left / right,
        BinaryOp::Mod if right != 0.0 => left % right,
        BinaryOp::Exp => left.powf(right),
        BinaryOp::BitOr => f64::from(to_int32(left) | to_int32(right)),
        BinaryOp::BitAnd => f64::from(to_int32(left) & to_int32(right)),
        BinaryOp::BitXor => f64::from(to_int32(left) ^ to_int32(right)),
        BinaryOp::LShift => f64::from(to_int32(left) << (to_uint32(right) & 31)),
        BinaryOp::RShift => f64::from(to_int32(left) >> (to_uint32(right) & 31)),
        BinaryOp::ZeroFillRShift => f64::from(to_uint32(left) >> (to_uint32(right) & 31)),
        _ => return None,
    };
    if value.is_nan() || value.is_infinite() {
        return None;
    }
    Some(Expr::Lit(Lit::Num(Number { span: DUMMY_SP, value, raw: None })))
}

fn to_int32(value: f64) -> i32 {
    value as i64 as i32
}

fn to_uint32(value: f64) -> u32 {
    value as i64 as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_arithmetic() {
        let out = fold_constants("var a = 2 + 3 * 4;").unwrap();
        assert!(out.contains("14"));
        assert!(!out.contains("2 +"));
    }

    #[test]
    fn folds_string_concatenation() {
        let out = fold_constants(r#"var s = "he" + "llo";"#).unwrap();
        assert!(out.contains(r#""hello""#));
    }

    #[test]
    fn division_by_zero_stays() {
        let out = fold_constants("var a = 1 / 0; var b = 5 % 0;").unwrap();
        assert!(out.contains("1 / 0"));
        assert!(out.contains("5 % 0"));
    }

    #[test]
    fn folds_bitwise_and_shifts() {
        let out = fold_constants("var a = 12 | 3; var b = 1 << 4; var c = -1 >>> 28;").unwrap();
        assert!(out.contains("15"));
        assert!(out.contains("16"));
    }

    #[test]
    fn literal_if_collapses_to_taken_branch() {
        let out = fold_constants("if (true) { keep(); } else { drop(); }").unwrap();
        assert!(out.contains("keep"));
        assert!(!out.contains("drop"));
    }

    #[test]
    fn literal_false_if_without_else_disappears() {
        let out = fold_constants("if (false) { drop(); } always();").unwrap();
        assert!(!out.contains("drop"));
        assert!(out.contains("always"));
    }

    #[test]
    fn literal_ternary_collapses() {
        let out = fold_constants("var x = false ? a : b;").unwrap();
        assert!(out.contains("var x = b"));
    }

    #[test]
    fn parse_error_is_reported() {
        assert!(fold_constants("var = 1;").is_err());
    }
}
