//! Control-flow unflattening.
//!
//! Flattened code executes numbered blocks in an order dictated by a
//! dispatch sequence: `var order = "0|2|1".split('|')`, then a loop
//! switching on `order[i++]`. Replaying the declared sequence and splicing
//! the case bodies back in that order recovers the straight-line program.
//! Only runs in aggressive mode: the rewrite drops the loop frame entirely.

use std::collections::HashMap;

use swc_core::ecma::ast::{
    CallExpr, Callee, ComputedPropName, Expr, Lit, MemberProp, Pat, Stmt, SwitchStmt, VarDeclarator,
    WhileStmt,
};
use swc_core::ecma::visit::{Visit, VisitMut, VisitMutWith, VisitWith};
use tracing::debug;

use descramble_core::ast;
use descramble_core::error::StageError;

pub fn unflatten_control_flow(code: &str) -> Result<String, StageError> {
    let (cm, mut program) = ast::parse_program(code)?;
    program.visit_mut_with(&mut Unflattener);
    ast::emit_program(&cm, &program)
}

struct Unflattener;

impl VisitMut for Unflattener {
    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        stmts.visit_mut_children_with(self);

        let sequences = dispatch_sequences(stmts);
        if sequences.is_empty() {
            return;
        }

        let mut i = 0usize;
        while i < stmts.len() {
            match try_flatten(&stmts[i], &sequences) {
                Some(flattened) => {
                    debug!(statements = flattened.len(), "dispatcher loop unflattened");
                    let advance = flattened.len();
                    stmts.splice(i..=i, flattened);
                    i += advance;
                }
                None => i += 1,
            }
        }
    }
}

/// Finds `name = "<ints>|..".split('|')` declarations in this statement
/// list and records the declared orders.
fn dispatch_sequences(stmts: &[Stmt]) -> HashMap<String, Vec<String>> {
    let mut sequences = HashMap::new();
    let mut finder = SequenceFinder { sequences: &mut sequences };
    for stmt in stmts {
        stmt.visit_with(&mut finder);
    }
    sequences
}

struct SequenceFinder<'a> {
    sequences: &'a mut HashMap<String, Vec<String>>,
}

impl Visit for SequenceFinder<'_> {
    fn visit_var_declarator(&mut self, node: &VarDeclarator) {
        node.visit_children_with(self);
        let Pat::Ident(binding) = &node.name else { return };
        let Some(init) = &node.init else { return };
        if let Some(order) = split_call_order(init) {
            self.sequences.insert(binding.id.sym.to_string(), order);
        }
    }
}

/// Matches `"0|2|1".split('|')` where every segment is an integer.
fn split_call_order(expr: &Expr) -> Option<Vec<String>> {
    let Expr::Call(CallExpr { callee: Callee::Expr(callee), args, .. }) = expr else {
        return None;
    };
    let Expr::Member(member) = &**callee else { return None };
    let Expr::Lit(Lit::Str(subject)) = &*member.obj else { return None };
    let prop = member.prop.as_ident()?;
    if &*prop.sym != "split" {
        return None;
    }
    let first = args.first()?;
    if first.spread.is_some() {
        return None;
    }
    let Expr::Lit(Lit::Str(separator)) = &*first.expr else { return None };
    if &*separator.value != "|" {
        return None;
    }
    let order: Vec<String> = subject.value.split('|').map(str::to_string).collect();
    if order.is_empty() || !order.iter().all(|s| s.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    Some(order)
}

fn try_flatten(stmt: &Stmt, sequences: &HashMap<String, Vec<String>>) -> Option<Vec<Stmt>> {
    let Stmt::While(while_stmt) = stmt else { return None };
    let switch = find_switch(while_stmt)?;
    let name = dispatch_var(&switch.discriminant)?;
    let order = sequences.get(&name)?;

    let mut flattened = Vec::new();
    for key in order {
        let case = switch.cases.iter().find(|case| case_matches(case.test.as_deref(), key))?;
        for stmt in &case.cons {
            if matches!(stmt, Stmt::Break(_) | Stmt::Continue(_)) {
                continue;
            }
            flattened.push(stmt.clone());
        }
    }
    Some(flattened)
}

fn find_switch(while_stmt: &WhileStmt) -> Option<&SwitchStmt> {
    match &*while_stmt.body {
        Stmt::Switch(switch) => Some(switch),
        Stmt::Block(block) => block.stmts.iter().find_map(|stmt| match stmt {
            Stmt::Switch(switch) => Some(switch),
            _ => None,
        }),
        _ => None,
    }
}

fn dispatch_var(discriminant: &Expr) -> Option<String> {
    let Expr::Member(member) = discriminant else { return None };
    let Expr::Ident(obj) = &*member.obj else { return None };
    match &member.prop {
        MemberProp::Computed(ComputedPropName { .. }) => Some(obj.sym.to_string()),
        _ => None,
    }
}

fn case_matches(test: Option<&Expr>, key: &str) -> bool {
    match test {
        Some(Expr::Lit(Lit::Str(s))) => &*s.value == key,
        Some(Expr::Lit(Lit::Num(n))) => format!("{}", n.value) == key,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_the_declared_order() {
        let code = r#"
            var order = "0|2|1".split('|'), i = 0;
            while (true) {
                switch (order[i++]) {
                    case "0": first(); continue;
                    case "1": third(); continue;
                    case "2": second(); continue;
                }
                break;
            }
        "#;
        let out = unflatten_control_flow(code).unwrap();
        let first = out.find("first()").unwrap();
        let second = out.find("second()").unwrap();
        let third = out.find("third()").unwrap();
        assert!(first < second && second < third, "got: {out}");
        assert!(!out.contains("switch"));
        assert!(!out.contains("while"));
    }

    #[test]
    fn numeric_case_tests_also_match() {
        let code = r#"
            var seq = "1|0".split('|'), j = 0;
            while (go) {
                switch (seq[j++]) {
                    case 0: late(); break;
                    case 1: early(); break;
                }
            }
        "#;
        let out = unflatten_control_flow(code).unwrap();
        let early = out.find("early()").unwrap();
        let late = out.find("late()").unwrap();
        assert!(early < late);
    }

    #[test]
    fn missing_case_leaves_the_loop_alone() {
        let code = r#"
            var seq = "0|9".split('|'), j = 0;
            while (go) { switch (seq[j++]) { case "0": a(); break; } }
        "#;
        let out = unflatten_control_flow(code).unwrap();
        assert!(out.contains("while"));
        assert!(out.contains("switch"));
    }

    #[test]
    fn unrelated_loops_are_untouched() {
        let code = "while (x) { tick(); }";
        let out = unflatten_control_flow(code).unwrap();
        assert!(out.contains("while"));
        assert!(out.contains("tick"));
    }

    #[test]
    fn parse_error_is_reported() {
        assert!(unflatten_control_flow("while (").is_err());
    }
}
