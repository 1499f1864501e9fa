//! Instruction-set extraction from a dispatcher switch.
//!
//! Each `case` of the interpreter switch is one opcode handler. The handler
//! body shape gives away what the instruction does, which is usually enough
//! context for a human (or the AI collaborator) to label the instruction set.

use swc_core::ecma::ast::{Expr, Lit, Stmt, SwitchCase, SwitchStmt};
use swc_core::ecma::visit::{Visit, VisitWith};

use descramble_core::ast;
use descramble_core::model::{InstructionKind, VmInstruction};

/// Walks the largest dispatcher switch and describes one instruction per
/// case. Empty when the code does not parse or holds no switch.
pub fn extract_instructions(code: &str) -> Vec<VmInstruction> {
    let Ok((_cm, program)) = ast::parse_program(code) else {
        return Vec::new();
    };
    let mut finder = LargestSwitch::default();
    program.visit_with(&mut finder);
    let Some(cases) = finder.cases else {
        return Vec::new();
    };

    cases
        .iter()
        .enumerate()
        .map(|(index, case)| describe_case(index, case))
        .collect()
}

#[derive(Default)]
struct LargestSwitch {
    cases: Option<Vec<SwitchCase>>,
}

impl Visit for LargestSwitch {
    fn visit_switch_stmt(&mut self, node: &SwitchStmt) {
        let current = self.cases.as_ref().map(Vec::len).unwrap_or(0);
        if node.cases.len() > current {
            self.cases = Some(node.cases.clone());
        }
        node.visit_children_with(self);
    }
}

fn describe_case(index: usize, case: &SwitchCase) -> VmInstruction {
    let opcode = match case.test.as_deref() {
        Some(Expr::Lit(Lit::Num(n))) => format!("{}", n.value),
        Some(Expr::Lit(Lit::Str(s))) => s.value.to_string(),
        Some(_) => format!("case_{index}"),
        None => "default".to_string(),
    };
    let kind = infer_kind(&case.cons);
    let description = match kind {
        InstructionKind::StackOp => "mutates the VM stack via push/shift",
        InstructionKind::Assign => "writes a register or local",
        InstructionKind::Call => "invokes a function",
        InstructionKind::Branch => "alters control flow",
        InstructionKind::Unknown => "unclassified handler body",
    };
    VmInstruction {
        opcode,
        name: format!("op_{index}"),
        kind,
        description: description.to_string(),
    }
}

fn infer_kind(body: &[Stmt]) -> InstructionKind {
    let mut probe = BodyProbe::default();
    for stmt in body {
        stmt.visit_with(&mut probe);
    }
    // A conditional handler is a branch even when the guarded body assigns
    // or calls; stack mutation still wins because push/shift handlers are
    // the backbone of a stack machine.
    if probe.stack_mutation {
        InstructionKind::StackOp
    } else if probe.conditional {
        InstructionKind::Branch
    } else if probe.assignment {
        InstructionKind::Assign
    } else if probe.call {
        InstructionKind::Call
    } else {
        InstructionKind::Unknown
    }
}

#[derive(Default)]
struct BodyProbe {
    stack_mutation: bool,
    assignment: bool,
    call: bool,
    conditional: bool,
}

impl Visit for BodyProbe {
    fn visit_call_expr(&mut self, node: &swc_core::ecma::ast::CallExpr) {
        if let Some(callee) = node.callee.as_expr() {
            if let Expr::Member(member) = &**callee {
                if let Some(name) = member.prop.as_ident() {
                    if &*name.sym == "push" || &*name.sym == "shift" || &*name.sym == "pop" {
                        self.stack_mutation = true;
                    }
                }
            }
        }
        self.call = true;
        node.visit_children_with(self);
    }

    fn visit_assign_expr(&mut self, node: &swc_core::ecma::ast::AssignExpr) {
        self.assignment = true;
        node.visit_children_with(self);
    }

    fn visit_var_decl(&mut self, node: &swc_core::ecma::ast::VarDecl) {
        if node.decls.iter().any(|d| d.init.is_some()) {
            self.assignment = true;
        }
        node.visit_children_with(self);
    }

    fn visit_if_stmt(&mut self, node: &swc_core::ecma::ast::IfStmt) {
        self.conditional = true;
        node.visit_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISPATCHER: &str = r#"
        while (true) {
            switch (ops[pc++]) {
                case 0: stack.push(regs[0]); break;
                case 1: regs[1] = stack[0]; break;
                case 2: handler(); break;
                case 3: if (flag) { pc = 0; } break;
                case 4: break;
            }
        }
    "#;

    #[test]
    fn classifies_case_bodies_by_shape() {
        let instructions = extract_instructions(DISPATCHER);
        assert_eq!(instructions.len(), 5);
        assert_eq!(instructions[0].kind, InstructionKind::StackOp);
        assert_eq!(instructions[1].kind, InstructionKind::Assign);
        assert_eq!(instructions[2].kind, InstructionKind::Call);
        assert_eq!(instructions[3].kind, InstructionKind::Branch);
        assert_eq!(instructions[4].kind, InstructionKind::Unknown);
    }

    #[test]
    fn opcodes_come_from_case_tests() {
        let instructions = extract_instructions(DISPATCHER);
        assert_eq!(instructions[0].opcode, "0");
        assert_eq!(instructions[4].opcode, "4");
    }

    #[test]
    fn no_switch_means_no_instructions() {
        assert!(extract_instructions("var a = 1;").is_empty());
    }

    #[test]
    fn unparseable_input_yields_empty() {
        assert!(extract_instructions("switch (").is_empty());
    }
}
