//! Interpreter-loop detection.
//!
//! A bytecode VM shows up as a loop whose body switches on a member read
//! from an array-like dispatch variable, usually advanced by a program
//! counter (`ops[pc++]`). The structural scan walks a parsed tree; inputs
//! that do not parse fall back to a coarse regex probe.

use std::sync::LazyLock;

use regex::Regex;
use swc_core::ecma::ast::{
    ComputedPropName, DoWhileStmt, Expr, ForStmt, MemberProp, Program, SwitchStmt, WhileStmt,
};
use swc_core::ecma::visit::{Visit, VisitWith};

use descramble_core::ast;
use descramble_core::model::{Complexity, VmFeatures};

static DISPATCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)while\s*\(.{0,60}?\)\s*\{\s*switch\s*\(").expect("dispatch fallback regex")
});

static CASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bcase\s").expect("case fallback regex"));

#[derive(Debug, Clone)]
pub struct VmDetection {
    pub features: VmFeatures,
    pub confidence: f64,
}

/// Scans for an interpreter loop. `None` means the code shows no VM shape
/// at all; a low-confidence `Some` is possible and is gated by the caller.
pub fn detect_vm(code: &str) -> Option<VmDetection> {
    match ast::parse_program(code) {
        Ok((_cm, program)) => scan_program(&program),
        Err(_) => regex_probe(code),
    }
}

fn scan_program(program: &Program) -> Option<VmDetection> {
    let mut scan = DispatchScan::default();
    program.visit_with(&mut scan);
    let candidate = scan.best?;

    let mut confidence: f64 = 0.2;
    if candidate.has_instruction_array {
        confidence += 0.1;
    }
    if candidate.has_program_counter {
        confidence += 0.15;
    }
    if candidate.case_count >= 8 {
        confidence += 0.15;
    }
    if candidate.case_count >= 16 {
        confidence += 0.1;
    }
    let complexity = classify_complexity(candidate.case_count, candidate.loop_depth);
    if complexity == Complexity::High {
        confidence += 0.1;
    }

    Some(VmDetection {
        features: VmFeatures {
            instruction_count: candidate.case_count,
            interpreter_location: Some(format!("dispatch loop at byte {}", candidate.offset)),
            complexity,
            has_switch: true,
            has_instruction_array: candidate.has_instruction_array,
            has_program_counter: candidate.has_program_counter,
        },
        confidence: confidence.min(0.9),
    })
}

fn regex_probe(code: &str) -> Option<VmDetection> {
    let hit = DISPATCH_RE.find(code)?;
    let case_count = CASE_RE.find_iter(code).count();
    let confidence = if case_count >= 8 { 0.35 } else { 0.3 };
    Some(VmDetection {
        features: VmFeatures {
            instruction_count: case_count,
            interpreter_location: Some(format!("regex match at byte {}", hit.start())),
            complexity: classify_complexity(case_count, 1),
            has_switch: true,
            has_instruction_array: false,
            has_program_counter: false,
        },
        confidence,
    })
}

fn classify_complexity(case_count: usize, loop_depth: usize) -> Complexity {
    let mut level = if case_count >= 64 {
        Complexity::High
    } else if case_count >= 16 {
        Complexity::Medium
    } else {
        Complexity::Low
    };
    if loop_depth >= 3 {
        level = match level {
            Complexity::Low => Complexity::Medium,
            _ => Complexity::High,
        };
    }
    level
}

#[derive(Debug, Clone)]
struct Candidate {
    case_count: usize,
    has_instruction_array: bool,
    has_program_counter: bool,
    loop_depth: usize,
    offset: u32,
}

#[derive(Default)]
struct DispatchScan {
    best: Option<Candidate>,
    loop_depth: usize,
}

impl DispatchScan {
    fn consider(&mut self, body_offset: u32, body: &swc_core::ecma::ast::Stmt) {
        let mut switches = SwitchCollector::default();
        body.visit_with(&mut switches);
        for found in switches.found {
            let candidate = Candidate {
                case_count: found.case_count,
                has_instruction_array: found.has_instruction_array,
                has_program_counter: found.has_program_counter,
                loop_depth: self.loop_depth,
                offset: body_offset,
            };
            let better = match &self.best {
                Some(best) => candidate.case_count > best.case_count,
                None => true,
            };
            if better {
                self.best = Some(candidate);
            }
        }
    }
}

impl Visit for DispatchScan {
    fn visit_while_stmt(&mut self, node: &WhileStmt) {
        self.loop_depth += 1;
        self.consider(node.span.lo.0, &*node.body);
        node.visit_children_with(self);
        self.loop_depth -= 1;
    }

    fn visit_do_while_stmt(&mut self, node: &DoWhileStmt) {
        self.loop_depth += 1;
        self.consider(node.span.lo.0, &*node.body);
        node.visit_children_with(self);
        self.loop_depth -= 1;
    }

    fn visit_for_stmt(&mut self, node: &ForStmt) {
        self.loop_depth += 1;
        self.consider(node.span.lo.0, &*node.body);
        node.visit_children_with(self);
        self.loop_depth -= 1;
    }
}

#[derive(Debug, Clone)]
struct FoundSwitch {
    case_count: usize,
    has_instruction_array: bool,
    has_program_counter: bool,
}

#[derive(Default)]
struct SwitchCollector {
    found: Vec<FoundSwitch>,
}

impl Visit for SwitchCollector {
    fn visit_switch_stmt(&mut self, node: &SwitchStmt) {
        if let Some((has_array, has_pc)) = dispatch_read(&node.discriminant) {
            self.found.push(FoundSwitch {
                case_count: node.cases.len(),
                has_instruction_array: has_array,
                has_program_counter: has_pc,
            });
        }
        node.visit_children_with(self);
    }
}

/// A dispatch read is a member access on an array-like subject; the computed
/// index doubles as the program counter when it is a variable or an update
/// expression rather than a constant.
fn dispatch_read(expr: &Expr) -> Option<(bool, bool)> {
    match expr {
        Expr::Member(member) => {
            let has_array = matches!(&*member.obj, Expr::Ident(_) | Expr::Member(_));
            let has_pc = match &member.prop {
                MemberProp::Computed(ComputedPropName { expr, .. }) => {
                    matches!(&**expr, Expr::Update(_) | Expr::Ident(_) | Expr::Bin(_))
                }
                _ => false,
            };
            Some((has_array, has_pc))
        }
        Expr::Paren(paren) => dispatch_read(&paren.expr),
        _ => None,
    }
}
