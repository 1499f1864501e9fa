//! Hex-identifier renaming.
//!
//! Two passes: collect every declared `_0x*` name in encounter order, then
//! rewrite every identifier occurrence whose text matches a collected name.
//! Deliberately scope-unaware: a shadowed `_0x1234` is renamed to the same
//! replacement everywhere, matching how these names are generated in the
//! first place (one global counter, no reuse across scopes).

use std::collections::HashMap;

use swc_core::ecma::ast::{FnDecl, Ident, IdentName, Param, Pat, VarDeclarator};
use swc_core::ecma::visit::{Visit, VisitMut, VisitMutWith, VisitWith};
use tracing::debug;

use descramble_core::ast;
use descramble_core::error::StageError;

pub fn rename_variables(code: &str) -> Result<String, StageError> {
    let (cm, mut program) = ast::parse_program(code)?;

    let mut collector = DeclaredNames::default();
    program.visit_with(&mut collector);
    if collector.order.is_empty() {
        return ast::emit_program(&cm, &program);
    }

    let map: HashMap<String, String> = collector
        .order
        .iter()
        .enumerate()
        .map(|(index, name)| (name.clone(), format!("var_{index}")))
        .collect();
    debug!(renamed = map.len(), "hex identifiers renamed");

    let mut renamer = Renamer { map: &map };
    program.visit_mut_with(&mut renamer);
    ast::emit_program(&cm, &program)
}

#[derive(Default)]
struct DeclaredNames {
    order: Vec<String>,
}

impl DeclaredNames {
    fn record(&mut self, name: &str) {
        if name.starts_with("_0x") && !self.order.iter().any(|n| n == name) {
            self.order.push(name.to_string());
        }
    }
}

impl Visit for DeclaredNames {
    fn visit_var_declarator(&mut self, node: &VarDeclarator) {
        if let Pat::Ident(binding) = &node.name {
            self.record(&binding.id.sym);
        }
        node.visit_children_with(self);
    }

    fn visit_fn_decl(&mut self, node: &FnDecl) {
        self.record(&node.ident.sym);
        node.visit_children_with(self);
    }

    fn visit_param(&mut self, node: &Param) {
        if let Pat::Ident(binding) = &node.pat {
            self.record(&binding.id.sym);
        }
        node.visit_children_with(self);
    }
}

struct Renamer<'a> {
    map: &'a HashMap<String, String>,
}

impl VisitMut for Renamer<'_> {
    fn visit_mut_ident(&mut self, ident: &mut Ident) {
        if let Some(next) = self.map.get(&*ident.sym) {
            ident.sym = next.clone().into();
        }
    }

    // Dot-property reads of a renamed name follow along; these arrays are
    // plain variables, not object members, in everything this pass targets.
    fn visit_mut_ident_name(&mut self, ident: &mut IdentName) {
        if let Some(next) = self.map.get(&*ident.sym) {
            ident.sym = next.clone().into();
        }
    }
}
