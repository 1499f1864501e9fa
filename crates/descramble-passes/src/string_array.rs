//! String-array extraction and decryption.
//!
//! Extraction collects `_0xNAME = ["...", ...]` declarations into a shared
//! table without touching the code; decryption rewrites `name[index]` reads
//! to the literal once the table knows the name. The table lives on the
//! pipeline instance, so arrays extracted in one call stay visible to later
//! calls until the caller clears it.

use std::collections::HashMap;

use swc_core::common::DUMMY_SP;
use swc_core::ecma::ast::{
    ArrayLit, ComputedPropName, Expr, Lit, MemberProp, Pat, Str, VarDeclarator,
};
use swc_core::ecma::visit::{Visit, VisitMut, VisitMutWith, VisitWith};
use tracing::debug;

use descramble_core::ast;
use descramble_core::error::StageError;

pub type StringArrayTable = HashMap<String, Vec<String>>;

/// Collects every hex-named string-array declaration into `table`.
/// Additive only; returns how many arrays were found in this input.
pub fn extract_string_arrays(code: &str, table: &mut StringArrayTable) -> Result<usize, StageError> {
    let (_cm, program) = ast::parse_program(code)?;
    let mut collector = ArrayCollector { found: Vec::new() };
    program.visit_with(&mut collector);
    let count = collector.found.len();
    for (name, items) in collector.found {
        debug!(array = %name, items = items.len(), "string array extracted");
        table.insert(name, items);
    }
    Ok(count)
}

/// Rewrites `name[index]` to the table entry when the index is a literal in
/// range. Out-of-range and unknown names are left untouched.
pub fn decrypt_string_arrays(code: &str, table: &StringArrayTable) -> Result<String, StageError> {
    let (cm, mut program) = ast::parse_program(code)?;
    let mut pass = ArrayDecrypter { table };
    program.visit_mut_with(&mut pass);
    ast::emit_program(&cm, &program)
}

struct ArrayCollector {
    found: Vec<(String, Vec<String>)>,
}

impl Visit for ArrayCollector {
    fn visit_var_declarator(&mut self, node: &VarDeclarator) {
        node.visit_children_with(self);
        let Pat::Ident(binding) = &node.name else { return };
        if !binding.id.sym.starts_with("_0x") {
            return;
        }
        let Some(init) = &node.init else { return };
        let Expr::Array(array) = &**init else { return };
        if let Some(items) = literal_items(array) {
            self.found.push((binding.id.sym.to_string(), items));
        }
    }
}

fn literal_items(array: &ArrayLit) -> Option<Vec<String>> {
    let mut items = Vec::with_capacity(array.elems.len());
    for elem in &array.elems {
        let elem = elem.as_ref()?;
        if elem.spread.is_some() {
            return None;
        }
        match &*elem.expr {
            Expr::Lit(Lit::Str(s)) => items.push(s.value.to_string()),
            _ => return None,
        }
    }
    Some(items)
}

struct ArrayDecrypter<'a> {
    table: &'a StringArrayTable,
}

impl VisitMut for ArrayDecrypter<'_> {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        expr.visit_mut_children_with(self);
        let replacement = match expr {
            Expr::Member(member) => {
                let Expr::Ident(obj) = &*member.obj else { return };
                let Some(items) = self.table.get(&*obj.sym) else { return };
                let MemberProp::Computed(ComputedPropName { expr: index, .. }) = &member.prop
                else {
                    return;
                };
                let Expr::Lit(Lit::Num(index)) = &**index else { return };
                let index = index.value as usize;
                items.get(index).map(|value| {
                    Expr::Lit(Lit::Str(Str {
                        span: DUMMY_SP,
                        value: value.as_str().into(),
                        raw: None,
                    }))
                })
            }
            _ => None,
        };
        if let Some(replacement) = replacement {
            *expr = replacement;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_hex_named_arrays() {
        let mut table = StringArrayTable::new();
        let count =
            extract_string_arrays(r#"var _0xabc = ["a", "b"]; var plain = ["c"];"#, &mut table)
                .unwrap();
        assert_eq!(count, 1);
        assert_eq!(table.get("_0xabc").unwrap(), &vec!["a".to_string(), "b".to_string()]);
        assert!(!table.contains_key("plain"));
    }

    #[test]
    fn skips_arrays_with_computed_entries() {
        let mut table = StringArrayTable::new();
        extract_string_arrays(r#"var _0xabc = ["a", f()];"#, &mut table).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn decrypts_indexed_access() {
        let mut table = StringArrayTable::new();
        let code = r#"var _0xabc = ["a", "b"]; console.log(_0xabc[1]);"#;
        extract_string_arrays(code, &mut table).unwrap();
        let out = decrypt_string_arrays(code, &table).unwrap();
        assert!(out.contains(r#"console.log("b")"#), "got: {out}");
    }

    #[test]
    fn out_of_range_index_is_untouched() {
        let mut table = StringArrayTable::new();
        table.insert("_0xabc".into(), vec!["only".into()]);
        let out = decrypt_string_arrays("use(_0xabc[7]);", &table).unwrap();
        assert!(out.contains("_0xabc[7]"));
    }

    #[test]
    fn unknown_arrays_are_untouched() {
        let table = StringArrayTable::new();
        let out = decrypt_string_arrays("use(_0xother[0]);", &table).unwrap();
        assert!(out.contains("_0xother[0]"));
    }

    #[test]
    fn parse_error_is_reported() {
        let mut table = StringArrayTable::new();
        assert!(extract_string_arrays("var _0x = [;", &mut table).is_err());
        assert!(decrypt_string_arrays("var _0x = [;", &table).is_err());
    }
}
