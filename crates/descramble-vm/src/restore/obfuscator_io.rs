//! obfuscator.io restoration.
//!
//! The family's backbone is a string array, optionally rotated by a
//! self-invoking push/shift loop before first use. Re-deriving the runtime
//! order and substituting the literals back removes most of the
//! indirection; hex literals and `debugger` bait are cleaned up on the
//! re-parsed tree afterwards.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use swc_core::ecma::ast::{Expr, Lit, Stmt};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};
use tracing::{debug, warn};

use descramble_core::llm::{prompts, ChatOptions};
use descramble_core::model::UnresolvedPart;
use descramble_core::{ast, llm};

use super::{RestoreInput, Restoration, VmRestorer};

static ARRAY_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:var|let|const)\s+(_0x\w+)\s*=\s*\[([^\]]*)\]\s*;?").expect("array decl regex")
});

static ROTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\(\s*function\s*\(\s*_0x\w+\s*,\s*_0x\w+\s*\)\s*\{.{0,400}?push\s*\(\s*_0x\w+\s*\.\s*shift\s*\(\s*\)\s*\).{0,200}?\}\s*\(\s*(_0x\w+)\s*,\s*(0x[0-9a-fA-F]+|\d+)\s*\)\s*\)",
    )
    .expect("rotation iife regex")
});

pub struct ObfuscatorIoRestorer;

impl VmRestorer for ObfuscatorIoRestorer {
    fn restore(&self, input: &RestoreInput<'_>) -> Restoration {
        let mut warnings = Vec::new();
        let mut unresolved = Vec::new();
        let mut code = input.code.to_string();
        let mut resolved_any = false;

        let declarations: Vec<(String, String, String)> = ARRAY_DECL_RE
            .captures_iter(&code)
            .map(|caps| (caps[0].to_string(), caps[1].to_string(), caps[2].to_string()))
            .collect();

        for (declaration, name, body) in &declarations {
            let items = match parse_string_items(body) {
                Some(items) => Some(items),
                None => recover_via_llm(input, declaration, &mut warnings),
            };
            let Some(mut items) = items else {
                unresolved.push(UnresolvedPart {
                    location: format!("string array {name}"),
                    reason: "array literal could not be parsed statically".into(),
                    suggestion: "inspect the declaration and decode it manually".into(),
                });
                continue;
            };

            if let Some(rotation) = rotation_count(&code, name) {
                debug!(array = %name, rotation, "applying string array rotation");
                rotate(&mut items, rotation);
            }
            code = substitute_accesses(&code, name, &items);
            resolved_any = true;
        }

        match cleanup_tree(&code, input.aggressive) {
            Ok(cleaned) => code = cleaned,
            Err(err) => {
                warn!(error = %err, "obfuscator.io cleanup pass skipped");
                warnings.push(format!("obfuscator.io: cleanup pass skipped ({err})"));
            }
        }

        let confidence = if resolved_any && unresolved.is_empty() {
            0.8
        } else if resolved_any {
            0.55
        } else {
            0.4
        };
        Restoration { code, confidence, warnings, unresolved }
    }
}

/// Splits a `["a", 'b', ...]` literal body. `None` when any element is not
/// a plain string literal (computed or concatenated entries).
fn parse_string_items(body: &str) -> Option<Vec<String>> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    let mut items = Vec::new();
    let mut rest = trimmed;
    loop {
        rest = rest.trim_start();
        let quote = rest.chars().next()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let (value, consumed) = read_quoted(&rest[1..], quote)?;
        items.push(value);
        rest = rest[1 + consumed..].trim_start();
        if rest.is_empty() {
            return Some(items);
        }
        rest = rest.strip_prefix(',')?;
        if rest.trim().is_empty() {
            return Some(items);
        }
    }
}

/// Reads up to the closing quote, resolving the escapes obfuscator output
/// actually uses. Returns the decoded value and the byte length consumed,
/// including the closing quote.
fn read_quoted(source: &str, quote: char) -> Option<(String, usize)> {
    let bytes = source.as_bytes();
    let mut value = String::new();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = source[i..].chars().next()?;
        if c == quote {
            return Some((value, i + c.len_utf8()));
        }
        if c != '\\' {
            value.push(c);
            i += c.len_utf8();
            continue;
        }
        let next = source[i + 1..].chars().next()?;
        match next {
            'x' => {
                let hex = source.get(i + 2..i + 4)?;
                let code = u8::from_str_radix(hex, 16).ok()?;
                value.push(code as char);
                i += 4;
            }
            'u' => {
                let hex = source.get(i + 2..i + 6)?;
                let code = u32::from_str_radix(hex, 16).ok()?;
                value.push(char::from_u32(code)?);
                i += 6;
            }
            'n' => {
                value.push('\n');
                i += 2;
            }
            't' => {
                value.push('\t');
                i += 2;
            }
            'r' => {
                value.push('\r');
                i += 2;
            }
            other => {
                value.push(other);
                i += 1 + other.len_utf8();
            }
        }
    }
    None
}

fn recover_via_llm(
    input: &RestoreInput<'_>,
    declaration: &str,
    warnings: &mut Vec<String>,
) -> Option<Vec<String>> {
    let client = input.llm?;
    let messages = prompts::string_array_recovery(declaration);
    match client.chat(&messages, &ChatOptions::default()) {
        Ok(response) => match llm::extract_json(&response.content) {
            Some(serde_json::Value::Array(values)) => {
                let items: Option<Vec<String>> =
                    values.into_iter().map(|v| v.as_str().map(str::to_string)).collect();
                if items.is_none() {
                    warnings.push("obfuscator.io: collaborator array held non-strings".into());
                }
                items
            }
            _ => {
                warnings.push("obfuscator.io: collaborator response was not a JSON array".into());
                None
            }
        },
        Err(err) => {
            warnings.push(format!("obfuscator.io: collaborator unavailable ({err})"));
            None
        }
    }
}

/// Effective left-rotation applied by the canonical `while (--count)`
/// push/shift loop over this array.
fn rotation_count(code: &str, name: &str) -> Option<usize> {
    for caps in ROTATION_RE.captures_iter(code) {
        if &caps[1] != name {
            continue;
        }
        let raw = &caps[2];
        let count = if let Some(hex) = raw.strip_prefix("0x") {
            usize::from_str_radix(hex, 16).ok()?
        } else {
            raw.parse().ok()?
        };
        return Some(count.saturating_sub(1));
    }
    None
}

fn rotate(items: &mut Vec<String>, count: usize) {
    if items.is_empty() {
        return;
    }
    let count = count % items.len();
    items.rotate_left(count);
}

fn substitute_accesses(code: &str, name: &str, items: &[String]) -> String {
    let access =
        Regex::new(&format!(r"{}\[(0x[0-9a-fA-F]+|\d+)\]", regex::escape(name)))
            .expect("access regex");
    access
        .replace_all(code, |caps: &Captures| {
            let raw = &caps[1];
            let index = if let Some(hex) = raw.strip_prefix("0x") {
                usize::from_str_radix(hex, 16).ok()
            } else {
                raw.parse().ok()
            };
            match index.and_then(|i| items.get(i)) {
                Some(value) => format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Decimalises hex literals; with `aggressive` also drops `debugger`
/// statements. Runs on a fresh tree and re-prints.
fn cleanup_tree(code: &str, aggressive: bool) -> Result<String, descramble_core::StageError> {
    let (cm, mut program) = ast::parse_program(code)?;
    let mut pass = TreeCleanup { aggressive };
    program.visit_mut_with(&mut pass);
    ast::emit_program(&cm, &program)
}

struct TreeCleanup {
    aggressive: bool,
}

impl VisitMut for TreeCleanup {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        expr.visit_mut_children_with(self);
        if let Expr::Lit(Lit::Num(number)) = expr {
            if let Some(raw) = &number.raw {
                if raw.starts_with("0x") || raw.starts_with("0X") {
                    // Dropping the raw text makes the printer emit decimal.
                    number.raw = None;
                }
            }
        }
    }

    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        stmts.visit_mut_children_with(self);
        if self.aggressive {
            stmts.retain(|stmt| !matches!(stmt, Stmt::Debugger(_)));
        }
    }
}
