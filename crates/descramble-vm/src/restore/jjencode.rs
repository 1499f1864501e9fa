//! JJEncode resolution.
//!
//! JJEncode builds the source out of properties of one self-referential
//! sigil object: digits come from repeated increments, letters from indexing
//! stringified primitives, and everything else from octal escape sequences
//! concatenated into the payload string. After the prologue the property
//! values are fixed, so the payload can be resolved with a lookup table and
//! an octal decode, without evaluating anything.

use tracing::warn;

use super::{RestoreInput, Restoration, VmRestorer};

/// Property values of the canonical `$` object after its prologue ran.
const SIGIL_VALUES: &[(&str, &str)] = &[
    ("$.$___", "8"),
    ("$.$__$", "9"),
    ("$.$$$$", "f"),
    ("$.$_$_", "a"),
    ("$.$_$$", "b"),
    ("$.$$_$", "d"),
    ("$.$$$_", "e"),
    ("$.$$__", "c"),
    ("$.___", "0"),
    ("$.__$", "1"),
    ("$._$_", "2"),
    ("$._$$", "3"),
    ("$.$__", "4"),
    ("$.$_$", "5"),
    ("$.$$_", "6"),
    ("$.$$$", "7"),
    ("$._$", "o"),
    ("$.__", "t"),
    ("$._", "u"),
];

pub struct JjEncodeRestorer;

impl VmRestorer for JjEncodeRestorer {
    fn restore(&self, input: &RestoreInput<'_>) -> Restoration {
        let compact: String = input.code.chars().filter(|c| !c.is_whitespace()).collect();
        if !compact.starts_with("$=~[]") && !compact.contains(";$=~[]") {
            return Restoration::untouched(
                input.code,
                0.3,
                "jjencode: sigil prologue not found, leaving code unchanged",
            );
        }

        match resolve_payload(&compact) {
            Ok(resolved) => Restoration {
                code: resolved,
                confidence: 0.6,
                warnings: Vec::new(),
                unresolved: Vec::new(),
            },
            Err(reason) => {
                warn!(%reason, "jjencode payload not statically resolvable");
                Restoration::untouched(input.code, 0.3, format!("jjencode: {reason}"))
            }
        }
    }
}

fn resolve_payload(compact: &str) -> Result<String, String> {
    // The payload is framed by escaped quotes: `+"\""+ ... +"\""`.
    let open = "\"\\\"\"+";
    let close = "+\"\\\"\"";
    let start = compact.find(open).ok_or("payload frame not found")? + open.len();
    let end = compact.rfind(close).ok_or("payload frame not closed")?;
    if end <= start {
        return Err("empty payload frame".into());
    }

    let mut joined = String::new();
    for term in split_terms(&compact[start..end]) {
        let term = term.trim();
        if term.is_empty() {
            return Err("empty term in payload".into());
        }
        if let Some(value) = quoted_value(term) {
            joined.push_str(&value);
            continue;
        }
        match SIGIL_VALUES.iter().find(|(token, _)| *token == term) {
            Some((_, value)) => joined.push_str(value),
            None => return Err(format!("unresolved term `{term}`")),
        }
    }
    Ok(decode_octal_escapes(&joined))
}

/// Splits on `+` at the top level, keeping quoted fragments intact.
fn split_terms(payload: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    for c in payload.chars() {
        if let Some(quote) = in_string {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                in_string = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                in_string = Some(c);
                current.push(c);
            }
            '+' => {
                terms.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        terms.push(current);
    }
    terms
}

fn quoted_value(term: &str) -> Option<String> {
    let quote = term.chars().next()?;
    if (quote != '"' && quote != '\'') || term.len() < 2 || !term.ends_with(quote) {
        return None;
    }
    let inner = &term[1..term.len() - 1];
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Some(out)
}

/// Resolves `\NNN` octal escapes produced by the digit-concatenation trick.
fn decode_octal_escapes(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            let mut value = 0u32;
            let mut digits = 0usize;
            while digits < 3
                && i + 1 + digits < bytes.len()
                && (b'0'..=b'7').contains(&bytes[i + 1 + digits])
            {
                value = value * 8 + u32::from(bytes[i + 1 + digits] - b'0');
                digits += 1;
            }
            if digits > 0 {
                if let Some(c) = char::from_u32(value) {
                    out.push(c);
                    i += 1 + digits;
                    continue;
                }
            }
        }
        // Safe: we only land on char boundaries outside the escape branch.
        let c = text[i..].chars().next().unwrap_or('\u{FFFD}');
        out.push(c);
        i += c.len_utf8();
    }
    out
}
