//! Dean Edwards style P.A.C.K.E.R. unpacking.
//!
//! The wrapper carries its own decompressor:
//! `eval(function(p,a,c,k,e,d){...}('payload', radix, count, 'sym|tab'.split('|'), 0, {}))`.
//! Every alphanumeric token of the payload is an index into the symbol table,
//! written in base `radix` with the 0-9 a-z A-Z digit alphabet. Substituting
//! the symbols back yields the original source, so no evaluation is needed.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;
use tracing::warn;

use crate::UnpackResult;

/// Packers are occasionally applied to their own output; eight rounds is
/// well past anything seen in the wild.
const MAX_ROUNDS: usize = 8;

const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("word regex"));

// The two argument shapes seen in the wild: a full trailing argument list
// and a truncated one where the tail was minified away.
static JUICERS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?s)\}\('(.*)', *(\d+|\[\]), *(\d+), *'(.*?)'\.split\('\|'\), *(\d+), *(.*?)\)\)")
            .expect("full juicer regex"),
        Regex::new(r"(?s)\}\('(.*)', *(\d+|\[\]), *(\d+), *'(.*?)'\.split\('\|'\)")
            .expect("short juicer regex"),
    ]
});

#[derive(Debug, Error)]
pub enum UnpackError {
    #[error("could not extract p.a.c.k.e.r arguments")]
    ArgumentShape,
    #[error("malformed symbol table: declared {declared}, found {found}")]
    SymtabMismatch { declared: usize, found: usize },
    #[error("unsupported radix {0}")]
    Radix(u64),
}

pub struct PackerUnpacker;

impl PackerUnpacker {
    /// Canonical `eval(function(p,a,c,k,e,` signature.
    pub fn detect(code: &str) -> bool {
        descramble_core::detect::is_packed(code)
    }

    /// Unpacks repeatedly until the output stabilises or the round cap is
    /// hit. Failures keep the best code recovered so far and are reported
    /// as warnings, never as errors.
    pub fn unpack(code: &str) -> UnpackResult {
        let mut current = code.to_string();
        let mut warnings = Vec::new();
        let mut changed = false;

        for _round in 0..MAX_ROUNDS {
            if !Self::detect(&current) {
                break;
            }
            match unpack_once(&current) {
                Ok(next) => {
                    if next == current {
                        break;
                    }
                    current = next;
                    changed = true;
                }
                Err(err) => {
                    warn!(error = %err, "packer round failed, keeping current code");
                    warnings.push(format!("packer: {err}"));
                    break;
                }
            }
        }

        UnpackResult { code: current, changed, warnings }
    }
}

fn unpack_once(source: &str) -> Result<String, UnpackError> {
    let (payload, radix, count, symtab, span) = filter_args(source)?;
    if count != symtab.len() {
        return Err(UnpackError::SymtabMismatch { declared: count, found: symtab.len() });
    }

    let cleaned = payload.replace("\\\\", "\\").replace("\\'", "'");
    let decoded = WORD_RE.replace_all(&cleaned, |caps: &Captures| {
        let word = &caps[0];
        match unbase(word, radix) {
            Some(index) => {
                let index = index as usize;
                if index < symtab.len() && !symtab[index].is_empty() {
                    symtab[index].clone()
                } else {
                    word.to_string()
                }
            }
            None => word.to_string(),
        }
    });

    // Whatever surrounded the eval wrapper is preserved untouched.
    let prefix = &source[..span.0];
    let suffix = &source[span.1..];
    Ok(format!("{prefix}{decoded}{suffix}"))
}

type PackerArgs = (String, u64, usize, Vec<String>, (usize, usize));

fn filter_args(source: &str) -> Result<PackerArgs, UnpackError> {
    let eval_start = source.find("eval").unwrap_or(0);
    for juicer in JUICERS.iter() {
        if let Some(caps) = juicer.captures(source) {
            let payload = caps[1].to_string();
            let radix = match &caps[2] {
                "[]" => 62,
                digits => digits.parse().map_err(|_| UnpackError::ArgumentShape)?,
            };
            if radix < 2 || radix > 62 {
                return Err(UnpackError::Radix(radix));
            }
            let count = caps[3].parse().map_err(|_| UnpackError::ArgumentShape)?;
            let symtab = caps[4].split('|').map(String::from).collect();
            let whole = caps.get(0).ok_or(UnpackError::ArgumentShape)?;
            return Ok((payload, radix, count, symtab, (eval_start, whole.end())));
        }
    }
    Err(UnpackError::ArgumentShape)
}

/// Renders `n` in the packer's positional base: digits 0-9, then a-z, then
/// A-Z. Radixes of at most 36 match `toString(radix)` exactly.
pub fn base(mut n: u64, radix: u64) -> String {
    assert!((2..=62).contains(&radix), "radix out of range");
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE62_ALPHABET[(n % radix) as usize]);
        n /= radix;
    }
    digits.reverse();
    String::from_utf8(digits).expect("alphabet is ascii")
}

/// Inverse of [`base`]. `None` for words containing digits outside the
/// radix alphabet.
pub fn unbase(word: &str, radix: u64) -> Option<u64> {
    if radix <= 36 {
        return u64::from_str_radix(&word.to_lowercase(), radix as u32).ok();
    }
    let mut value: u64 = 0;
    for byte in word.bytes() {
        let digit = BASE62_ALPHABET.iter().position(|&c| c == byte)? as u64;
        if digit >= radix {
            return None;
        }
        value = value.checked_mul(radix)?.checked_add(digit)?;
    }
    Some(value)
}
