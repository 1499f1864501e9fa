//! VM family identification.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static OBFUSCATOR_IO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:function\s*\(\s*_0x\w+|_0x\w+\s*=\s*function\s*\()")
        .expect("obfuscator.io signature regex")
});

/// The VM families the engine knows how to restore. A closed enum: each
/// variant maps to exactly one restorer implementation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VmType {
    ObfuscatorIo,
    JsFuck,
    JjEncode,
    Custom,
}

impl VmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VmType::ObfuscatorIo => "obfuscator.io",
            VmType::JsFuck => "jsfuck",
            VmType::JjEncode => "jjencode",
            VmType::Custom => "custom",
        }
    }
}

pub fn identify_vm_type(code: &str) -> VmType {
    if is_symbol_only(code) {
        return VmType::JsFuck;
    }
    let compact: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with("$=~[]") || compact.contains(";$=~[]") {
        return VmType::JjEncode;
    }
    if code.contains("_0x") && OBFUSCATOR_IO_RE.is_match(code) {
        return VmType::ObfuscatorIo;
    }
    VmType::Custom
}

fn is_symbol_only(code: &str) -> bool {
    let mut seen = 0usize;
    for c in code.chars() {
        if c.is_whitespace() {
            continue;
        }
        if !matches!(c, '[' | ']' | '(' | ')' | '!' | '+') {
            return false;
        }
        seen += 1;
    }
    seen >= 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_soup_is_jsfuck() {
        assert_eq!(identify_vm_type("[][(![]+[])[+[]]+([![]]+[][[]])[+!+[]]]"), VmType::JsFuck);
    }

    #[test]
    fn sigil_chain_is_jjencode() {
        assert_eq!(identify_vm_type("$=~[];$={___:++$,$$$$:(![]+\"\")[$]};"), VmType::JjEncode);
    }

    #[test]
    fn hex_wrapper_is_obfuscator_io() {
        let code = "var _0x1f=function(_0x2a,_0x3b){return _0x2a^_0x3b;};";
        assert_eq!(identify_vm_type(code), VmType::ObfuscatorIo);
    }

    #[test]
    fn anything_else_is_custom() {
        assert_eq!(identify_vm_type("while(1){switch(ops[i++]){case 0: break;}}"), VmType::Custom);
    }
}
