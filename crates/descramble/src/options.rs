/// Per-call pipeline options.
///
/// The tri-state stage switches (`Option<bool>`) distinguish an explicit
/// caller decision from "let auto-detection decide": `Some(_)` always wins,
/// `None` defers to `auto` plus the detector's tags.
#[derive(Debug, Clone)]
pub struct DeobfuscateOptions {
    pub code: String,
    pub aggressive: bool,
    pub rename_variables: bool,
    pub advanced: Option<bool>,
    pub jsvmp: Option<bool>,
    pub ast_optimize: Option<bool>,
    pub unpack: Option<bool>,
    pub aggressive_vm: bool,
    pub timeout_ms: Option<u64>,
    pub auto: bool,
}

impl Default for DeobfuscateOptions {
    fn default() -> Self {
        Self {
            code: String::new(),
            aggressive: false,
            rename_variables: false,
            advanced: None,
            jsvmp: None,
            ast_optimize: None,
            unpack: None,
            aggressive_vm: false,
            timeout_ms: None,
            auto: true,
        }
    }
}

impl DeobfuscateOptions {
    pub fn for_code(code: impl Into<String>) -> Self {
        Self { code: code.into(), ..Self::default() }
    }
}
