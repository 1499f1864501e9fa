use serde::{Deserialize, Serialize};

/// Obfuscation techniques the detector can tag a sample with. A sample maps
/// to a set of tags; `Unknown` is only reported when nothing else fired.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ObfuscationType {
    #[serde(rename = "javascript-obfuscator")]
    JavascriptObfuscator,
    #[serde(rename = "webpack")]
    Webpack,
    #[serde(rename = "uglify")]
    Uglify,
    #[serde(rename = "vm-protection")]
    VmProtection,
    #[serde(rename = "packer")]
    Packer,
    #[serde(rename = "aaencode")]
    AaEncode,
    #[serde(rename = "urlencoded")]
    UrlEncoded,
    #[serde(rename = "invisible-unicode")]
    InvisibleUnicode,
    #[serde(rename = "control-flow-flattening")]
    ControlFlowFlattening,
    #[serde(rename = "opaque-predicates")]
    OpaquePredicates,
    #[serde(rename = "dead-code-injection")]
    DeadCodeInjection,
    #[serde(rename = "string-array-rotation")]
    StringArrayRotation,
    #[serde(rename = "jsfuck")]
    JsFuck,
    #[serde(rename = "eval-obfuscation")]
    EvalObfuscation,
    #[serde(rename = "hex-encoding")]
    HexEncoding,
    #[serde(rename = "base64-encoding")]
    Base64Encoding,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ObfuscationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObfuscationType::JavascriptObfuscator => "javascript-obfuscator",
            ObfuscationType::Webpack => "webpack",
            ObfuscationType::Uglify => "uglify",
            ObfuscationType::VmProtection => "vm-protection",
            ObfuscationType::Packer => "packer",
            ObfuscationType::AaEncode => "aaencode",
            ObfuscationType::UrlEncoded => "urlencoded",
            ObfuscationType::InvisibleUnicode => "invisible-unicode",
            ObfuscationType::ControlFlowFlattening => "control-flow-flattening",
            ObfuscationType::OpaquePredicates => "opaque-predicates",
            ObfuscationType::DeadCodeInjection => "dead-code-injection",
            ObfuscationType::StringArrayRotation => "string-array-rotation",
            ObfuscationType::JsFuck => "jsfuck",
            ObfuscationType::EvalObfuscation => "eval-obfuscation",
            ObfuscationType::HexEncoding => "hex-encoding",
            ObfuscationType::Base64Encoding => "base64-encoding",
            ObfuscationType::Unknown => "unknown",
        }
    }
}

/// One append-only record per stage attempt. A failed attempt never removes
/// a previously successful code state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transformation {
    pub kind: String,
    pub description: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Transformation {
    pub fn succeeded(kind: &str, description: impl Into<String>) -> Self {
        Self { kind: kind.to_string(), description: description.into(), success: true, detail: None }
    }

    pub fn failed(kind: &str, description: impl Into<String>) -> Self {
        Self { kind: kind.to_string(), description: description.into(), success: false, detail: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A region a stage could not restore. Surfaced verbatim to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedPart {
    pub location: String,
    pub reason: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeobfuscateResult {
    pub code: String,
    pub readability_score: u8,
    pub confidence: f64,
    pub obfuscation_type: Vec<ObfuscationType>,
    pub transformations: Vec<Transformation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub unresolved_parts: Vec<UnresolvedPart>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

/// Structural signature of a suspected interpreter loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmFeatures {
    pub instruction_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpreter_location: Option<String>,
    pub complexity: Complexity,
    pub has_switch: bool,
    pub has_instruction_array: bool,
    pub has_program_counter: bool,
}

impl Default for VmFeatures {
    fn default() -> Self {
        Self {
            instruction_count: 0,
            interpreter_location: None,
            complexity: Complexity::Low,
            has_switch: false,
            has_instruction_array: false,
            has_program_counter: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InstructionKind {
    StackOp,
    Assign,
    Call,
    Branch,
    Unknown,
}

/// One entry per `case` in a VM dispatcher switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmInstruction {
    pub opcode: String,
    pub name: String,
    pub kind: InstructionKind,
    pub description: String,
}
