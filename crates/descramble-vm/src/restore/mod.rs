//! Per-family restoration.
//!
//! One restorer per [`VmType`] variant behind a common trait; the engine
//! dispatches on the closed enum, never on strings. Restorers do not fail:
//! anything unrecoverable is reported through warnings and unresolved parts
//! while the best available code is returned.

mod custom;
mod jjencode;
mod jsfuck;
mod obfuscator_io;

use descramble_core::llm::LlmClient;
use descramble_core::model::{UnresolvedPart, VmFeatures};

use crate::classify::VmType;

pub struct RestoreInput<'a> {
    pub code: &'a str,
    pub aggressive: bool,
    pub features: &'a VmFeatures,
    pub llm: Option<&'a dyn LlmClient>,
}

#[derive(Debug, Clone)]
pub struct Restoration {
    pub code: String,
    pub confidence: f64,
    pub warnings: Vec<String>,
    pub unresolved: Vec<UnresolvedPart>,
}

impl Restoration {
    pub fn untouched(code: &str, confidence: f64, warning: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            confidence,
            warnings: vec![warning.into()],
            unresolved: Vec::new(),
        }
    }
}

pub trait VmRestorer {
    fn restore(&self, input: &RestoreInput<'_>) -> Restoration;
}

pub fn restorer_for(vm_type: VmType) -> Box<dyn VmRestorer> {
    match vm_type {
        VmType::ObfuscatorIo => Box::new(obfuscator_io::ObfuscatorIoRestorer),
        VmType::JsFuck => Box::new(jsfuck::JsFuckRestorer),
        VmType::JjEncode => Box::new(jjencode::JjEncodeRestorer),
        VmType::Custom => Box::new(custom::CustomRestorer),
    }
}
