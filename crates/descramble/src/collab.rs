//! External collaborator contracts.
//!
//! The advanced deobfuscator and the AST optimizer are separate systems;
//! only their call/return shapes are owned here. Implementations are
//! injected on construction and every call is guarded by the pipeline, so a
//! collaborator may fail freely without taking the pipeline down.

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct AdvancedRequest {
    pub code: String,
    pub aggressive: bool,
}

#[derive(Debug, Clone)]
pub struct AdvancedOutcome {
    pub code: String,
    pub detected_techniques: Vec<String>,
    pub confidence: f64,
    pub warnings: Vec<String>,
}

pub trait AdvancedDeobfuscator: Send + Sync {
    fn deobfuscate(&self, request: &AdvancedRequest) -> Result<AdvancedOutcome>;
}

pub trait AstOptimizer: Send + Sync {
    fn optimize(&self, code: &str) -> Result<String>;
}
