use thiserror::Error;

/// Failure of a single pipeline stage.
///
/// Stages return `Result<String, StageError>`; the orchestrator records the
/// failure as an unsuccessful transformation and continues with the code it
/// already has. Stage errors never abort the pipeline.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("parse failed: {0}")]
    Parse(String),
    #[error("code generation failed: {0}")]
    Codegen(String),
    #[error("{0}")]
    Transform(String),
}

impl StageError {
    pub fn transform(msg: impl Into<String>) -> Self {
        StageError::Transform(msg.into())
    }
}
