pub mod ast;
pub mod cache;
pub mod detect;
pub mod error;
pub mod llm;
pub mod model;
pub mod score;
pub mod timeout;

pub use cache::ResultCache;
pub use detect::detect_obfuscation;
pub use error::StageError;
pub use model::{
    Complexity, DeobfuscateResult, InstructionKind, ObfuscationType, Transformation,
    UnresolvedPart, VmFeatures, VmInstruction,
};
