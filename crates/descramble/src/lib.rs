//! descramble — staged JavaScript deobfuscation.
//!
//! Feed a protected source string in, get readable code plus a full account
//! of what happened back out:
//!
//! ```
//! use descramble::{Deobfuscator, DeobfuscateOptions};
//!
//! let mut pipeline = Deobfuscator::default();
//! let packed =
//!     "eval(function(p,a,c,k,e,d){return p}('0 1',62,2,'hello|world'.split('|'),0,{}))";
//! let result = pipeline.deobfuscate(&DeobfuscateOptions::for_code(packed)).unwrap();
//! assert!(result.code.contains("hello"));
//! ```
//!
//! The pipeline detects obfuscation techniques once, then runs unpacking,
//! VM reversal, external collaborators and the cleanup passes in a fixed
//! order, appending one [`Transformation`] record per stage attempt. Stage
//! failures never abort the pipeline; they surface through
//! `transformations[].success == false` and `warnings`.

pub mod collab;
pub mod options;
pub mod pipeline;

pub use collab::{AdvancedDeobfuscator, AdvancedOutcome, AdvancedRequest, AstOptimizer};
pub use options::DeobfuscateOptions;
pub use pipeline::{Deobfuscator, DeobfuscatorConfig};

pub use descramble_core::llm::{ChatMessage, ChatOptions, ChatResponse, LlmClient};
pub use descramble_core::model::{
    Complexity, DeobfuscateResult, InstructionKind, ObfuscationType, Transformation,
    UnresolvedPart, VmFeatures, VmInstruction,
};
