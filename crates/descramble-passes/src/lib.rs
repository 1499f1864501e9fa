//! Cleanup passes over freshly parsed trees.
//!
//! Each pass is independent: parse, transform, print, drop the tree. A pass
//! that cannot parse its input returns a [`StageError`] and the pipeline
//! continues with the code it already had; no tree ever crosses a pass
//! boundary.

pub mod fold;
pub mod rename;
pub mod simplify;
pub mod string_array;
pub mod strings;
pub mod unflatten;

pub use fold::fold_constants;
pub use rename::rename_variables;
pub use simplify::simplify_expressions;
pub use string_array::{decrypt_string_arrays, extract_string_arrays, StringArrayTable};
pub use strings::decode_string_literals;
pub use unflatten::unflatten_control_flow;
