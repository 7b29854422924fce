//! Line-based diff primitives used by the merge engine.
//!
//! 1. **Normalization** -- whitespace canonicalization applied to every
//!    merge input before lines are compared.
//! 2. **Edit scripts** -- minimal line edits between two sequences (Myers,
//!    via the `similar` crate).
//! 3. **Preview** -- unified patch text for showing a fork against its
//!    parent (via `diffy`).

pub mod engine;
pub mod normalize;
pub mod preview;

pub use engine::{edit_script, Edit};
pub use normalize::{normalize_whitespace, split_lines};
pub use preview::unified_preview;
