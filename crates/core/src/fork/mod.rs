//! Forks: private working copies of a document that are later merged back
//! into it.

pub mod fields;
pub mod manager;

pub use fields::{FieldFilter, ForkField, ForkFields};
pub use manager::{ForkFilter, ForkManager};
