//! Post-forking core library.
//!
//! Editors fork a published document into a private draft, edit it, and
//! publish it back. Publishing runs a three-way merge of the fork against
//! the parent's current content from the revision the fork started at:
//! clean merges overwrite the parent, conflicts bounce the fork back to the
//! editor with conflict markers.

pub mod app;
pub mod cache;
pub mod config;
pub mod db;
pub mod diff;
pub mod errors;
pub mod fork;
pub mod identity;
pub mod logging;
pub mod merge;
pub mod models;
pub mod store;

// Re-exports for convenience.
pub use app::{App, RequestScope};
pub use config::AppConfig;
pub use db::Database;
pub use errors::CoreError;
pub use fork::{ForkField, ForkFilter, ForkManager};
pub use identity::{IdentityProvider, MappedIdentity};
pub use merge::{ForkRef, MergeOrchestrator, MergeResult, PendingSave, PublishPipeline, SaveDecision};
pub use store::DocumentStore;
