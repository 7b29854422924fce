//! Three-way merging of forks back into their parents.

pub mod diff3;
pub mod orchestrator;
pub mod publish;
pub mod result;

pub use diff3::Merger;
pub use orchestrator::{ConflictNotice, ForkRef, MergeOrchestrator, CONFLICT_MESSAGE};
pub use publish::{PendingSave, PublishOutcome, PublishPipeline, Redirect, SaveDecision};
pub use result::{ConflictMarker, MergeRegion, MergeResult};
