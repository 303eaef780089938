pub mod container;
pub mod image;

pub use container::{ContainerGuard, ContainerManager, ContainerPhase};
pub use image::{AcquiredImage, ImageManager};

use serde::{Deserialize, Serialize};

/// Result of a best-effort cleanup step.
///
/// Kept apart from the primary result: a failed cleanup is logged and
/// reported here, but never turns a successful probe into an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanupOutcome {
    Done,
    /// Nothing to clean up (caller-owned or explicitly retained).
    Skipped,
    Failed(String),
}

impl CleanupOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, CleanupOutcome::Failed(_))
    }
}
