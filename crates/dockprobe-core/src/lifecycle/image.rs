use super::CleanupOutcome;
use crate::config::PipelineSettings;
use crate::engine::Engine;
use crate::error::{ProbeError, Result};
use tracing::{info, warn};

/// The image under test and whether this run is responsible for removing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredImage {
    pub tag: String,
    pub owned: bool,
}

/// Resolves the target image and removes it again when it built it.
pub struct ImageManager<'e> {
    engine: &'e Engine<'e>,
    settings: &'e PipelineSettings,
}

impl<'e> ImageManager<'e> {
    pub fn new(engine: &'e Engine<'e>, settings: &'e PipelineSettings) -> Self {
        Self { engine, settings }
    }

    /// Use `tag` as-is, or build the context directory under a fresh tag.
    pub fn acquire(&self, tag: Option<&str>) -> Result<AcquiredImage> {
        if let Some(tag) = tag {
            info!("Using existing image {}", tag);
            return Ok(AcquiredImage {
                tag: tag.to_string(),
                owned: false,
            });
        }

        let tag = unique_tag(&self.settings.tag_prefix);
        info!(
            "Building image {} from {}",
            tag,
            self.settings.context_dir.display()
        );
        self.engine
            .build(&self.settings.context_dir, &tag, false)
            .map_err(|e| ProbeError::Acquisition {
                image: tag.clone(),
                reason: e.message,
            })?;

        Ok(AcquiredImage { tag, owned: true })
    }

    /// Force-remove an owned image. Never fails; the outcome is only reported.
    pub fn release(&self, image: &AcquiredImage) -> CleanupOutcome {
        if !image.owned {
            return CleanupOutcome::Skipped;
        }
        if self.settings.keep_image {
            info!("Keeping image {}", image.tag);
            return CleanupOutcome::Skipped;
        }

        match self.engine.remove_image(&image.tag) {
            Ok(()) => {
                info!("Removed image {}", image.tag);
                CleanupOutcome::Done
            }
            Err(e) => {
                warn!("Failed to remove image {}: {}", image.tag, e);
                CleanupOutcome::Failed(e.message)
            }
        }
    }
}

/// Tag unique per process and per millisecond, e.g. `dockprobe-bench:20261018T101500123-4242`.
pub fn unique_tag(prefix: &str) -> String {
    format!(
        "{}:{}-{}",
        prefix,
        chrono::Utc::now().format("%Y%m%dT%H%M%S%3f"),
        std::process::id()
    )
}
