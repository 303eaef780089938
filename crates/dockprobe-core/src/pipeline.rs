use crate::clock::Clock;
use crate::config::ProbeConfig;
use crate::engine::{CommandRunner, Engine};
use crate::error::Result;
use crate::lifecycle::{AcquiredImage, CleanupOutcome, ImageManager};
use crate::probes::vulnerability::{default_sources, scan_vulnerabilities, VulnerabilitySource};
use crate::probes::{build, cpu, disk, image_profile, memory, network, permissions, secrets, startup};
use crate::probes::ProbeContext;
use crate::recommend::recommend;
use crate::report::{PerformanceReport, PipelineReport, ScanReport};
use tracing::info;

/// Sequences image acquisition, the probes, recommendations and cleanup.
///
/// Probes run strictly one after another so they never compete for the
/// host's CPU, memory or disk.
pub struct Pipeline<'a> {
    engine: Engine<'a>,
    clock: &'a dyn Clock,
    config: &'a ProbeConfig,
    sources: Vec<Box<dyn VulnerabilitySource>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(runner: &'a dyn CommandRunner, clock: &'a dyn Clock, config: &'a ProbeConfig) -> Self {
        Self {
            engine: Engine::new(runner).with_timeouts(
                config.probes.command_timeout(),
                config.pipeline.build_timeout(),
            ),
            clock,
            config,
            sources: default_sources(),
        }
    }

    /// Replace the vulnerability scan chain.
    pub fn with_vulnerability_sources(mut self, sources: Vec<Box<dyn VulnerabilitySource>>) -> Self {
        self.sources = sources;
        self
    }

    /// Benchmark and scan one image. Only acquisition failure is an error.
    pub fn run(&self, image_tag: Option<&str>) -> Result<PipelineReport> {
        self.with_image(image_tag, |ctx| PipelineReport {
            performance: self.performance(ctx),
            security: self.security(ctx),
        })
    }

    pub fn benchmark(&self, image_tag: Option<&str>) -> Result<PerformanceReport> {
        self.with_image(image_tag, |ctx| self.performance(ctx))
    }

    pub fn scan(&self, image_tag: Option<&str>) -> Result<ScanReport> {
        self.with_image(image_tag, |ctx| self.security(ctx))
    }

    fn with_image<T>(&self, image_tag: Option<&str>, f: impl FnOnce(&ProbeContext<'_>) -> T) -> Result<T> {
        let images = ImageManager::new(&self.engine, &self.config.pipeline);
        let lease = ImageLease::new(&images, images.acquire(image_tag)?);

        let ctx = ProbeContext::new(&self.engine, self.clock, self.config, &lease.image.tag);
        let value = f(&ctx);
        drop(ctx);

        lease.release();
        Ok(value)
    }

    fn performance(&self, ctx: &ProbeContext<'_>) -> PerformanceReport {
        info!("Benchmarking {}", ctx.image);
        let mut report = PerformanceReport {
            image: ctx.image.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            image_profile: image_profile::profile_image(ctx),
            build_time: build::measure_build_time(ctx),
            startup_time: startup::measure_startup_time(ctx),
            memory: memory::measure_memory(ctx),
            cpu: cpu::measure_cpu(ctx),
            network: network::measure_latency(ctx),
            disk: disk::measure_disk_io(ctx),
            recommendations: Vec::new(),
        };
        report.recommendations = recommend(&report, &self.config.thresholds);
        report
    }

    fn security(&self, ctx: &ProbeContext<'_>) -> ScanReport {
        info!("Scanning {}", ctx.image);
        ScanReport {
            image: ctx.image.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            vulnerabilities: scan_vulnerabilities(ctx, &self.sources),
            secrets: secrets::scan_secrets(ctx),
            permissions: permissions::check_permissions(ctx),
        }
    }
}

/// Releases the acquired image exactly once: explicitly, or on drop if a
/// probe panics.
struct ImageLease<'m> {
    images: &'m ImageManager<'m>,
    image: AcquiredImage,
    released: bool,
}

impl<'m> ImageLease<'m> {
    fn new(images: &'m ImageManager<'m>, image: AcquiredImage) -> Self {
        Self {
            images,
            image,
            released: false,
        }
    }

    fn release(mut self) -> CleanupOutcome {
        self.release_once()
    }

    fn release_once(&mut self) -> CleanupOutcome {
        if self.released {
            return CleanupOutcome::Skipped;
        }
        self.released = true;
        self.images.release(&self.image)
    }
}

impl Drop for ImageLease<'_> {
    fn drop(&mut self) {
        self.release_once();
    }
}
