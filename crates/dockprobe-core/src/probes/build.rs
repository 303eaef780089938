use super::ProbeContext;
use crate::error::{ProbeError, Result};
use crate::lifecycle::image::unique_tag;
use crate::stats::{aggregate, AggregatedMetric, Sample};
use tracing::{info, warn};

/// Rebuild the project without layer cache and time each build.
pub fn measure_build_time(ctx: &ProbeContext<'_>) -> AggregatedMetric {
    let iterations = ctx.config.probes.build_iterations;
    info!("Measuring build time ({} iterations)", iterations);

    let samples: Vec<Sample> = (0..iterations)
        .map(|i| {
            let sample = Sample::from(build_once(ctx));
            if let Sample::Failed(reason) = &sample {
                warn!("Build iteration {} failed: {}", i + 1, reason);
            }
            sample
        })
        .collect();

    aggregate(&samples, "ms")
}

fn build_once(ctx: &ProbeContext<'_>) -> Result<f64> {
    let prefix = format!("{}-buildtime", ctx.config.pipeline.tag_prefix);
    let tag = unique_tag(&prefix);
    let context = &ctx.config.pipeline.context_dir;

    let (result, elapsed) = ctx.timed(|| ctx.engine.build(context, &tag, true));
    // a failed build may still leave a partial tag behind
    if let Err(e) = ctx.engine.remove_image(&tag) {
        if result.is_ok() {
            warn!("Failed to remove build-time image {}: {}", tag, e);
        }
    }

    result.map_err(|e| ProbeError::measurement("build", e.message))?;
    Ok(elapsed)
}
