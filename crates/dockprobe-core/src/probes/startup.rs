use super::ProbeContext;
use crate::error::Result;
use crate::stats::{aggregate, AggregatedMetric, Sample};
use tracing::{info, warn};

/// Time from `run -d` until the container is ready, over several fresh containers.
pub fn measure_startup_time(ctx: &ProbeContext<'_>) -> AggregatedMetric {
    let iterations = ctx.config.probes.startup_iterations;
    info!("Measuring startup time ({} iterations)", iterations);

    let samples: Vec<Sample> = (0..iterations)
        .map(|i| {
            let sample = Sample::from(start_once(ctx));
            if let Sample::Failed(reason) = &sample {
                warn!("Startup iteration {} failed: {}", i + 1, reason);
            }
            sample
        })
        .collect();

    aggregate(&samples, "ms")
}

fn start_once(ctx: &ProbeContext<'_>) -> Result<f64> {
    let timeout = ctx.config.probes.readiness_timeout();
    let (ready, elapsed) = ctx.timed(|| -> Result<_> {
        let mut container = ctx.containers.start_detached(ctx.image, "startup")?;
        ctx.containers.await_ready(&mut container, timeout)?;
        Ok(container)
    });

    // the guard is dropped (and cleaned up) on the error path
    ready?.teardown();
    Ok(elapsed)
}
