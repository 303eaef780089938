use super::ProbeContext;
use crate::error::ProbeError;
use crate::report::{CpuUsage, Rating};
use crate::stats::{aggregate, AggregatedMetric, Sample};
use crate::units::parse_percentage;
use tracing::{info, warn};

/// Sample CPU usage at a fixed interval after the warm-up delay and average it.
pub fn measure_cpu(ctx: &ProbeContext<'_>) -> CpuUsage {
    let settings = &ctx.config.probes;
    info!("Measuring CPU usage ({} samples)", settings.cpu_samples);

    let result = ctx.with_warm_container("cpu", |container| {
        let mut samples = Vec::with_capacity(settings.cpu_samples);
        for i in 0..settings.cpu_samples {
            if i > 0 {
                ctx.clock.sleep(settings.cpu_sample_interval());
            }
            let sample = match ctx.engine.stats(container.id()) {
                Ok(stats) => parse_percentage(&stats.cpu_percent)
                    .map(Sample::Ok)
                    .unwrap_or_else(|| Sample::Failed(format!("bad CPU value '{}'", stats.cpu_percent))),
                Err(e) => Sample::Failed(e.message),
            };
            samples.push(sample);
        }
        Ok::<_, ProbeError>(aggregate(&samples, "%"))
    });

    let metric = result.unwrap_or_else(|e| {
        warn!("CPU probe degraded: {}", e);
        AggregatedMetric::unavailable("%", 0)
    });
    if !metric.available {
        warn!("No CPU samples collected");
    }

    CpuUsage {
        efficiency: Rating::for_cpu(metric.measured()),
        metric,
    }
}
