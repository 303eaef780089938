use super::ProbeContext;
use crate::error::ProbeError;
use crate::report::{NetworkLatency, TargetLatency};
use crate::units::parse_duration_ms;
use regex::Regex;
use tracing::{debug, info, warn};

/// Ping each configured target from inside a container.
///
/// Targets that do not answer are left out of the result rather than zero-filled.
pub fn measure_latency(ctx: &ProbeContext<'_>) -> NetworkLatency {
    let settings = &ctx.config.probes;
    info!("Measuring network latency to {} targets", settings.ping_targets.len());
    let count = settings.ping_count.to_string();

    let result = ctx.with_container("network", |container| {
        let mut targets = Vec::new();
        for target in &settings.ping_targets {
            let output = ctx
                .engine
                .exec(container.id(), &["ping", "-c", count.as_str(), target.as_str()]);
            match output.map(|out| parse_ping_average(&out)) {
                Ok(Some(average_ms)) => targets.push(TargetLatency {
                    target: target.clone(),
                    average_ms,
                }),
                Ok(None) => debug!("No round-trip summary for {}", target),
                Err(e) => debug!("Ping to {} failed: {}", target, e),
            }
        }
        Ok::<_, ProbeError>(targets)
    });

    let targets = result.unwrap_or_else(|e| {
        warn!("Network probe degraded: {}", e);
        Vec::new()
    });
    NetworkLatency::from_targets(targets)
}

/// Pull the average round-trip time out of iputils or busybox `ping` output.
pub fn parse_ping_average(output: &str) -> Option<f64> {
    let re = Regex::new(
        r"(?:rtt|round-trip) min/avg/max(?:/(?:mdev|stddev))? = [\d.]+/([\d.]+)/[\d.]+(?:/[\d.]+)? ?([a-zµ]+)",
    )
    .ok()?;
    let caps = re.captures(output)?;
    parse_duration_ms(&format!("{}{}", &caps[1], &caps[2]))
}
