use super::ProbeContext;
use crate::error::{ProbeError, Result};
use crate::report::{MemoryUsage, Rating};
use crate::units::{parse_binary_size, parse_percentage};
use tracing::{info, warn};

/// Sample memory once after the warm-up delay. Failures yield "Unknown".
pub fn measure_memory(ctx: &ProbeContext<'_>) -> MemoryUsage {
    info!("Measuring memory usage");
    let result = ctx.with_warm_container("memory", |container| {
        let stats = ctx
            .engine
            .stats(container.id())
            .map_err(|e| ProbeError::measurement("memory", e.message))?;
        parse_memory_stats(&stats.mem_usage, &stats.mem_percent)
    });

    result.unwrap_or_else(|e| {
        warn!("Memory probe degraded: {}", e);
        MemoryUsage::unknown()
    })
}

/// Parse `"128MiB / 2GiB"` and `"6.00%"` from the engine's live stats.
pub fn parse_memory_stats(usage: &str, percent: &str) -> Result<MemoryUsage> {
    let (current, total) = usage
        .split_once('/')
        .ok_or_else(|| ProbeError::measurement("memory", format!("bad usage '{}'", usage)))?;
    let current_bytes = parse_binary_size(current)
        .ok_or_else(|| ProbeError::measurement("memory", format!("bad size '{}'", current)))?;
    let total_bytes = parse_binary_size(total)
        .ok_or_else(|| ProbeError::measurement("memory", format!("bad size '{}'", total)))?;
    let percentage = parse_percentage(percent)
        .ok_or_else(|| ProbeError::measurement("memory", format!("bad percentage '{}'", percent)))?;

    Ok(MemoryUsage {
        current_bytes: Some(current_bytes),
        total_bytes: Some(total_bytes),
        percentage: Some(percentage),
        efficiency: Rating::for_memory(Some(percentage)),
    })
}
