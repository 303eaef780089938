use super::ProbeContext;
use crate::error::{ProbeError, Result};
use crate::lifecycle::ContainerGuard;
use crate::report::{DiskIo, Throughput};
use tracing::{debug, info, warn};

const SCRATCH_FILE: &str = "/tmp/dockprobe-io.tmp";

/// Time a sequential write then read of a scratch file inside a container.
///
/// Sizes are fixed by config and do not adapt to the container's resources,
/// so constrained images may report misleading numbers.
pub fn measure_disk_io(ctx: &ProbeContext<'_>) -> DiskIo {
    let settings = &ctx.config.probes;
    info!(
        "Measuring disk I/O ({}MB write, {}MB read)",
        settings.disk_write_mb, settings.disk_read_mb
    );

    let result = ctx.with_container("disk", |container| {
        let write = timed_dd(
            ctx,
            container,
            &format!(
                "dd if=/dev/zero of={} bs=1048576 count={} && sync",
                SCRATCH_FILE, settings.disk_write_mb
            ),
            settings.disk_write_mb,
        );
        let read = timed_dd(
            ctx,
            container,
            &format!(
                "dd if={} of=/dev/null bs=1048576 count={}",
                SCRATCH_FILE, settings.disk_read_mb
            ),
            settings.disk_read_mb,
        );
        if let Err(e) = ctx.engine.exec(container.id(), &["rm", "-f", SCRATCH_FILE]) {
            debug!("Could not remove scratch file: {}", e);
        }

        Ok::<_, ProbeError>(DiskIo::from_directions(
            log_direction("write", write),
            log_direction("read", read),
        ))
    });

    result.unwrap_or_else(|e| {
        warn!("Disk probe degraded: {}", e);
        DiskIo::from_directions(None, None)
    })
}

fn timed_dd(
    ctx: &ProbeContext<'_>,
    container: &ContainerGuard<'_>,
    script: &str,
    megabytes: u64,
) -> Result<Throughput> {
    let (output, elapsed) = ctx.timed(|| ctx.engine.exec(container.id(), &["sh", "-c", script]));
    output.map_err(|e| ProbeError::measurement("disk", e.message))?;
    Ok(Throughput::new(megabytes, elapsed))
}

fn log_direction(direction: &str, result: Result<Throughput>) -> Option<Throughput> {
    result
        .map_err(|e| warn!("Disk {} test failed: {}", direction, e))
        .ok()
}
