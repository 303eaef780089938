use super::ProbeContext;
use crate::engine::HistoryRow;
use crate::report::{ImageProfile, LayerRecord};
use crate::units::parse_decimal_size;
use tracing::{info, warn};

/// Image size and layer history. Sizes use the engine's decimal suffixes.
pub fn profile_image(ctx: &ProbeContext<'_>) -> ImageProfile {
    info!("Profiling image {}", ctx.image);

    let size_bytes = match ctx.engine.image_size(ctx.image) {
        Ok(size) => size.as_deref().and_then(parse_decimal_size),
        Err(e) => {
            warn!("Could not read image size: {}", e);
            None
        }
    };

    let layers = match ctx.engine.history(ctx.image) {
        Ok(rows) => to_layers(&rows),
        Err(e) => {
            warn!("Could not read image history: {}", e);
            Vec::new()
        }
    };

    ImageProfile {
        size_bytes,
        largest_layers: largest_layers(&layers, ctx.config.probes.top_layers),
        layers,
    }
}

fn to_layers(rows: &[HistoryRow]) -> Vec<LayerRecord> {
    rows.iter()
        .map(|row| LayerRecord {
            command: clean_command(&row.created_by),
            size_bytes: parse_decimal_size(&row.size).unwrap_or(0),
        })
        .collect()
}

/// The `n` biggest layers, biggest first; ties keep build order.
pub fn largest_layers(layers: &[LayerRecord], n: usize) -> Vec<LayerRecord> {
    let mut sorted = layers.to_vec();
    sorted.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
    sorted.truncate(n);
    sorted
}

/// Strip the shell wrapper the engine records for RUN steps.
fn clean_command(created_by: &str) -> String {
    let trimmed = created_by.trim();
    let without_shell = trimmed
        .strip_prefix("/bin/sh -c #(nop) ")
        .or_else(|| trimmed.strip_prefix("/bin/sh -c "))
        .unwrap_or(trimmed);
    without_shell.trim().to_string()
}
