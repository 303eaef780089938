/// Power-of-1000 suffixes used by the engine for image and layer sizes.
const DECIMAL_UNITS: &[(&str, f64)] = &[
    ("B", 1.0),
    ("kB", 1e3),
    ("KB", 1e3),
    ("MB", 1e6),
    ("GB", 1e9),
    ("TB", 1e12),
];

/// Power-of-1024 suffixes used by the engine for live memory statistics.
const BINARY_UNITS: &[(&str, f64)] = &[
    ("B", 1.0),
    ("KiB", 1024.0),
    ("MiB", 1_048_576.0),
    ("GiB", 1_073_741_824.0),
    ("TiB", 1_099_511_627_776.0),
];

const DURATION_UNITS: &[(&str, f64)] = &[
    ("ns", 1e-6),
    ("us", 1e-3),
    ("µs", 1e-3),
    ("ms", 1.0),
    ("s", 1_000.0),
    ("m", 60_000.0),
    ("h", 3_600_000.0),
];

/// Parse an image/layer size such as `"245MB"` or `"1.2GB"` into bytes.
///
/// Binary suffixes (`MiB`, ...) are rejected: they belong to
/// [`parse_binary_size`] and must not be read as decimal sizes.
pub fn parse_decimal_size(raw: &str) -> Option<u64> {
    parse_with_units(raw, DECIMAL_UNITS).map(|v| v.round() as u64)
}

/// Parse a memory figure such as `"128MiB"` or `"2GiB"` into bytes.
pub fn parse_binary_size(raw: &str) -> Option<u64> {
    parse_with_units(raw, BINARY_UNITS).map(|v| v.round() as u64)
}

/// Format a byte count with binary suffixes and two decimals (`"128.00MiB"`).
pub fn format_binary_size(bytes: u64) -> String {
    let mut unit = BINARY_UNITS[0];
    for candidate in BINARY_UNITS {
        if bytes as f64 >= candidate.1 {
            unit = *candidate;
        }
    }
    format!("{:.2}{}", bytes as f64 / unit.1, unit.0)
}

/// Format a byte count with decimal suffixes, as image sizes are shown.
pub fn format_decimal_size(bytes: u64) -> String {
    let mut unit = DECIMAL_UNITS[0];
    for candidate in DECIMAL_UNITS.iter().filter(|(s, _)| *s != "KB") {
        if bytes as f64 >= candidate.1 {
            unit = *candidate;
        }
    }
    format!("{:.2}{}", bytes as f64 / unit.1, unit.0)
}

/// Parse `"6.00%"` into `6.0`.
pub fn parse_percentage(raw: &str) -> Option<f64> {
    let value = raw.trim().strip_suffix('%')?.trim();
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a duration like `"250ms"`, `"1.5s"` or `"1m30.5s"` into milliseconds.
pub fn parse_duration_ms(raw: &str) -> Option<f64> {
    let mut rest = raw.trim();
    if rest.is_empty() {
        return None;
    }

    let mut total = 0.0;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: f64 = rest[..digits].parse().ok()?;
        rest = rest[digits..].trim_start();

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c.is_whitespace())
            .unwrap_or(rest.len());
        let (_, factor) = DURATION_UNITS
            .iter()
            .find(|(suffix, _)| *suffix == &rest[..unit_len])?;
        total += value * factor;
        rest = rest[unit_len..].trim_start();
    }

    Some(total)
}

fn parse_with_units(raw: &str, units: &[(&str, f64)]) -> Option<f64> {
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    if split == 0 {
        return None;
    }

    let value: f64 = trimmed[..split].parse().ok()?;
    let suffix = trimmed[split..].trim();
    let (_, factor) = units.iter().find(|(s, _)| *s == suffix)?;
    Some(value * factor)
}
