//! Capacity strings
//!
//! Sizes are accepted as `200GB`, `10Gi`, `1.5T` or a plain byte count.
//! All units are binary: `1GB` is 2^30 bytes, matching what the cluster
//! reports for volume sizes.

use crate::error::{Error, Result};

/// Parse a capacity string into bytes
pub fn parse_capacity(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::CapacityParse("empty capacity string".into()));
    }

    let num_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map_or(s.len(), |(i, _)| i);

    let num_str = &s[..num_end];
    let unit_str = s[num_end..].trim();

    let num: f64 = num_str
        .parse()
        .map_err(|_| Error::CapacityParse(format!("invalid number: {}", s)))?;

    let multiplier: u64 = match unit_str.to_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KI" | "KIB" => 1 << 10,
        "M" | "MB" | "MI" | "MIB" => 1 << 20,
        "G" | "GB" | "GI" | "GIB" => 1 << 30,
        "T" | "TB" | "TI" | "TIB" => 1 << 40,
        "P" | "PB" | "PI" | "PIB" => 1 << 50,
        _ => {
            return Err(Error::CapacityParse(format!(
                "unknown unit: {}",
                unit_str
            )))
        }
    };

    let value = num * multiplier as f64;
    // u64::MAX rounds up to 2^64 as f64, so anything at or above it is out of range
    if !value.is_finite() || value >= u64::MAX as f64 {
        return Err(Error::CapacityParse(format!("capacity too large: {}", s)));
    }

    let bytes = value as u64;
    if bytes == 0 {
        return Err(Error::CapacityParse(format!("capacity must be positive: {}", s)));
    }
    Ok(bytes)
}

/// Render a byte count with the largest whole binary unit
pub fn format_capacity(bytes: u64) -> String {
    const UNITS: [(&str, u64); 5] = [
        ("PiB", 1 << 50),
        ("TiB", 1 << 40),
        ("GiB", 1 << 30),
        ("MiB", 1 << 20),
        ("KiB", 1 << 10),
    ];

    UNITS
        .iter()
        .find(|(_, size)| bytes >= *size && bytes % size == 0)
        .map(|(unit, size)| format!("{}{}", bytes / size, unit))
        .unwrap_or_else(|| format!("{}B", bytes))
}
