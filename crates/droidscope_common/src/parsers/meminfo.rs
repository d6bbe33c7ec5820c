//! Parser for `/proc/meminfo`.

use super::atoms::{field_or, parse_key_value_block};
use crate::error::{Result, TelemetryError};
use crate::records::MemoryInfo;
use crate::units::{kb_to_mb, percentage};
use std::collections::BTreeMap;

/// Kilobyte value of a meminfo line such as `MemTotal:  3809216 kB`.
fn kb(data: &BTreeMap<String, String>, key: &str) -> Option<u64> {
    let raw = data.get(key)?;
    let number = raw.split_whitespace().next().unwrap_or_default();
    Some(field_or(key, number, 0))
}

/// Parse `/proc/meminfo` into megabyte figures.
///
/// Used memory is `MemTotal - MemAvailable`, computed in kB before rounding.
pub fn parse_meminfo(text: &str) -> Result<MemoryInfo> {
    let data = parse_key_value_block("memory", text)?;

    let total_kb = kb(&data, "MemTotal")
        .ok_or_else(|| TelemetryError::extraction("memory", "MemTotal missing"))?;
    let available_kb = kb(&data, "MemAvailable").unwrap_or(0);
    let used_kb = total_kb.saturating_sub(available_kb);

    Ok(MemoryInfo {
        total_mb: kb_to_mb(total_kb),
        available_mb: kb_to_mb(available_kb),
        used_mb: kb_to_mb(used_kb),
        usage_percent: percentage(used_kb, total_kb),
        swap_total_mb: kb_to_mb(kb(&data, "SwapTotal").unwrap_or(0)),
        swap_free_mb: kb_to_mb(kb(&data, "SwapFree").unwrap_or(0)),
    })
}
