//! Parser for `df -k` output.
//!
//! Parses disk usage information into typed structs with kilobyte values.

use super::atoms::field_or;
use crate::error::{Result, TelemetryError};
use crate::records::{MountInfo, StorageInfo};
use crate::units::{kb_to_gb, percentage};
use tracing::trace;

/// Parse `df -k` output into a list of mounts.
///
/// Expected format:
/// ```text
/// Filesystem     1K-blocks    Used Available Use% Mounted on
/// /dev/block/dm-4  5127252 5112968         0 100% /
/// /dev/fuse      115454824 8004000 107319224   7% /storage/emulated
/// ```
///
/// The first non-blank line is the header. Rows with fewer than six columns are
/// dropped; unparseable numeric columns default to 0.
pub fn parse_df_table(text: &str) -> Result<Vec<MountInfo>> {
    let mounts: Vec<MountInfo> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .skip(1)
        .filter_map(parse_df_row)
        .collect();

    if mounts.is_empty() {
        return Err(TelemetryError::extraction("mounts", "no df rows found"));
    }
    Ok(mounts)
}

/// Parse a single df output row.
///
/// The mountpoint is every token after Use%, rejoined with single spaces.
pub fn parse_df_row(line: &str) -> Option<MountInfo> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    // Filesystem Size Used Avail Use% Mounted_on...
    if parts.len() < 6 {
        trace!("  df: dropping short row '{}'", line);
        return None;
    }

    let use_percent: u8 = field_or("use_percent", parts[4].trim_end_matches('%'), 0);

    Some(MountInfo {
        filesystem: parts[0].to_string(),
        size_kb: field_or("size_kb", parts[1], 0),
        used_kb: field_or("used_kb", parts[2], 0),
        available_kb: field_or("available_kb", parts[3], 0),
        use_percent: use_percent.min(100),
        mountpoint: parts[5..].join(" "),
    })
}

/// Usage of one partition from `df <path>` output.
///
/// Takes the last data row, so the header may or may not be present.
pub fn parse_storage(text: &str) -> Result<StorageInfo> {
    let row = text
        .lines()
        .rev()
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with("Filesystem"))
        .find_map(parse_df_row)
        .ok_or_else(|| TelemetryError::extraction("storage", "no df row found"))?;

    Ok(StorageInfo {
        total_gb: kb_to_gb(row.size_kb),
        used_gb: kb_to_gb(row.used_kb),
        free_gb: kb_to_gb(row.available_kb),
        usage_percent: percentage(row.used_kb, row.size_kb),
        filesystem: row.filesystem,
    })
}
