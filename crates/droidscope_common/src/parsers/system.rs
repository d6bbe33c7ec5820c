//! Parsers for single-line system replies: uptime, display, device list, addresses.

use super::atoms::{field_or, value_after_colon};
use crate::error::{Result, TelemetryError};
use crate::records::{DisplayInfo, UptimeInfo};
use chrono::{DateTime, Duration, Utc};

/// Parse `/proc/uptime` (`"12345.67 54321.00"`) relative to `now`.
///
/// Fractional seconds are truncated.
pub fn parse_uptime(text: &str, now: DateTime<Utc>) -> Result<UptimeInfo> {
    let first = text
        .split_whitespace()
        .next()
        .ok_or_else(|| TelemetryError::extraction("uptime", "empty /proc/uptime"))?;
    let seconds: f64 = first
        .parse()
        .map_err(|_| TelemetryError::extraction("uptime", format!("not a number: '{}'", first)))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(TelemetryError::extraction("uptime", format!("invalid uptime: '{}'", first)));
    }

    let out_of_range = || TelemetryError::extraction("uptime", format!("out of range: '{}'", first));
    let whole = i64::try_from(seconds.trunc() as u64).map_err(|_| out_of_range())?;
    let boot_time = Duration::try_seconds(whole)
        .and_then(|elapsed| now.checked_sub_signed(elapsed))
        .ok_or_else(out_of_range)?;
    let uptime_seconds = whole as u64;

    Ok(UptimeInfo {
        uptime_seconds,
        uptime_formatted: format_uptime(uptime_seconds),
        boot_time,
    })
}

/// `1d 2h 30m 45s`, dropping leading zero units down to minutes.
pub fn format_uptime(total: u64) -> String {
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else {
        format!("{}m {}s", minutes, seconds)
    }
}

/// Parse the first lines of `wm size` and `wm density`.
///
/// ```text
/// Physical size: 1080x2400
/// Physical density: 420
/// ```
/// Missing size becomes `"unknown"`, missing or odd density becomes 0.
pub fn parse_display(size_text: &str, density_text: &str) -> DisplayInfo {
    let size_px = value_after_colon(size_text)
        .unwrap_or("unknown")
        .to_string();

    let density_dpi = value_after_colon(density_text)
        .and_then(|v| v.split_whitespace().next())
        .map(|v| field_or("density_dpi", v, 0))
        .unwrap_or(0);

    DisplayInfo { size_px, density_dpi }
}

/// True if `adb devices` output lists at least one device in state `device`.
///
/// The first line is the `List of devices attached` header.
pub fn parse_device_list(text: &str) -> bool {
    text.lines().skip(1).any(|line| {
        let mut parts = line.split_whitespace();
        parts.next().is_some() && parts.next() == Some("device")
    })
}

/// Address part of an `ip addr` CIDR such as `192.168.1.23/24`.
pub fn parse_inet_address(text: &str) -> Option<String> {
    let first = text.lines().next()?.trim();
    let address = first.split('/').next()?.trim();
    if address.is_empty() {
        None
    } else {
        Some(address.to_string())
    }
}
