//! Parser for `dumpsys thermalservice`.
//!
//! The service prints Java-style records:
//! ```text
//! Current temperatures from HAL:
//!     Temperature{mValue=39.5, mType=0, mName=AP, mStatus=0}
//!     Temperature{mValue=45.2, mType=0, mName=cpu0, mStatus=0}
//! ```
//! Groups without a name or with a non-numeric value are dropped silently.

use crate::error::{Result, TelemetryError};
use crate::records::{CoreId, CoreTemperatures, TemperatureReading, ThermalInfo};
use crate::units::round2;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::trace;

static GROUP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+)\{([^{}]*)\}").expect("group pattern is a valid regex"));

/// Where core temperatures come from.
pub const THERMAL_SOURCE: &str = "thermalservice";

/// Extract the `key=value` pairs of every `<tag>{...}` group, in input order.
pub fn parse_braced_groups(text: &str, tag: &str) -> Vec<BTreeMap<String, String>> {
    GROUP_PATTERN
        .captures_iter(text)
        .filter(|caps| &caps[1] == tag)
        .map(|caps| parse_group_body(&caps[2]))
        .collect()
}

fn parse_group_body(body: &str) -> BTreeMap<String, String> {
    body.split(',')
        .filter_map(|item| item.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

/// Retained `Temperature` groups, in input order.
pub fn parse_temperature_readings(text: &str) -> Vec<TemperatureReading> {
    parse_braced_groups(text, "Temperature")
        .into_iter()
        .filter_map(|group| {
            let name = group.get("mName").filter(|n| !n.is_empty())?;
            let value = group
                .get("mValue")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite());
            let Some(value) = value else {
                trace!("  thermal: dropping group '{}' without numeric mValue", name);
                return None;
            };
            Some(TemperatureReading {
                name: name.clone(),
                value,
                kind: group.get("mType").and_then(|v| v.parse().ok()),
                status: group.get("mStatus").and_then(|v| v.parse().ok()),
            })
        })
        .collect()
}

/// Temperatures by sensor name plus min/max, all rounded to 2 decimals.
///
/// The service lists both HAL and cached readings; a later reading for the same
/// name replaces the earlier one.
pub fn parse_thermal(text: &str) -> Result<ThermalInfo> {
    let temperatures: BTreeMap<String, f64> = parse_temperature_readings(text)
        .into_iter()
        .map(|r| (r.name, round2(r.value)))
        .collect();

    if temperatures.is_empty() {
        return Err(TelemetryError::extraction("thermal", "no temperature records found"));
    }

    let max = temperatures.values().copied().fold(f64::MIN, f64::max);
    let min = temperatures.values().copied().fold(f64::MAX, f64::min);

    Ok(ThermalInfo {
        temperatures,
        max_temp_c: max,
        min_temp_c: min,
    })
}

/// Sensors named exactly `cpuN` (any case), keyed by core.
///
/// Devices that do not expose per-core sensors yield `available == false`
/// rather than an error.
pub fn core_temperatures(text: &str) -> CoreTemperatures {
    let per_core: BTreeMap<CoreId, f64> = parse_temperature_readings(text)
        .into_iter()
        .filter_map(|r| {
            let core = r.name.to_lowercase().parse::<CoreId>().ok()?;
            Some((core, round2(r.value)))
        })
        .collect();

    CoreTemperatures {
        available: !per_core.is_empty(),
        per_core,
        source: THERMAL_SOURCE.to_string(),
    }
}
