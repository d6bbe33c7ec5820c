//! Parsers for `dumpsys battery`.
//!
//! Both records read the same key:value block, so the aggregator parses the
//! block once with [`parse_key_value_block`](super::atoms::parse_key_value_block)
//! and hands the map to these functions.

use super::atoms::{lookup_opt, lookup_or};
use crate::records::{BatteryInfo, ChargingStatus, PowerInfo};
use crate::units::deci_to_celsius;
use std::collections::BTreeMap;

const UNKNOWN: &str = "unknown";

fn text_or_unknown(data: &BTreeMap<String, String>, key: &str) -> String {
    data.get(key).cloned().unwrap_or_else(|| UNKNOWN.to_string())
}

fn flag(data: &BTreeMap<String, String>, key: &str) -> bool {
    data.get(key)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Battery state.
///
/// Charging means AC or USB powered; wireless charging is not reported as such.
pub fn parse_battery(data: &BTreeMap<String, String>) -> BatteryInfo {
    let level: u8 = lookup_or(data, "level", 0);

    BatteryInfo {
        level: level.min(100),
        health: text_or_unknown(data, "health"),
        status: text_or_unknown(data, "status"),
        voltage_mv: lookup_or(data, "voltage", 0),
        temperature_c: deci_to_celsius(lookup_or(data, "temperature", 0)),
        technology: text_or_unknown(data, "technology"),
        is_charging: flag(data, "AC powered") || flag(data, "USB powered"),
    }
}

/// Instantaneous power draw and charge counters.
pub fn parse_power(data: &BTreeMap<String, String>) -> PowerInfo {
    let status = data.get("status").map(String::as_str).unwrap_or(UNKNOWN);

    PowerInfo {
        current_ma: lookup_or(data, "current now", 0),
        charge_counter: lookup_opt(data, "Charge counter"),
        max_charging_current: lookup_opt(data, "Max charging current"),
        charging_status: ChargingStatus::from_status(status),
    }
}
