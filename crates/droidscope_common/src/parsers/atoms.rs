//! Atomic parsing functions shared by the extractors.
//!
//! Nothing here fails loudly: a line or field that cannot be used is skipped,
//! and numeric fields that must exist fall back to a documented default.

use crate::error::{Result, TelemetryError};
use crate::records::CoreId;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

static CORE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"cpu(\d+)").expect("core pattern is a valid regex"));

/// Extract the core index from the first `cpu<digits>` substring of a path.
///
/// `/sys/devices/system/cpu/cpu3/cpufreq/scaling_cur_freq` → `cpu3`.
/// The bare `cpu` directory component has no digits and is skipped.
pub fn core_index(path: &str) -> Option<CoreId> {
    let caps = CORE_PATTERN.captures(path)?;
    caps.get(1)?.as_str().parse::<u32>().ok().map(CoreId)
}

/// Parse `key: value` lines into a map.
///
/// The first colon splits key from value; both sides are trimmed. Lines with no
/// colon, or with an empty key or value, are dropped. Later keys overwrite
/// earlier ones.
pub fn parse_key_value_block(domain: &str, text: &str) -> Result<BTreeMap<String, String>> {
    let mut data = BTreeMap::new();

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        data.insert(key.to_string(), value.to_string());
    }

    if data.is_empty() {
        return Err(TelemetryError::extraction(domain, "no key: value pairs found"));
    }
    Ok(data)
}

/// Parse a mandatory numeric field.
pub fn parse_field<T: FromStr>(field: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| TelemetryError::conversion(field, raw))
}

/// Parse a numeric field, falling back to `default` when it is unparseable.
pub fn field_or<T: FromStr>(field: &str, raw: &str, default: T) -> T {
    match parse_field(field, raw) {
        Ok(v) => v,
        Err(e) => {
            debug!("  {}; using default", e);
            default
        }
    }
}

/// Look up `key` in a parsed block and convert it, defaulting when absent or invalid.
pub fn lookup_or<T: FromStr>(data: &BTreeMap<String, String>, key: &str, default: T) -> T {
    match data.get(key) {
        Some(raw) => field_or(key, raw, default),
        None => default,
    }
}

/// Look up `key` and convert it, yielding `None` when absent or invalid.
pub fn lookup_opt<T: FromStr>(data: &BTreeMap<String, String>, key: &str) -> Option<T> {
    let raw = data.get(key)?;
    match parse_field(key, raw) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("  {}; treating as absent", e);
            None
        }
    }
}

/// Text after the first colon of a single-line reply such as `Physical size: 1080x2400`.
pub fn value_after_colon(line: &str) -> Option<&str> {
    let (_, value) = line.split_once(':')?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Whitespace-separated words (e.g. `scaling_available_governors`).
pub fn parse_word_list(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Comma-separated ABI list from `ro.product.cpu.abilist`.
pub fn parse_abi_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One integer per line; lines that are not plain integers are skipped.
pub fn parse_integer_lines(text: &str) -> Vec<u64> {
    text.lines()
        .filter_map(|line| line.trim().parse::<u64>().ok())
        .collect()
}

/// Empty or whitespace-only text becomes `None`.
pub fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn golden_core_index() {
        assert_eq!(
            core_index("/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq"),
            Some(CoreId(0))
        );
        assert_eq!(core_index("/sys/devices/system/cpu/cpu12/online"), Some(CoreId(12)));
        assert_eq!(core_index("cpu3"), Some(CoreId(3)));
        // first match wins
        assert_eq!(core_index("/x/cpu1/y/cpu2"), Some(CoreId(1)));
        assert_eq!(core_index("/sys/devices/system/cpu/online"), None);
        assert_eq!(core_index(""), None);
    }

    #[test]
    fn golden_key_value_block() {
        let text = "Current Battery Service state:\n  AC powered: false\n  level: 85\n  \
                    health: 2\nno colon here\n : orphan\nkey:\n  time: 12:30:00\n";
        let data = parse_key_value_block("battery", text).unwrap();
        assert_eq!(data.get("AC powered").map(String::as_str), Some("false"));
        assert_eq!(data.get("level").map(String::as_str), Some("85"));
        // first colon is the delimiter
        assert_eq!(data.get("time").map(String::as_str), Some("12:30:00"));
        assert!(!data.contains_key("Current Battery Service state"));
        assert!(!data.contains_key("key"));
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn golden_key_value_block_empty_is_error() {
        let err = parse_key_value_block("battery", "  \n\nnothing useful\n").unwrap_err();
        assert!(matches!(err, TelemetryError::Extraction { .. }));
    }

    #[test]
    fn test_field_helpers() {
        assert_eq!(parse_field::<u32>("sdk", " 33 "), Ok(33));
        assert_eq!(
            parse_field::<u32>("sdk", "x"),
            Err(TelemetryError::conversion("sdk", "x"))
        );
        assert_eq!(field_or::<u32>("sdk", "", 0), 0);

        let mut data = BTreeMap::new();
        data.insert("level".to_string(), "77".to_string());
        data.insert("voltage".to_string(), "n/a".to_string());
        assert_eq!(lookup_or::<u8>(&data, "level", 0), 77);
        assert_eq!(lookup_or::<i64>(&data, "voltage", 0), 0);
        assert_eq!(lookup_or::<i64>(&data, "missing", -1), -1);
        assert_eq!(lookup_opt::<i64>(&data, "voltage"), None);
        assert_eq!(lookup_opt::<u8>(&data, "level"), Some(77));
    }

    #[test]
    fn test_list_helpers() {
        assert_eq!(
            parse_word_list("performance powersave  schedutil\n"),
            vec!["performance", "powersave", "schedutil"]
        );
        assert_eq!(
            parse_abi_list("arm64-v8a,armeabi-v7a, ,armeabi"),
            vec!["arm64-v8a", "armeabi-v7a", "armeabi"]
        );
        assert_eq!(parse_integer_lines("300000\n\n576000\nn/a\n"), vec![300_000, 576_000]);
        assert_eq!(value_after_colon("Physical size: 1080x2400"), Some("1080x2400"));
        assert_eq!(value_after_colon("Physical size:"), None);
        assert_eq!(non_empty("  \n"), None);
        assert_eq!(non_empty(" T-Mobile "), Some("T-Mobile".to_string()));
    }
}
