//! Typed telemetry records.
//!
//! Every record is an immutable value rebuilt on each fetch. Optional fields
//! serialize as `null` when the device genuinely has no value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Core identifiers
// ============================================================================

/// CPU core index. Serialized as `"cpuN"`, ordered numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoreId(pub u32);

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu{}", self.0)
    }
}

impl FromStr for CoreId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("cpu")
            .and_then(|n| n.parse::<u32>().ok())
            .map(CoreId)
            .ok_or_else(|| format!("not a core id: {}", s))
    }
}

impl Serialize for CoreId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CoreId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: String,
    pub manufacturer: String,
    pub android_version: String,
    pub sdk: u32,
    pub hardware: String,
    pub board: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsInfo {
    pub android_version: String,
    pub sdk: u32,
    pub security_patch: String,
    pub build_id: String,
    pub kernel_version: String,
}

// ============================================================================
// CPU
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    pub cores: u32,
    pub abi: String,
    pub abi_list: Vec<String>,
    /// Human-readable architecture label derived from `abi`
    pub arch: String,
}

/// Current per-core frequencies plus aggregates.
/// Invariant: `min_khz <= avg <= max_khz`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuFrequency {
    pub per_core: BTreeMap<CoreId, u64>,
    pub min_khz: u64,
    pub max_khz: u64,
    pub min_mhz: f64,
    pub max_mhz: f64,
    pub avg_mhz: f64,
    pub core_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuGovernors {
    pub per_core: BTreeMap<CoreId, String>,
    pub available_governors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuIdleState {
    /// State directory name (e.g. "state0")
    pub state: String,
    /// Driver-provided state name (e.g. "WFI")
    pub name: String,
    /// Total residency in microseconds
    pub time_us: u64,
    /// Number of entries into the state
    pub usage: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuIdle {
    /// States per core, in the order the device listed them
    pub per_core: BTreeMap<CoreId, Vec<CpuIdleState>>,
}

// ============================================================================
// Memory & storage
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total_mb: f64,
    pub available_mb: f64,
    pub used_mb: f64,
    pub usage_percent: f64,
    pub swap_total_mb: f64,
    pub swap_free_mb: f64,
}

/// Usage of the `/data` partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub filesystem: String,
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub usage_percent: f64,
}

/// One row of `df -k`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountInfo {
    pub filesystem: String,
    pub size_kb: u64,
    pub used_kb: u64,
    pub available_kb: u64,
    /// Percent used (0-100), taken directly from df's Use% column
    pub use_percent: u8,
    /// Mount point, may contain spaces
    pub mountpoint: String,
}

// ============================================================================
// Battery & power
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryInfo {
    pub level: u8,
    pub health: String,
    pub status: String,
    pub voltage_mv: i64,
    pub temperature_c: f64,
    pub technology: String,
    pub is_charging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargingStatus {
    Charging,
    Discharging,
    NotCharging,
    Full,
    Unknown,
}

impl ChargingStatus {
    /// Map a `dumpsys battery` status value, textual or BatteryManager code.
    pub fn from_status(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "charging" | "2" => ChargingStatus::Charging,
            "discharging" | "3" => ChargingStatus::Discharging,
            "not charging" | "4" => ChargingStatus::NotCharging,
            "full" | "5" => ChargingStatus::Full,
            _ => ChargingStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChargingStatus::Charging => "charging",
            ChargingStatus::Discharging => "discharging",
            ChargingStatus::NotCharging => "not_charging",
            ChargingStatus::Full => "full",
            ChargingStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ChargingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerInfo {
    pub current_ma: i64,
    pub charge_counter: Option<i64>,
    pub max_charging_current: Option<i64>,
    pub charging_status: ChargingStatus,
}

// ============================================================================
// Thermal
// ============================================================================

/// One retained `Temperature{...}` group from the thermal service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub name: String,
    pub value: f64,
    pub kind: Option<i32>,
    pub status: Option<i32>,
}

/// Invariant: `min_temp_c <= max_temp_c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalInfo {
    pub temperatures: BTreeMap<String, f64>,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreTemperatures {
    pub per_core: BTreeMap<CoreId, f64>,
    pub source: String,
    pub available: bool,
}

// ============================================================================
// Network, display, uptime
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub hostname: String,
    pub wifi_ip: Option<String>,
    pub wifi_mac: Option<String>,
    pub carrier: Option<String>,
    pub network_type: Option<String>,
    pub data_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    /// Physical size as reported by `wm size` (e.g. "1080x2400")
    pub size_px: String,
    pub density_dpi: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeInfo {
    pub uptime_seconds: u64,
    pub uptime_formatted: String,
    pub boot_time: DateTime<Utc>,
}

// ============================================================================
// Health & composite
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy" when a device is attached, otherwise "degraded"
    pub status: String,
    pub adb_connected: bool,
    pub timestamp: DateTime<Utc>,
}

/// Union of every per-domain record.
///
/// A domain that failed to build is `None` and its error message is listed in
/// `errors` under the domain name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub device: Option<DeviceInfo>,
    pub os: Option<OsInfo>,
    pub cpu: Option<CpuInfo>,
    pub cpu_frequency: Option<CpuFrequency>,
    pub cpu_governors: Option<CpuGovernors>,
    pub cpu_idle: Option<CpuIdle>,
    pub memory: Option<MemoryInfo>,
    pub storage: Option<StorageInfo>,
    pub mounts: Option<Vec<MountInfo>>,
    pub battery: Option<BatteryInfo>,
    pub power: Option<PowerInfo>,
    pub thermal: Option<ThermalInfo>,
    pub core_temperatures: Option<CoreTemperatures>,
    pub network: Option<NetworkInfo>,
    pub display: Option<DisplayInfo>,
    pub uptime: Option<UptimeInfo>,
    pub errors: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl SystemSnapshot {
    /// True when every domain built successfully.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_id_roundtrip() {
        assert_eq!("cpu7".parse::<CoreId>(), Ok(CoreId(7)));
        assert!("cpu".parse::<CoreId>().is_err());
        assert!("gpu0".parse::<CoreId>().is_err());
        assert_eq!(CoreId(12).to_string(), "cpu12");
    }

    #[test]
    fn test_core_id_orders_numerically() {
        let mut map = BTreeMap::new();
        map.insert(CoreId(10), 1u64);
        map.insert(CoreId(2), 2u64);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"cpu2":2,"cpu10":1}"#);

        let back: BTreeMap<CoreId, u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_charging_status_mapping() {
        assert_eq!(ChargingStatus::from_status("Charging"), ChargingStatus::Charging);
        assert_eq!(ChargingStatus::from_status("2"), ChargingStatus::Charging);
        assert_eq!(ChargingStatus::from_status("3"), ChargingStatus::Discharging);
        assert_eq!(
            ChargingStatus::from_status("Not charging"),
            ChargingStatus::NotCharging
        );
        assert_eq!(ChargingStatus::from_status("5"), ChargingStatus::Full);
        assert_eq!(ChargingStatus::from_status("1"), ChargingStatus::Unknown);

        let json = serde_json::to_string(&ChargingStatus::NotCharging).unwrap();
        assert_eq!(json, "\"not_charging\"");
    }

    #[test]
    fn test_network_absent_fields_serialize_as_null() {
        let info = NetworkInfo {
            hostname: "android".to_string(),
            wifi_ip: None,
            wifi_mac: Some("02:00:00:00:00:00".to_string()),
            carrier: None,
            network_type: None,
            data_state: None,
        };
        let value = serde_json::to_value(&info).unwrap();
        assert!(value["wifi_ip"].is_null());
        assert_eq!(value["wifi_mac"], "02:00:00:00:00:00");
    }
}
