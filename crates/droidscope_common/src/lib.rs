//! Core library for droidscope: Android device telemetry over adb.
//!
//! The channel runs shell commands on the device, the parsers turn their text
//! into typed records, and the aggregator ties both together with a TTL cache.

pub mod aggregator;
pub mod cache;
pub mod channel;
pub mod error;
pub mod parsers;
pub mod records;
pub mod units;

pub use aggregator::{TelemetryAggregator, TtlPolicy};
pub use cache::{Clock, ManualClock, ResultCache, SystemClock};
#[cfg(any(test, feature = "test-util"))]
pub use channel::ScriptedChannel;
pub use channel::{Channel, SerializedChannel, ShellChannel, MARKER};
pub use error::{Result, TelemetryError};
pub use records::{
    BatteryInfo, ChargingStatus, CoreId, CoreTemperatures, CpuFrequency, CpuGovernors, CpuIdle,
    CpuIdleState, CpuInfo, DeviceInfo, DisplayInfo, HealthStatus, MemoryInfo, MountInfo,
    NetworkInfo, OsInfo, PowerInfo, StorageInfo, SystemSnapshot, TemperatureReading, ThermalInfo,
    UptimeInfo,
};

/// Default adb binary, resolved through `PATH`.
pub const DEFAULT_ADB_PATH: &str = "adb";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
