//! Device output parsers.
//!
//! Deterministic parsers for the text replies of Android shell commands,
//! producing typed records.
//!
//! # Supported Outputs
//!
//! - `dumpsys battery`: battery and power state → `BatteryInfo` / `PowerInfo`
//! - `dumpsys thermalservice`: sensor temperatures → `ThermalInfo` / `CoreTemperatures`
//! - `df -k`, `df /data`: disk usage → `Vec<MountInfo>` / `StorageInfo`
//! - `/proc/meminfo`: memory and swap → `MemoryInfo`
//! - cpufreq / cpuidle sysfs loops: per-core tables → `CpuFrequency`, governors, `CpuIdle`
//! - `/proc/uptime`, `wm size`, `wm density`, `adb devices`, `ip addr`
//!
//! # Design Principles
//!
//! - **Tolerant**: a malformed line or field is skipped, never fatal on its own.
//! - **Loud only when empty**: `TelemetryError::Extraction` when the whole input
//!   yields nothing usable.
//! - **Pure**: no I/O, no clock reads; callers pass `now` where time matters.

pub mod atoms;
pub mod battery;
pub mod cpu;
pub mod df;
pub mod meminfo;
pub mod system;
pub mod thermal;

pub use atoms::{
    core_index, field_or, lookup_opt, lookup_or, non_empty, parse_abi_list, parse_field,
    parse_integer_lines, parse_key_value_block, parse_word_list, value_after_colon,
};
pub use battery::{parse_battery, parse_power};
pub use cpu::{
    parse_core_frequencies, parse_cpu_idle, parse_governors, parse_path_values,
    summarize_frequencies,
};
pub use df::{parse_df_row, parse_df_table, parse_storage};
pub use meminfo::parse_meminfo;
pub use system::{format_uptime, parse_device_list, parse_display, parse_inet_address, parse_uptime};
pub use thermal::{
    core_temperatures, parse_braced_groups, parse_temperature_readings, parse_thermal,
    THERMAL_SOURCE,
};
