//! Telemetry aggregation.
//!
//! Turns device commands into typed records: decides what to run, batches
//! independent property lookups into one round-trip, parses the replies and
//! memoizes slow-changing domains.

use crate::cache::ResultCache;
use crate::channel::{Channel, SerializedChannel};
use crate::error::{Result, TelemetryError};
use crate::parsers::{
    core_temperatures, field_or, non_empty, parse_abi_list, parse_battery, parse_core_frequencies,
    parse_cpu_idle, parse_df_table, parse_device_list, parse_display, parse_governors,
    parse_inet_address, parse_integer_lines, parse_key_value_block, parse_meminfo, parse_power,
    parse_storage, parse_thermal, parse_uptime, parse_word_list,
};
use crate::records::{
    BatteryInfo, CoreTemperatures, CpuFrequency, CpuGovernors, CpuIdle, CpuInfo, DeviceInfo,
    DisplayInfo, HealthStatus, MemoryInfo, MountInfo, NetworkInfo, OsInfo, PowerInfo,
    StorageInfo, SystemSnapshot, ThermalInfo, UptimeInfo,
};
use crate::units::khz_to_mhz;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// Commands
// ============================================================================

const DEVICE_PROPS: [&str; 6] = [
    "getprop ro.product.model",
    "getprop ro.product.manufacturer",
    "getprop ro.build.version.release",
    "getprop ro.build.version.sdk",
    "getprop ro.hardware",
    "getprop ro.board.platform",
];

const OS_PROPS: [&str; 5] = [
    "getprop ro.build.version.release",
    "getprop ro.build.version.sdk",
    "getprop ro.build.version.security_patch",
    "getprop ro.build.display.id",
    "uname -r",
];

const CPU_PROPS: [&str; 3] = [
    "nproc",
    "getprop ro.product.cpu.abi",
    "getprop ro.product.cpu.abilist",
];

const NETWORK_PROPS: [&str; 5] = [
    "getprop net.hostname",
    "getprop dhcp.wlan0.ipaddress",
    "getprop gsm.operator.alpha",
    "getprop gsm.network.type",
    "getprop gsm.data.state",
];

pub const CUR_FREQ_CMD: &str =
    "for f in /sys/devices/system/cpu/cpu*/cpufreq/scaling_cur_freq; do echo $f: $(cat $f); done";
pub const MIN_FREQ_CMD: &str =
    "for f in /sys/devices/system/cpu/cpu*/cpufreq/cpuinfo_min_freq; do cat $f; done";
pub const MAX_FREQ_CMD: &str =
    "for f in /sys/devices/system/cpu/cpu*/cpufreq/cpuinfo_max_freq; do cat $f; done";
pub const GOVERNOR_CMD: &str =
    "for f in /sys/devices/system/cpu/cpu*/cpufreq/scaling_governor; do echo $f: $(cat $f); done";
pub const AVAILABLE_GOVERNORS_CMD: &str =
    "cat /sys/devices/system/cpu/cpu0/cpufreq/scaling_available_governors";
pub const CPU_IDLE_CMD: &str = "for cpu in /sys/devices/system/cpu/cpu[0-9]*; do c=$(basename $cpu); \
     for s in $cpu/cpuidle/state*; do st=$(basename $s); name=$(cat $s/name 2>/dev/null); \
     time=$(cat $s/time 2>/dev/null); usage=$(cat $s/usage 2>/dev/null); \
     echo $c $st $name $time $usage; done; done";
pub const MEMINFO_CMD: &str = "cat /proc/meminfo";
pub const STORAGE_CMD: &str = "df /data | tail -1";
pub const MOUNTS_CMD: &str = "df -k";
pub const BATTERY_CMD: &str = "dumpsys battery";
pub const THERMAL_CMD: &str = "dumpsys thermalservice";
pub const UPTIME_CMD: &str = "cat /proc/uptime";
pub const DISPLAY_SIZE_CMD: &str = "wm size | head -n 1";
pub const DISPLAY_DENSITY_CMD: &str = "wm density | head -n 1";
pub const WIFI_IP_CMD: &str = "ip -f inet addr show wlan0 | grep inet | awk '{print $2}' | head -n 1";
pub const WIFI_MAC_CMD: &str = "cat /sys/class/net/wlan0/address";

/// Hostname reported when `net.hostname` is unset.
pub const DEFAULT_HOSTNAME: &str = "android";

const UNKNOWN: &str = "unknown";

// ============================================================================
// TTL policy
// ============================================================================

/// How long cached domains stay fresh.
///
/// Identity-like domains (device, os, cpu, cpu_governors, display) use
/// `static_secs`; mounts and network use `volatile_secs`. Every other domain is
/// read live on each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlPolicy {
    pub static_secs: u64,
    pub volatile_secs: u64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            static_secs: 300,
            volatile_secs: 30,
        }
    }
}

impl TtlPolicy {
    pub fn static_ttl(&self) -> Duration {
        Duration::from_secs(self.static_secs)
    }

    pub fn volatile_ttl(&self) -> Duration {
        Duration::from_secs(self.volatile_secs)
    }
}

/// Architecture label for a primary ABI.
pub fn arch_label(abi: &str) -> &'static str {
    match abi {
        "arm64-v8a" => "ARMv8",
        "armeabi-v7a" => "ARMv7",
        "x86_64" => "x86-64",
        "x86" => "x86",
        _ => "Unknown",
    }
}

fn or_unknown(value: &str) -> String {
    non_empty(value).unwrap_or_else(|| UNKNOWN.to_string())
}

// ============================================================================
// Aggregator
// ============================================================================

/// Builds telemetry records from a device channel.
pub struct TelemetryAggregator<C: Channel> {
    channel: SerializedChannel<C>,
    cache: ResultCache,
    ttl: TtlPolicy,
}

impl<C: Channel> TelemetryAggregator<C> {
    pub fn new(channel: C, ttl: TtlPolicy) -> Self {
        Self::with_cache(channel, ResultCache::new(), ttl)
    }

    pub fn with_cache(channel: C, cache: ResultCache, ttl: TtlPolicy) -> Self {
        Self {
            channel: SerializedChannel::new(channel),
            cache,
            ttl,
        }
    }

    pub fn channel(&self) -> &C {
        self.channel.inner()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn ttl(&self) -> TtlPolicy {
        self.ttl
    }

    fn cached<T, F>(&self, key: &str, ttl: Duration, build: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        self.cache.get_or_compute(key, ttl, build)
    }

    /// Run independent lookups in one round-trip.
    ///
    /// Fails when every reply is empty, which is what an unreachable device
    /// looks like through the batch protocol.
    fn batch(&self, domain: &str, commands: &[&str]) -> Result<Vec<String>> {
        let replies = self.channel.execute_batch(commands);
        if replies.iter().all(|r| r.trim().is_empty()) {
            return Err(TelemetryError::extraction(domain, "every property lookup came back empty"));
        }
        Ok(replies)
    }

    fn read(&self, command: &str) -> Result<String> {
        self.channel.execute(command, true)
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn device(&self) -> Result<DeviceInfo> {
        self.cached("device", self.ttl.static_ttl(), || {
            let v = self.batch("device", &DEVICE_PROPS)?;
            Ok(DeviceInfo {
                model: or_unknown(&v[0]),
                manufacturer: or_unknown(&v[1]),
                android_version: or_unknown(&v[2]),
                sdk: field_or("sdk", &v[3], 0),
                hardware: or_unknown(&v[4]),
                board: or_unknown(&v[5]),
            })
        })
    }

    pub fn os(&self) -> Result<OsInfo> {
        self.cached("os", self.ttl.static_ttl(), || {
            let v = self.batch("os", &OS_PROPS)?;
            Ok(OsInfo {
                android_version: or_unknown(&v[0]),
                sdk: field_or("sdk", &v[1], 0),
                security_patch: or_unknown(&v[2]),
                build_id: or_unknown(&v[3]),
                kernel_version: or_unknown(&v[4]),
            })
        })
    }

    // ========================================================================
    // CPU
    // ========================================================================

    pub fn cpu(&self) -> Result<CpuInfo> {
        self.cached("cpu", self.ttl.static_ttl(), || {
            let v = self.batch("cpu", &CPU_PROPS)?;
            let abi = v[1].trim().to_string();
            Ok(CpuInfo {
                cores: field_or("cores", &v[0], 0),
                arch: arch_label(&abi).to_string(),
                abi_list: parse_abi_list(&v[2]),
                abi,
            })
        })
    }

    /// Current per-core frequencies, with min/max widened to the hardware
    /// limits when the device exposes them.
    pub fn cpu_frequency(&self) -> Result<CpuFrequency> {
        let raw = self.read(CUR_FREQ_CMD)?;
        let mut freq = parse_core_frequencies(&raw)?;

        match self.hardware_limit(MIN_FREQ_CMD, |limits| limits.min()) {
            Some(hw_min) => freq.min_khz = hw_min.min(freq.min_khz),
            None => debug!("  cpu_frequency: keeping observed minimum"),
        }
        match self.hardware_limit(MAX_FREQ_CMD, |limits| limits.max()) {
            Some(hw_max) => freq.max_khz = hw_max.max(freq.max_khz),
            None => debug!("  cpu_frequency: keeping observed maximum"),
        }
        freq.min_mhz = khz_to_mhz(freq.min_khz);
        freq.max_mhz = khz_to_mhz(freq.max_khz);

        Ok(freq)
    }

    fn hardware_limit<F>(&self, command: &str, pick: F) -> Option<u64>
    where
        F: FnOnce(std::vec::IntoIter<u64>) -> Option<u64>,
    {
        match self.read(command) {
            Ok(raw) => pick(parse_integer_lines(&raw).into_iter()),
            Err(e) => {
                debug!("  cpu_frequency: hardware limits unavailable: {}", e);
                None
            }
        }
    }

    pub fn cpu_governors(&self) -> Result<CpuGovernors> {
        self.cached("cpu_governors", self.ttl.static_ttl(), || {
            let per_core = parse_governors(&self.read(GOVERNOR_CMD)?)?;
            let available_governors = match self.read(AVAILABLE_GOVERNORS_CMD) {
                Ok(raw) => parse_word_list(&raw),
                Err(e) => {
                    debug!("  cpu_governors: available list unavailable: {}", e);
                    Vec::new()
                }
            };
            Ok(CpuGovernors {
                per_core,
                available_governors,
            })
        })
    }

    pub fn cpu_idle(&self) -> Result<CpuIdle> {
        parse_cpu_idle(&self.read(CPU_IDLE_CMD)?)
    }

    // ========================================================================
    // Memory & storage
    // ========================================================================

    pub fn memory(&self) -> Result<MemoryInfo> {
        parse_meminfo(&self.read(MEMINFO_CMD)?)
    }

    pub fn storage(&self) -> Result<StorageInfo> {
        parse_storage(&self.read(STORAGE_CMD)?)
    }

    /// Every mount from `df -k`. Unreadable mounts make df exit non-zero, so
    /// the status is ignored and whatever rows were printed are used.
    pub fn mounts(&self) -> Result<Vec<MountInfo>> {
        self.cached("mounts", self.ttl.volatile_ttl(), || {
            parse_df_table(&self.channel.execute(MOUNTS_CMD, false)?)
        })
    }

    // ========================================================================
    // Battery, power, thermal
    // ========================================================================

    fn battery_block(&self, domain: &str) -> Result<BTreeMap<String, String>> {
        parse_key_value_block(domain, &self.read(BATTERY_CMD)?)
    }

    pub fn battery(&self) -> Result<BatteryInfo> {
        Ok(parse_battery(&self.battery_block("battery")?))
    }

    pub fn power(&self) -> Result<PowerInfo> {
        Ok(parse_power(&self.battery_block("power")?))
    }

    pub fn thermal(&self) -> Result<ThermalInfo> {
        parse_thermal(&self.read(THERMAL_CMD)?)
    }

    pub fn core_temperatures(&self) -> Result<CoreTemperatures> {
        Ok(core_temperatures(&self.read(THERMAL_CMD)?))
    }

    // ========================================================================
    // Network, display, uptime
    // ========================================================================

    pub fn network(&self) -> Result<NetworkInfo> {
        self.cached("network", self.ttl.volatile_ttl(), || {
            let v = self.batch("network", &NETWORK_PROPS)?;

            let wifi_ip = non_empty(&v[1]).or_else(|| {
                debug!("  network: dhcp.wlan0.ipaddress empty, asking ip(8)");
                self.channel
                    .execute(WIFI_IP_CMD, false)
                    .ok()
                    .and_then(|out| parse_inet_address(&out))
            });
            let wifi_mac = self
                .channel
                .execute(WIFI_MAC_CMD, true)
                .ok()
                .and_then(|out| non_empty(&out));

            Ok(NetworkInfo {
                hostname: non_empty(&v[0]).unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
                wifi_ip,
                wifi_mac,
                carrier: non_empty(&v[2]),
                network_type: non_empty(&v[3]),
                data_state: non_empty(&v[4]),
            })
        })
    }

    pub fn display(&self) -> Result<DisplayInfo> {
        self.cached("display", self.ttl.static_ttl(), || {
            let size = self.read(DISPLAY_SIZE_CMD)?;
            let density = self.read(DISPLAY_DENSITY_CMD)?;
            Ok(parse_display(&size, &density))
        })
    }

    pub fn uptime(&self) -> Result<UptimeInfo> {
        parse_uptime(&self.read(UPTIME_CMD)?, Utc::now())
    }

    // ========================================================================
    // Health & composite
    // ========================================================================

    /// Whether at least one device is attached and authorized.
    pub fn health(&self) -> HealthStatus {
        let connected = self
            .channel
            .list_connected()
            .map(|listing| parse_device_list(&listing))
            .unwrap_or(false);

        HealthStatus {
            status: if connected { "healthy" } else { "degraded" }.to_string(),
            adb_connected: connected,
            timestamp: Utc::now(),
        }
    }

    /// Every domain, each built independently.
    ///
    /// A failing domain is left `None` and reported in `errors`; the rest are
    /// still returned.
    pub fn system(&self) -> SystemSnapshot {
        let mut errors = BTreeMap::new();

        let device = capture("device", self.device(), &mut errors);
        let os = capture("os", self.os(), &mut errors);
        let cpu = capture("cpu", self.cpu(), &mut errors);
        let cpu_frequency = capture("cpu_frequency", self.cpu_frequency(), &mut errors);
        let cpu_governors = capture("cpu_governors", self.cpu_governors(), &mut errors);
        let cpu_idle = capture("cpu_idle", self.cpu_idle(), &mut errors);
        let memory = capture("memory", self.memory(), &mut errors);
        let storage = capture("storage", self.storage(), &mut errors);
        let mounts = capture("mounts", self.mounts(), &mut errors);
        let battery = capture("battery", self.battery(), &mut errors);
        let power = capture("power", self.power(), &mut errors);
        let thermal = capture("thermal", self.thermal(), &mut errors);
        let core_temperatures = capture("core_temperatures", self.core_temperatures(), &mut errors);
        let network = capture("network", self.network(), &mut errors);
        let display = capture("display", self.display(), &mut errors);
        let uptime = capture("uptime", self.uptime(), &mut errors);

        if errors.is_empty() {
            info!("System snapshot complete");
        } else {
            info!("System snapshot with {} failed domains", errors.len());
        }

        SystemSnapshot {
            device,
            os,
            cpu,
            cpu_frequency,
            cpu_governors,
            cpu_idle,
            memory,
            storage,
            mounts,
            battery,
            power,
            thermal,
            core_temperatures,
            network,
            display,
            uptime,
            errors,
            timestamp: Utc::now(),
        }
    }
}

fn capture<T>(domain: &str, result: Result<T>, errors: &mut BTreeMap<String, String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("  {} unavailable: {}", domain, e);
            errors.insert(domain.to_string(), e.to_string());
            None
        }
    }
}
