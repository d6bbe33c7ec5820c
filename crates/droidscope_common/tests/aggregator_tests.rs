//! End-to-end tests for the aggregator against a scripted device.
//!
//! Tests verify:
//! - Batched lookups cost one round-trip and demultiplex correctly
//! - Cached domains respect their TTL class
//! - A system snapshot serializes with explicit nulls for failed domains

use droidscope_common::aggregator::{
    BATTERY_CMD, CPU_IDLE_CMD, CUR_FREQ_CMD, DISPLAY_DENSITY_CMD, DISPLAY_SIZE_CMD, GOVERNOR_CMD,
    MAX_FREQ_CMD, MEMINFO_CMD, MIN_FREQ_CMD, MOUNTS_CMD, STORAGE_CMD, THERMAL_CMD, UPTIME_CMD,
    WIFI_MAC_CMD,
};
use droidscope_common::{
    Channel, CoreId, ManualClock, ResultCache, ScriptedChannel, ShellChannel, TelemetryAggregator,
    TtlPolicy,
};
use std::sync::Arc;
use std::time::Duration;

const MEMINFO: &str = "MemTotal:        3809216 kB
MemFree:          141432 kB
MemAvailable:    1468044 kB
SwapTotal:       2097148 kB
SwapFree:         851968 kB";

const DF_K: &str = "Filesystem            1K-blocks    Used Available Use% Mounted on
/dev/root               5127252 5112968         0 100% /
/dev/block/dm-46      115454824 8004000 107319224   7% /data";

const THERMAL: &str = "Current temperatures from HAL:
	Temperature{mValue=39.5, mType=0, mName=AP, mStatus=0}
	Temperature{mValue=45.2, mType=0, mName=cpu0, mStatus=0}
	Temperature{mValue=47.8, mType=0, mName=cpu1, mStatus=0}";

const BATTERY: &str = "Current Battery Service state:
  AC powered: false
  USB powered: true
  status: 2
  health: 2
  level: 85
  voltage: 4213
  temperature: 312
  technology: Li-ion
  current now: -312";

/// A fully populated phone.
fn phone() -> ScriptedChannel {
    ScriptedChannel::new()
        .devices("List of devices attached\n1A2B3C\tdevice")
        .reply("getprop ro.product.model", "Pixel 7")
        .reply("getprop ro.product.manufacturer", "Google")
        .reply("getprop ro.build.version.release", "14")
        .reply("getprop ro.build.version.sdk", "34")
        .reply("getprop ro.hardware", "panther")
        .reply("getprop ro.board.platform", "gs201")
        .reply("getprop ro.build.version.security_patch", "2024-05-05")
        .reply("getprop ro.build.display.id", "AP1A.240505.004")
        .reply("uname -r", "5.10.198-android13-4")
        .reply("nproc", "8")
        .reply("getprop ro.product.cpu.abi", "arm64-v8a")
        .reply("getprop ro.product.cpu.abilist", "arm64-v8a,armeabi-v7a,armeabi")
        .reply(
            CUR_FREQ_CMD,
            "/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq: 1800000\n\
             /sys/devices/system/cpu/cpu1/cpufreq/scaling_cur_freq: 2400000",
        )
        .reply(MIN_FREQ_CMD, "300000\n300000")
        .reply(MAX_FREQ_CMD, "1800000\n2850000")
        .reply(
            GOVERNOR_CMD,
            "/sys/devices/system/cpu/cpu0/cpufreq/scaling_governor: schedutil\n\
             /sys/devices/system/cpu/cpu1/cpufreq/scaling_governor: schedutil",
        )
        .reply(CPU_IDLE_CMD, "cpu0 state0 WFI 1200 40\ncpu1 state0 WFI 800 33")
        .reply(MEMINFO_CMD, MEMINFO)
        .reply(STORAGE_CMD, "/dev/block/dm-46 115454824 8004000 107319224 7% /data")
        .reply(MOUNTS_CMD, DF_K)
        .reply(BATTERY_CMD, BATTERY)
        .reply(THERMAL_CMD, THERMAL)
        .reply("getprop net.hostname", "pixel-7")
        .reply("getprop dhcp.wlan0.ipaddress", "192.168.1.23")
        .reply(WIFI_MAC_CMD, "02:00:00:00:00:00")
        .reply(DISPLAY_SIZE_CMD, "Physical size: 1080x2400")
        .reply(DISPLAY_DENSITY_CMD, "Physical density: 420")
        .reply(UPTIME_CMD, "95445.87 350123.40")
}

#[test]
fn test_full_snapshot() {
    let agg = TelemetryAggregator::new(phone(), TtlPolicy::default());
    let snapshot = agg.system();

    assert!(snapshot.is_complete(), "errors: {:?}", snapshot.errors);
    assert_eq!(snapshot.device.as_ref().unwrap().model, "Pixel 7");
    assert_eq!(snapshot.os.as_ref().unwrap().security_patch, "2024-05-05");
    assert_eq!(snapshot.cpu.as_ref().unwrap().arch, "ARMv8");

    let freq = snapshot.cpu_frequency.as_ref().unwrap();
    assert_eq!(freq.min_khz, 300_000);
    assert_eq!(freq.max_khz, 2_850_000);
    assert!(freq.min_mhz <= freq.avg_mhz && freq.avg_mhz <= freq.max_mhz);

    assert_eq!(snapshot.mounts.as_ref().unwrap().len(), 2);
    assert_eq!(snapshot.display.as_ref().unwrap().density_dpi, 420);
    assert_eq!(snapshot.uptime.as_ref().unwrap().uptime_formatted, "1d 2h 30m 45s");
    assert_eq!(
        snapshot.core_temperatures.as_ref().unwrap().per_core.keys().copied().collect::<Vec<_>>(),
        vec![CoreId(0), CoreId(1)]
    );
    assert!(snapshot.battery.as_ref().unwrap().is_charging);
    assert_eq!(snapshot.network.as_ref().unwrap().wifi_ip.as_deref(), Some("192.168.1.23"));
    assert!(agg.health().adb_connected);
}

#[test]
fn test_snapshot_serializes_failed_domains_as_null() {
    let agg = TelemetryAggregator::new(ScriptedChannel::offline(), TtlPolicy::default());
    let snapshot = agg.system();
    assert_eq!(snapshot.errors.len(), 16);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert!(json["device"].is_null());
    assert!(json["memory"].is_null());
    assert!(json["errors"]["memory"]
        .as_str()
        .unwrap()
        .starts_with("Channel error"));
    assert!(json["timestamp"].is_string());
}

#[test]
fn test_identity_domains_cost_one_round_trip_each() {
    let agg = TelemetryAggregator::new(phone(), TtlPolicy::default());
    agg.device().unwrap();
    agg.os().unwrap();
    agg.cpu().unwrap();
    assert_eq!(agg.channel().calls(), 3);
}

#[test]
fn test_ttl_classes() {
    let clock = Arc::new(ManualClock::new());
    let agg = TelemetryAggregator::with_cache(
        phone(),
        ResultCache::with_clock(clock.clone()),
        TtlPolicy {
            static_secs: 300,
            volatile_secs: 30,
        },
    );

    agg.mounts().unwrap();
    agg.display().unwrap();
    agg.memory().unwrap();
    let after_first = agg.channel().calls();

    // memory is never cached
    agg.memory().unwrap();
    assert_eq!(agg.channel().calls(), after_first + 1);

    // 31s later mounts are stale, display is not
    clock.advance(Duration::from_secs(31));
    agg.mounts().unwrap();
    agg.display().unwrap();
    assert_eq!(agg.channel().calls(), after_first + 2);
    assert_eq!(agg.cache().len(), 2);
}

#[test]
fn test_local_shell_batch_round_trip() {
    let channel = ShellChannel::local();
    let texts = ["alpha\nbeta", "", "gamma: 1\n\tdelta", "__not_a_marker"];
    let commands: Vec<String> = texts
        .iter()
        .map(|t| format!("printf '%s\\n' '{}'", t))
        .collect();
    let refs: Vec<&str> = commands.iter().map(String::as_str).collect();

    let out = channel.execute_batch(&refs);
    assert_eq!(out, texts);
}
