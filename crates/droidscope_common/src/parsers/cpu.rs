//! Parsers for per-core sysfs dumps.
//!
//! The aggregator reads every core in one shell loop that prints
//! `<path>: <value>` per file, so one primitive ([`parse_path_values`]) serves
//! both the numeric frequency table and the string governor table.

use super::atoms::core_index;
use crate::error::{Result, TelemetryError};
use crate::records::{CoreId, CpuFrequency, CpuIdle, CpuIdleState};
use crate::units::{khz_to_mhz, mean_khz_as_mhz};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Parse `<path containing cpuN>: value` lines into a per-core table.
///
/// Lines without a colon, without a `cpuN` component, or with an empty value
/// are dropped.
pub fn parse_path_values(domain: &str, text: &str) -> Result<BTreeMap<CoreId, String>> {
    let mut values = BTreeMap::new();

    for line in text.lines() {
        let Some((path, value)) = line.split_once(':') else {
            continue;
        };
        let Some(core) = core_index(path) else {
            trace!("  {}: no core index in '{}'", domain, path);
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        values.insert(core, value.to_string());
    }

    if values.is_empty() {
        return Err(TelemetryError::extraction(domain, "no per-core values found"));
    }
    Ok(values)
}

/// Parse current per-core frequencies (kHz) and derive the aggregates.
///
/// Expected format (one line per core):
/// ```text
/// /sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq: 1800000
/// /sys/devices/system/cpu/cpu1/cpufreq/scaling_cur_freq: 2400000
/// ```
pub fn parse_core_frequencies(text: &str) -> Result<CpuFrequency> {
    let mut per_core = BTreeMap::new();

    for (core, raw) in parse_path_values("cpu_frequency", text)? {
        match raw.parse::<u64>() {
            Ok(khz) => {
                per_core.insert(core, khz);
            }
            Err(_) => debug!("  cpu_frequency: dropping {} value '{}'", core, raw),
        }
    }

    summarize_frequencies(per_core)
        .ok_or_else(|| TelemetryError::extraction("cpu_frequency", "no numeric frequencies found"))
}

/// Build the frequency record from a per-core table. `None` when the table is empty.
pub fn summarize_frequencies(per_core: BTreeMap<CoreId, u64>) -> Option<CpuFrequency> {
    let samples: Vec<u64> = per_core.values().copied().collect();
    let min_khz = *samples.iter().min()?;
    let max_khz = *samples.iter().max()?;

    Some(CpuFrequency {
        min_khz,
        max_khz,
        min_mhz: khz_to_mhz(min_khz),
        max_mhz: khz_to_mhz(max_khz),
        avg_mhz: mean_khz_as_mhz(&samples),
        core_count: samples.len(),
        per_core,
    })
}

/// Parse per-core scaling governors.
pub fn parse_governors(text: &str) -> Result<BTreeMap<CoreId, String>> {
    parse_path_values("cpu_governors", text)
}

/// Parse cpuidle rows of the form `cpu0 state0 WFI 123456 789`.
///
/// Rows are grouped by core, keeping the order in which the device listed the
/// states. Rows that are short, name an unknown core, or carry non-integer
/// time/usage columns are dropped.
pub fn parse_cpu_idle(text: &str) -> Result<CpuIdle> {
    let mut per_core: BTreeMap<CoreId, Vec<CpuIdleState>> = BTreeMap::new();

    for (line_idx, line) in text.lines().enumerate() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 {
            if !parts.is_empty() {
                trace!("  cpu_idle: short row {}: '{}'", line_idx + 1, line);
            }
            continue;
        }

        let Ok(core) = parts[0].parse::<CoreId>() else {
            continue;
        };
        let (Ok(time_us), Ok(usage)) = (parts[3].parse::<u64>(), parts[4].parse::<u64>()) else {
            debug!("  cpu_idle: malformed row {}: '{}'", line_idx + 1, line);
            continue;
        };

        per_core.entry(core).or_default().push(CpuIdleState {
            state: parts[1].to_string(),
            name: parts[2].to_string(),
            time_us,
            usage,
        });
    }

    if per_core.is_empty() {
        return Err(TelemetryError::extraction("cpu_idle", "no idle state rows found"));
    }
    Ok(CpuIdle { per_core })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FREQ_OUTPUT: &str = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq: 1800000
/sys/devices/system/cpu/cpu1/cpufreq/scaling_cur_freq: 2400000
";

    #[test]
    fn golden_parse_core_frequencies() {
        let freq = parse_core_frequencies(FREQ_OUTPUT).unwrap();
        assert_eq!(freq.per_core.get(&CoreId(0)), Some(&1_800_000));
        assert_eq!(freq.per_core.get(&CoreId(1)), Some(&2_400_000));
        assert_eq!(freq.min_khz, 1_800_000);
        assert_eq!(freq.max_khz, 2_400_000);
        assert_relative_eq!(freq.min_mhz, 1800.0);
        assert_relative_eq!(freq.max_mhz, 2400.0);
        // 2,100,000 kHz average = 2100 MHz (2.1 GHz)
        assert_relative_eq!(freq.avg_mhz, 2100.0);
        assert_eq!(freq.core_count, 2);
        assert!(freq.min_mhz <= freq.avg_mhz && freq.avg_mhz <= freq.max_mhz);
    }

    #[test]
    fn golden_parse_core_frequencies_skips_bad_lines() {
        let text = "garbage line
/sys/devices/system/cpu/cpu2/cpufreq/scaling_cur_freq:
/sys/devices/system/cpu/cpu3/cpufreq/scaling_cur_freq: offline
/sys/devices/system/cpu/cpu4/cpufreq/scaling_cur_freq: 1000000
/sys/devices/system/cpu/online: 0-7
";
        let freq = parse_core_frequencies(text).unwrap();
        assert_eq!(freq.core_count, 1);
        assert_eq!(freq.per_core.keys().copied().collect::<Vec<_>>(), vec![CoreId(4)]);
    }

    #[test]
    fn golden_parse_core_frequencies_empty() {
        for text in ["", "   \n\t\n", "no cores here: 1"] {
            let err = parse_core_frequencies(text).unwrap_err();
            assert!(matches!(err, TelemetryError::Extraction { .. }), "{:?}", text);
        }
        // cores present but none numeric
        let err = parse_core_frequencies("/cpu0/scaling_cur_freq: n/a").unwrap_err();
        assert!(matches!(err, TelemetryError::Extraction { .. }));
    }

    #[test]
    fn golden_parse_governors() {
        let text = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_governor: schedutil
/sys/devices/system/cpu/cpu10/cpufreq/scaling_governor: performance
";
        let govs = parse_governors(text).unwrap();
        assert_eq!(govs.len(), 2);
        assert_eq!(govs[&CoreId(0)], "schedutil");
        assert_eq!(govs[&CoreId(10)], "performance");
        // numeric ordering, not lexical
        assert_eq!(govs.keys().next(), Some(&CoreId(0)));
    }

    #[test]
    fn golden_parse_cpu_idle() {
        let text = "cpu0 state0 WFI 1200 40
cpu0 state1 cpu-sleep-0 98000 12
cpu1 state0 WFI 800 33
cpu1 state1
cpu1 state2 cluster-sleep notanumber 3
gpu0 state0 WFI 1 1
";
        let idle = parse_cpu_idle(text).unwrap();
        assert_eq!(idle.per_core.len(), 2);

        let cpu0 = &idle.per_core[&CoreId(0)];
        assert_eq!(cpu0.len(), 2);
        assert_eq!(cpu0[0].state, "state0");
        assert_eq!(cpu0[0].name, "WFI");
        assert_eq!(cpu0[1].name, "cpu-sleep-0");
        assert_eq!(cpu0[1].time_us, 98_000);
        assert_eq!(cpu0[1].usage, 12);

        assert_eq!(idle.per_core[&CoreId(1)].len(), 1);
    }

    #[test]
    fn golden_parse_cpu_idle_empty() {
        assert!(parse_cpu_idle("").is_err());
        assert!(parse_cpu_idle("cpu0 state0").is_err());
    }
}
