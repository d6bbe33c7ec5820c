//! Unit normalization.
//!
//! Every conversion runs at full precision and rounds exactly once at the end:
//! two decimal places, half away from zero (`f64::round` semantics).

/// Round to 2 decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Kilobytes to megabytes (÷1024).
pub fn kb_to_mb(kb: u64) -> f64 {
    round2(kb as f64 / 1024.0)
}

/// Kilobytes to gigabytes (÷1024²).
pub fn kb_to_gb(kb: u64) -> f64 {
    round2(kb as f64 / (1024.0 * 1024.0))
}

/// Kilohertz to megahertz (÷1000).
pub fn khz_to_mhz(khz: u64) -> f64 {
    round2(khz as f64 / 1000.0)
}

/// Battery tenths-of-a-degree to Celsius (÷10).
pub fn deci_to_celsius(deci: i64) -> f64 {
    round2(deci as f64 / 10.0)
}

/// `used / total` as a percentage in [0, 100].
///
/// A zero total yields 0 rather than NaN.
pub fn percentage(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(used as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Mean of integer samples, rounded after conversion to MHz.
pub fn mean_khz_as_mhz(samples: &[u64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u128 = samples.iter().map(|&s| s as u128).sum();
    round2(sum as f64 / samples.len() as f64 / 1000.0)
}
