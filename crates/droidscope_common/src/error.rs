//! Error types for droidscope.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    /// The channel could not be invoked, or reported failure when success was required.
    #[error("Channel error: {0}")]
    Channel(String),

    /// A text blob yielded zero usable data points.
    #[error("Extraction error ({domain}): {reason}")]
    Extraction { domain: String, reason: String },

    /// A mandatory numeric field could not be parsed.
    #[error("Conversion error: field '{field}' has unparseable value '{raw}'")]
    Conversion { field: String, raw: String },
}

impl TelemetryError {
    pub fn extraction(domain: &str, reason: impl Into<String>) -> Self {
        TelemetryError::Extraction {
            domain: domain.to_string(),
            reason: reason.into(),
        }
    }

    pub fn conversion(field: &str, raw: &str) -> Self {
        TelemetryError::Conversion {
            field: field.to_string(),
            raw: raw.to_string(),
        }
    }

    /// Short machine-readable kind, used by the HTTP layer in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryError::Channel(_) => "channel",
            TelemetryError::Extraction { .. } => "extraction",
            TelemetryError::Conversion { .. } => "conversion",
        }
    }

    pub fn is_channel(&self) -> bool {
        matches!(self, TelemetryError::Channel(_))
    }
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::extraction("cpu_frequency", "no per-core values");
        assert_eq!(
            err.to_string(),
            "Extraction error (cpu_frequency): no per-core values"
        );

        let err = TelemetryError::conversion("sdk", "abc");
        assert_eq!(
            err.to_string(),
            "Conversion error: field 'sdk' has unparseable value 'abc'"
        );
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(TelemetryError::Channel("x".into()).kind(), "channel");
        assert!(TelemetryError::Channel("x".into()).is_channel());
        assert!(!TelemetryError::extraction("d", "r").is_channel());
    }
}
