//! Error types for the rally detection pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RallyError>;

/// Invalid parameter combinations, caught before a run starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("gravity band is inverted: min {min} > max {max}")]
    InvertedGravityBand { min: f64, max: f64 },

    #[error("fit window ({window}) is smaller than the minimum sample count ({min_samples})")]
    FitWindowTooSmall { window: usize, min_samples: usize },

    #[error("{field} ({required}) exceeds tracker.max_track_samples ({max_track_samples})")]
    WindowTooSmall {
        field: &'static str,
        required: usize,
        max_track_samples: usize,
    },

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Failures reported by a frame source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to open frame source: {0}")]
    Open(String),

    #[error("decode failure at {timestamp:.3}s: {message}")]
    Decode { timestamp: f64, message: String },

    #[error("timestamp went backwards: {current:.3}s after {previous:.3}s")]
    NonMonotonic { previous: f64, current: f64 },

    #[error("malformed frame record on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure inside the external detector.
#[derive(Error, Debug)]
#[error("detector failed at {timestamp:.3}s: {message}")]
pub struct DetectorError {
    pub timestamp: f64,
    pub message: String,
}

impl DetectorError {
    pub fn new<S: Into<String>>(timestamp: f64, message: S) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }
}

/// Everything a processing run can surface to its caller.
#[derive(Error, Debug)]
pub enum RallyError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("frame source error: {0}")]
    Source(#[from] SourceError),

    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error("frame source produced no frames")]
    EmptySource,

    #[error("processing cancelled after {frames_processed} frames")]
    Cancelled { frames_processed: u64 },
}

impl RallyError {
    /// Caller asked to stop; not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Structural failures that retrying with other settings will not fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Source(_) | Self::Detector(_) | Self::EmptySource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_not_fatal() {
        let err = RallyError::Cancelled {
            frames_processed: 12,
        };
        assert!(err.is_cancelled());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_source_error_is_fatal() {
        let err: RallyError = SourceError::Decode {
            timestamp: 3.0,
            message: "corrupt slice".into(),
        }
        .into();
        assert!(err.is_fatal());
        assert!(!err.is_cancelled());
        assert!(err.to_string().contains("3.000s"));
    }

    #[test]
    fn test_config_error_is_neither() {
        let err: RallyError = ConfigError::NonPositive {
            field: "gating_radius",
            value: -1.0,
        }
        .into();
        assert!(!err.is_fatal());
        assert!(!err.is_cancelled());
    }
}
