// src/config.rs
//
// Aggregate configuration for one processing run. Each component owns its
// sub-config (next to the component); this file bundles them, loads them
// from YAML, provides presets and validates eagerly before a run starts.

use crate::analysis::{BallisticsConfig, DeciderConfig, SegmentConfig, TrackerConfig};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub tracker: TrackerConfig,
    pub ballistics: BallisticsConfig,
    pub decider: DeciderConfig,
    pub segments: SegmentConfig,
}

impl ProcessorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate. Missing keys fall back to defaults.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ProcessorConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Fewer false positives, may miss short rallies.
    pub fn conservative() -> Self {
        let d = Self::default();
        Self {
            tracker: TrackerConfig {
                min_confidence: 0.5,
                ..d.tracker
            },
            ballistics: BallisticsConfig {
                min_r_squared: 0.92,
                min_velocity_consistency: 0.9,
                ..d.ballistics
            },
            decider: DeciderConfig {
                start_sustain: 0.5,
                end_timeout: 1.0,
            },
            segments: SegmentConfig {
                min_segment_length: 3.0,
                ..d.segments
            },
        }
    }

    /// Catches more rallies at the cost of some false positives.
    pub fn aggressive() -> Self {
        let d = Self::default();
        Self {
            tracker: TrackerConfig {
                min_confidence: 0.2,
                min_track_age_for_physics: 4,
                ..d.tracker
            },
            ballistics: BallisticsConfig {
                min_samples: 4,
                fit_window: 10,
                min_r_squared: 0.75,
                min_velocity_consistency: 0.7,
                ..d.ballistics
            },
            decider: DeciderConfig {
                start_sustain: 0.15,
                end_timeout: 1.5,
            },
            segments: SegmentConfig {
                min_segment_length: 1.0,
                ..d.segments
            },
        }
    }

    /// Look up a preset by name (`default`, `conservative`, `aggressive`).
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default()),
            "conservative" => Some(Self::conservative()),
            "aggressive" => Some(Self::aggressive()),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.tracker;
        positive("tracker.gating_radius", t.gating_radius as f64)?;
        if let Some(r) = t.suppression_radius {
            positive("tracker.suppression_radius", r as f64)?;
        }
        positive("tracker.max_track_samples", t.max_track_samples as f64)?;
        positive("tracker.stale_timeout", t.stale_timeout)?;
        in_range("tracker.min_confidence", t.min_confidence as f64, 0.0, 1.0)?;

        let b = &self.ballistics;
        in_range("ballistics.min_samples", b.min_samples as f64, 3.0, f64::INFINITY)?;
        if b.fit_window < b.min_samples {
            return Err(ConfigError::FitWindowTooSmall {
                window: b.fit_window,
                min_samples: b.min_samples,
            });
        }
        // Track age is capped by the sliding window.
        for (field, required) in [
            ("ballistics.min_samples", b.min_samples),
            ("tracker.min_track_age_for_physics", t.min_track_age_for_physics),
        ] {
            if required > t.max_track_samples {
                return Err(ConfigError::WindowTooSmall {
                    field,
                    required,
                    max_track_samples: t.max_track_samples,
                });
            }
        }
        in_range("ballistics.min_r_squared", b.min_r_squared, 0.0, 1.0)?;
        finite("ballistics.min_gravity", b.min_gravity)?;
        finite("ballistics.max_gravity", b.max_gravity)?;
        if b.min_gravity > b.max_gravity {
            return Err(ConfigError::InvertedGravityBand {
                min: b.min_gravity,
                max: b.max_gravity,
            });
        }
        positive("ballistics.max_speed", b.max_speed)?;
        in_range(
            "ballistics.min_velocity_consistency",
            b.min_velocity_consistency,
            0.0,
            1.0,
        )?;
        in_range("ballistics.min_axis_dominance", b.min_axis_dominance, 0.0, 1.0)?;
        non_negative("ballistics.min_net_displacement", b.min_net_displacement as f64)?;

        non_negative("decider.start_sustain", self.decider.start_sustain)?;
        non_negative("decider.end_timeout", self.decider.end_timeout)?;

        let s = &self.segments;
        non_negative("segments.pre_roll", s.pre_roll)?;
        non_negative("segments.post_roll", s.post_roll)?;
        non_negative("segments.min_gap_to_merge", s.min_gap_to_merge)?;
        non_negative("segments.min_segment_length", s.min_segment_length)?;
        if let Some(short) = &s.short_rally {
            non_negative("segments.short_rally.threshold", short.threshold)?;
            non_negative("segments.short_rally.max_pre_roll", short.max_pre_roll)?;
        }

        Ok(())
    }
}

// NaN fails every check below since all comparisons with it are false.

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min: f64::MIN,
            max: f64::MAX,
        })
    }
}

fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for name in ["default", "conservative", "aggressive"] {
            let config = ProcessorConfig::preset(name).unwrap();
            assert!(config.validate().is_ok(), "preset {name} invalid");
        }
        assert!(ProcessorConfig::preset("turbo").is_none());
    }

    #[test]
    fn test_negative_radius_rejected() {
        let mut config = ProcessorConfig::default();
        config.tracker.gating_radius = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive {
                field: "tracker.gating_radius",
                ..
            })
        ));
    }

    #[test]
    fn test_r_squared_out_of_range_rejected() {
        let mut config = ProcessorConfig::default();
        config.ballistics.min_r_squared = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_nan_rejected() {
        let mut config = ProcessorConfig::default();
        config.decider.end_timeout = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_gravity_band_rejected() {
        let mut config = ProcessorConfig::default();
        config.ballistics.min_gravity = 5.0;
        config.ballistics.max_gravity = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedGravityBand { .. })
        ));
    }

    #[test]
    fn test_fit_window_smaller_than_min_samples_rejected() {
        let mut config = ProcessorConfig::default();
        config.ballistics.min_samples = 10;
        config.ballistics.fit_window = 8;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FitWindowTooSmall {
                window: 8,
                min_samples: 10
            })
        ));
    }

    #[test]
    fn test_track_window_smaller_than_requirements_rejected() {
        let mut config = ProcessorConfig::default();
        config.tracker.max_track_samples = 4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WindowTooSmall {
                field: "ballistics.min_samples",
                required: 6,
                max_track_samples: 4
            })
        ));

        config.ballistics.min_samples = 3;
        config.ballistics.fit_window = 4;
        config.tracker.min_track_age_for_physics = 5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WindowTooSmall {
                field: "tracker.min_track_age_for_physics",
                required: 5,
                ..
            })
        ));

        config.tracker.min_track_age_for_physics = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_override() {
        let yaml = r#"
tracker:
  gating_radius: 0.12
decider:
  start_sustain: 0.2
segments:
  short_rally:
    threshold: 2.5
    max_pre_roll: 0.5
ballistics:
  axis: horizontal
"#;
        let config = ProcessorConfig::from_yaml_str(yaml).unwrap();
        assert!((config.tracker.gating_radius - 0.12).abs() < 1e-6);
        assert!((config.decider.start_sustain - 0.2).abs() < 1e-9);
        assert_eq!(config.decider.end_timeout, DeciderConfig::default().end_timeout);
        assert_eq!(config.tracker.max_track_samples, 300);
        assert!(config.segments.short_rally.is_some());
        assert_eq!(config.ballistics.axis, crate::analysis::FitAxis::Horizontal);
    }

    #[test]
    fn test_yaml_invalid_values_rejected_on_load() {
        let yaml = "segments:\n  pre_roll: -1.0\n";
        assert!(matches!(
            ProcessorConfig::from_yaml_str(yaml),
            Err(ConfigError::Negative { .. })
        ));
        assert!(matches!(
            ProcessorConfig::from_yaml_str("tracker: [1, 2"),
            Err(ConfigError::Parse(_))
        ));
    }
}
