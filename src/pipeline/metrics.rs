// src/pipeline/metrics.rs
//
// Per-run counters. Owned by a single processing run, so plain integers;
// rolled up into a serializable ProcessingStats at the end.

use crate::analysis::ValidationResult;
use crate::types::Detection;
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct RunMetrics {
    pub frames: u64,
    pub frames_with_detections: u64,
    pub detections: u64,
    pub confidence_sum: f64,
    pub duplicates_suppressed: u64,
    pub validations_run: u64,
    pub validations_passed: u64,
    pub active_frames: u64,
    pub last_timestamp: Option<f64>,
    pub started_at: Instant,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            frames: 0,
            frames_with_detections: 0,
            detections: 0,
            confidence_sum: 0.0,
            duplicates_suppressed: 0,
            validations_run: 0,
            validations_passed: 0,
            active_frames: 0,
            last_timestamp: None,
            started_at: Instant::now(),
        }
    }

    pub fn record_frame(
        &mut self,
        timestamp: f64,
        detections: &[Detection],
        validation: Option<&ValidationResult>,
        active: bool,
    ) {
        self.frames += 1;
        self.last_timestamp = Some(timestamp);
        if !detections.is_empty() {
            self.frames_with_detections += 1;
        }
        self.detections += detections.len() as u64;
        self.confidence_sum += detections.iter().map(|d| d.confidence as f64).sum::<f64>();
        if let Some(v) = validation {
            self.validations_run += 1;
            if v.valid {
                self.validations_passed += 1;
            }
        }
        if active {
            self.active_frames += 1;
        }
    }

    pub fn fps(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            self.frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(
        &self,
        tracks_created: u32,
        rally_activations: u32,
        segments: usize,
        video_duration: f64,
    ) -> ProcessingStats {
        let physics_valid_percent = if self.validations_run > 0 {
            100.0 * self.validations_passed as f64 / self.validations_run as f64
        } else {
            0.0
        };
        let mean_confidence = if self.detections > 0 {
            Some(self.confidence_sum / self.detections as f64)
        } else {
            None
        };

        ProcessingStats {
            frames_processed: self.frames,
            frames_with_detections: self.frames_with_detections,
            detections: self.detections,
            mean_confidence,
            tracks_created,
            duplicates_suppressed: self.duplicates_suppressed,
            validations_run: self.validations_run,
            validations_passed: self.validations_passed,
            physics_valid_percent,
            active_frames: self.active_frames,
            rally_activations,
            segments,
            video_duration,
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
            fps: self.fps(),
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingStats {
    pub frames_processed: u64,
    pub frames_with_detections: u64,
    pub detections: u64,
    pub mean_confidence: Option<f64>,
    pub tracks_created: u32,
    pub duplicates_suppressed: u64,
    pub validations_run: u64,
    pub validations_passed: u64,
    pub physics_valid_percent: f64,
    pub active_frames: u64,
    pub rally_activations: u32,
    pub segments: usize,
    pub video_duration: f64,
    pub elapsed_secs: f64,
    pub fps: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn det(conf: f32) -> Detection {
        Detection::new(BoundingBox::new(0.5, 0.5, 0.02, 0.02), 0.0, conf, "ball")
    }

    fn validation(valid: bool) -> ValidationResult {
        ValidationResult {
            valid,
            reason: None,
            fit: None,
            velocity_consistency: None,
            axis_dominance: None,
        }
    }

    #[test]
    fn test_summary_rollup() {
        let mut m = RunMetrics::new();
        m.record_frame(0.0, &[], None, false);
        m.record_frame(0.1, &[det(0.8), det(0.4)], Some(&validation(false)), false);
        m.record_frame(0.2, &[det(0.9)], Some(&validation(true)), true);
        m.record_frame(0.3, &[det(0.9)], Some(&validation(true)), true);

        let stats = m.summary(2, 1, 1, 12.0);
        assert_eq!(stats.frames_processed, 4);
        assert_eq!(stats.frames_with_detections, 3);
        assert_eq!(stats.detections, 4);
        assert!((stats.mean_confidence.unwrap() - 0.75).abs() < 1e-6);
        assert_eq!(stats.validations_run, 3);
        assert!((stats.physics_valid_percent - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.active_frames, 2);
        assert_eq!(m.last_timestamp, Some(0.3));
    }

    #[test]
    fn test_empty_run() {
        let stats = RunMetrics::new().summary(0, 0, 0, 0.0);
        assert_eq!(stats.frames_processed, 0);
        assert_eq!(stats.mean_confidence, None);
        assert_eq!(stats.physics_valid_percent, 0.0);
    }
}
