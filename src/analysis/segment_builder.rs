// src/analysis/segment_builder.rs
//
// Turns the per-frame active/inactive stream into exportable rally
// segments.
//
// observe():  contiguous runs of `true` become raw intervals
//             [first active timestamp, last active timestamp]
// finalize(): pad → clamp to [0, duration] → sort → merge small gaps →
//             drop short segments
//
// Evidence (detections, confidences, physics-valid frames) collected while
// a run is open travels with its interval and is combined on merge.

use crate::types::{Detection, RallySegment};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const DURATION_EPSILON: f64 = 1e-9;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Caps the pre-roll of short raw rallies so false starts do not drag in
/// a long lead-in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShortRallyPreroll {
    /// Raw rallies shorter than this (seconds) get the capped pre-roll
    pub threshold: f64,
    pub max_pre_roll: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub pre_roll: f64,
    pub post_roll: f64,
    /// Segments separated by at most this gap (seconds) are merged
    pub min_gap_to_merge: f64,
    pub min_segment_length: f64,
    pub short_rally: Option<ShortRallyPreroll>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            pre_roll: 1.5,
            post_roll: 1.0,
            min_gap_to_merge: 2.0,
            min_segment_length: 2.0,
            short_rally: None,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// What one active frame contributes to its segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameEvidence {
    pub detection_count: usize,
    pub confidence_sum: f64,
    pub trajectory_valid: bool,
}

impl FrameEvidence {
    pub fn from_detections(detections: &[Detection], trajectory_valid: bool) -> Self {
        Self {
            detection_count: detections.len(),
            confidence_sum: detections.iter().map(|d| d.confidence as f64).sum(),
            trajectory_valid,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Evidence {
    frames: usize,
    physics_valid_frames: usize,
    detections: usize,
    confidence_sum: f64,
}

impl Evidence {
    fn record(&mut self, frame: &FrameEvidence) {
        self.frames += 1;
        self.detections += frame.detection_count;
        self.confidence_sum += frame.confidence_sum;
        if frame.trajectory_valid {
            self.physics_valid_frames += 1;
        }
    }

    fn absorb(&mut self, other: &Evidence) {
        self.frames += other.frames;
        self.physics_valid_frames += other.physics_valid_frames;
        self.detections += other.detections;
        self.confidence_sum += other.confidence_sum;
    }
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    start: f64,
    end: f64,
    /// Already padded by the caller (append_padded)
    padded: bool,
    evidence: Evidence,
}

impl Interval {
    fn into_segment(self) -> RallySegment {
        let ev = self.evidence;
        RallySegment {
            start: self.start,
            end: self.end,
            mean_confidence: (ev.detections > 0)
                .then(|| (ev.confidence_sum / ev.detections as f64) as f32),
            detection_count: ev.detections,
            frame_count: ev.frames,
            physics_valid_ratio: (ev.frames > 0)
                .then(|| ev.physics_valid_frames as f32 / ev.frames as f32),
        }
    }
}

// ============================================================================
// BUILDER
// ============================================================================

pub struct SegmentBuilder {
    config: SegmentConfig,
    open: Option<Interval>,
    closed: Vec<Interval>,
}

impl SegmentBuilder {
    pub fn new(config: SegmentConfig) -> Self {
        Self {
            config,
            open: None,
            closed: Vec::new(),
        }
    }

    /// Feed one frame's decider output.
    pub fn observe(&mut self, is_active: bool, at: f64) {
        self.observe_frame(is_active, at, FrameEvidence::default());
    }

    /// Like `observe`, also recording what the frame saw while active.
    pub fn observe_frame(&mut self, is_active: bool, at: f64, evidence: FrameEvidence) {
        if !is_active {
            self.close_open();
            return;
        }

        let interval = self.open.get_or_insert(Interval {
            start: at,
            end: at,
            padded: false,
            evidence: Evidence::default(),
        });
        interval.end = at;
        interval.evidence.record(&evidence);
    }

    /// Add an interval that still needs pre/post-roll.
    pub fn append_raw(&mut self, start: f64, end: f64) {
        self.closed.push(Interval {
            start,
            end,
            padded: false,
            evidence: Evidence::default(),
        });
    }

    /// Add an interval that is already padded; finalize only clamps,
    /// merges and filters it.
    pub fn append_padded(&mut self, start: f64, end: f64) {
        self.closed.push(Interval {
            start,
            end,
            padded: true,
            evidence: Evidence::default(),
        });
    }

    /// Raw intervals closed so far (an open run is not counted).
    pub fn raw_interval_count(&self) -> usize {
        self.closed.len()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn close_open(&mut self) {
        if let Some(interval) = self.open.take() {
            debug!(
                "Raw rally interval {:.2}s-{:.2}s ({} frames)",
                interval.start, interval.end, interval.evidence.frames
            );
            self.closed.push(interval);
        }
    }

    fn pre_roll_for(&self, raw_duration: f64) -> f64 {
        match self.config.short_rally {
            Some(cap) if raw_duration < cap.threshold => self.config.pre_roll.min(cap.max_pre_roll),
            _ => self.config.pre_roll,
        }
    }

    /// Close any open run at its last active timestamp and produce the
    /// final segments in ascending time order.
    pub fn finalize(mut self, total_duration: f64) -> Vec<RallySegment> {
        self.close_open();
        let raw_count = self.closed.len();
        let duration = total_duration.max(0.0);

        // Pad and clamp
        let mut intervals: Vec<Interval> = Vec::with_capacity(raw_count);
        for raw in &self.closed {
            let (start, end) = if raw.padded {
                (raw.start, raw.end)
            } else {
                let pre = self.pre_roll_for(raw.end - raw.start);
                (raw.start - pre, raw.end + self.config.post_roll)
            };
            let start = start.clamp(0.0, duration);
            let end = end.clamp(0.0, duration);
            if end < start {
                continue;
            }
            intervals.push(Interval {
                start,
                end,
                ..*raw
            });
        }

        intervals.sort_by(|a, b| a.start.total_cmp(&b.start));

        // Merge small gaps
        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            match merged.last_mut() {
                Some(last) if interval.start - last.end <= self.config.min_gap_to_merge => {
                    last.end = last.end.max(interval.end);
                    last.evidence.absorb(&interval.evidence);
                }
                _ => merged.push(interval),
            }
        }

        let min_length = self.config.min_segment_length;
        let segments: Vec<RallySegment> = merged
            .into_iter()
            .filter(|iv| {
                let keep = iv.end - iv.start + DURATION_EPSILON >= min_length;
                if !keep {
                    debug!(
                        "Dropping short segment {:.2}s-{:.2}s (< {:.2}s)",
                        iv.start, iv.end, min_length
                    );
                }
                keep
            })
            .map(Interval::into_segment)
            .collect();

        let total: f64 = segments.iter().map(|s| s.duration()).sum();
        info!(
            "Segments finalized: {} raw → {} segments, {:.1}s total",
            raw_count,
            segments.len(),
            total
        );

        segments
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn unpadded(min_gap_to_merge: f64, min_segment_length: f64) -> SegmentConfig {
        SegmentConfig {
            pre_roll: 0.0,
            post_roll: 0.0,
            min_gap_to_merge,
            min_segment_length,
            short_rally: None,
        }
    }

    fn observe_run(builder: &mut SegmentBuilder, start: f64, end: f64, step: f64) {
        let mut t = start;
        while t <= end + 1e-9 {
            builder.observe(true, t);
            t += step;
        }
        builder.observe(false, end + step);
    }

    #[test]
    fn test_padding_and_clamping() {
        let cfg = SegmentConfig {
            pre_roll: 2.0,
            post_roll: 1.5,
            min_gap_to_merge: 0.0,
            min_segment_length: 0.0,
            short_rally: None,
        };
        let mut builder = SegmentBuilder::new(cfg);
        builder.append_raw(12.0, 15.0);
        let segments = builder.finalize(16.0);
        assert_eq!(segments.len(), 1);
        assert!((segments[0].start - 10.0).abs() < 1e-9);
        assert!((segments[0].end - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_pre_roll_clamped_at_zero() {
        let cfg = SegmentConfig {
            pre_roll: 2.0,
            ..unpadded(0.0, 0.0)
        };
        let mut builder = SegmentBuilder::new(cfg);
        builder.append_raw(0.5, 3.0);
        let segments = builder.finalize(10.0);
        assert_eq!(segments[0].start, 0.0);
    }

    #[test]
    fn test_merge_small_gap() {
        let mut builder = SegmentBuilder::new(unpadded(1.0, 0.0));
        builder.append_raw(5.0, 8.0);
        builder.append_raw(8.8, 11.0);
        let segments = builder.finalize(20.0);
        assert_eq!(segments.len(), 1);
        assert!((segments[0].start - 5.0).abs() < 1e-9);
        assert!((segments[0].end - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_happens_after_padding() {
        let cfg = SegmentConfig {
            pre_roll: 1.0,
            post_roll: 1.0,
            ..unpadded(1.0, 0.0)
        };
        let mut builder = SegmentBuilder::new(cfg.clone());
        builder.append_raw(5.0, 8.0);
        builder.append_raw(8.8, 11.0);
        let segments = builder.finalize(20.0);
        assert_eq!(segments.len(), 1);
        assert!((segments[0].start - 4.0).abs() < 1e-9);
        assert!((segments[0].end - 12.0).abs() < 1e-9);

        // Raw gap of 2.5s shrinks to 0.5s once padded, so it merges too.
        let mut builder = SegmentBuilder::new(cfg);
        builder.append_raw(5.0, 8.0);
        builder.append_raw(10.5, 13.0);
        let segments = builder.finalize(20.0);
        assert_eq!(segments.len(), 1);
        assert!((segments[0].start - 4.0).abs() < 1e-9);
        assert!((segments[0].end - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_gap_not_merged() {
        let mut builder = SegmentBuilder::new(unpadded(1.0, 0.0));
        builder.append_raw(5.0, 8.0);
        builder.append_raw(9.5, 11.0);
        assert_eq!(builder.finalize(20.0).len(), 2);
    }

    #[test]
    fn test_out_of_order_intervals_sorted() {
        let mut builder = SegmentBuilder::new(unpadded(0.5, 0.0));
        builder.append_raw(20.0, 22.0);
        builder.append_raw(2.0, 4.0);
        builder.append_raw(10.0, 12.0);
        let starts: Vec<f64> = builder.finalize(30.0).iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![2.0, 10.0, 20.0]);
    }

    #[test]
    fn test_short_segment_discarded() {
        let mut builder = SegmentBuilder::new(unpadded(0.0, 1.0));
        builder.append_raw(3.0, 3.4);
        builder.append_raw(6.0, 8.0);
        let segments = builder.finalize(10.0);
        assert_eq!(segments.len(), 1);
        assert!((segments[0].start - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_when_never_active() {
        let mut builder = SegmentBuilder::new(SegmentConfig::default());
        for i in 0..100 {
            builder.observe(false, i as f64 * 0.1);
        }
        assert!(builder.finalize(10.0).is_empty());
    }

    #[test]
    fn test_observe_builds_raw_interval() {
        let mut builder = SegmentBuilder::new(unpadded(0.0, 0.0));
        builder.observe(false, 0.9);
        observe_run(&mut builder, 1.0, 2.0, 0.1);
        assert_eq!(builder.raw_interval_count(), 1);
        assert!(!builder.is_open());
        let segments = builder.finalize(5.0);
        assert!((segments[0].start - 1.0).abs() < 1e-9);
        // Ends at the last active timestamp, not the first inactive one.
        assert!((segments[0].end - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_open_run_closed_on_finalize() {
        let mut builder = SegmentBuilder::new(SegmentConfig {
            post_roll: 1.0,
            ..unpadded(0.0, 0.0)
        });
        builder.observe(true, 8.0);
        builder.observe(true, 9.0);
        assert!(builder.is_open());
        let segments = builder.finalize(9.5);
        assert_eq!(segments.len(), 1);
        assert!((segments[0].start - 8.0).abs() < 1e-9);
        assert!((segments[0].end - 9.5).abs() < 1e-9);
    }

    #[test]
    fn test_append_padded_skips_padding() {
        let mut builder = SegmentBuilder::new(SegmentConfig {
            pre_roll: 2.0,
            post_roll: 2.0,
            ..unpadded(0.0, 0.0)
        });
        builder.append_padded(4.0, 6.0);
        let segments = builder.finalize(20.0);
        assert!((segments[0].start - 4.0).abs() < 1e-9);
        assert!((segments[0].end - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_rally_pre_roll_cap() {
        let cfg = SegmentConfig {
            pre_roll: 2.0,
            short_rally: Some(ShortRallyPreroll {
                threshold: 2.5,
                max_pre_roll: 0.5,
            }),
            ..unpadded(0.0, 0.0)
        };
        let mut builder = SegmentBuilder::new(cfg);
        builder.append_raw(10.0, 11.0); // short: capped
        builder.append_raw(20.0, 25.0); // long: full pre-roll
        let segments = builder.finalize(30.0);
        assert!((segments[0].start - 9.5).abs() < 1e-9);
        assert!((segments[1].start - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_evidence_combined_on_merge() {
        let mut builder = SegmentBuilder::new(unpadded(1.0, 0.0));
        let strong = FrameEvidence {
            detection_count: 1,
            confidence_sum: 0.9,
            trajectory_valid: true,
        };
        let weak = FrameEvidence {
            detection_count: 1,
            confidence_sum: 0.5,
            trajectory_valid: false,
        };
        builder.observe_frame(true, 1.0, strong);
        builder.observe_frame(true, 1.1, strong);
        builder.observe_frame(false, 1.2, FrameEvidence::default());
        builder.observe_frame(true, 1.5, weak);
        builder.observe_frame(true, 1.6, weak);

        let segments = builder.finalize(5.0);
        assert_eq!(segments.len(), 1);
        let seg = &segments[0];
        assert_eq!(seg.frame_count, 4);
        assert_eq!(seg.detection_count, 4);
        assert!((seg.mean_confidence.unwrap() - 0.7).abs() < 1e-6);
        assert!((seg.physics_valid_ratio.unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_appended_intervals_carry_no_evidence() {
        let mut builder = SegmentBuilder::new(unpadded(0.0, 0.0));
        builder.append_raw(1.0, 3.0);
        let seg = &builder.finalize(5.0)[0];
        assert_eq!(seg.mean_confidence, None);
        assert_eq!(seg.physics_valid_ratio, None);
        assert_eq!(seg.frame_count, 0);
    }
}
