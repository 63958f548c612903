// src/types.rs
//
// Shared value types for the rally pipeline. Geometry is in normalized
// image coordinates (unit square, origin top-left, +y pointing down);
// time is in seconds from the start of the recording.

use serde::{Deserialize, Serialize};

// ============================================================================
// GEOMETRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis-aligned box in normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box of the given size centred on `center`.
    pub fn centered(center: Point, width: f32, height: f32) -> Self {
        Self {
            x: center.x - width * 0.5,
            y: center.y - height * 0.5,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }
}

// ============================================================================
// DETECTIONS & FRAMES
// ============================================================================

/// One object reported by the external detector for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub timestamp: f64,
    pub confidence: f32,
    #[serde(default)]
    pub label: String,
}

impl Detection {
    pub fn new(bbox: BoundingBox, timestamp: f64, confidence: f32, label: impl Into<String>) -> Self {
        Self {
            bbox,
            timestamp,
            confidence,
            label: label.into(),
        }
    }

    pub fn center(&self) -> Point {
        self.bbox.center()
    }
}

/// A decoded frame handed out by a frame source. The image payload is
/// opaque to the core; only the detector looks inside it.
#[derive(Debug, Clone)]
pub struct Frame<I> {
    pub image: I,
    pub timestamp: f64,
}

impl<I> Frame<I> {
    pub fn new(image: I, timestamp: f64) -> Self {
        Self { image, timestamp }
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// A finalized, padded and merged time range of active play.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RallySegment {
    pub start: f64,
    pub end: f64,
    /// Mean confidence of detections observed while the rally was active.
    pub mean_confidence: Option<f32>,
    /// Detections observed while the rally was active.
    pub detection_count: usize,
    /// Active frames folded into this segment.
    pub frame_count: usize,
    /// Fraction of active frames whose tracked trajectory passed the ballistics gate.
    pub physics_valid_ratio: Option<f32>,
}

impl RallySegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Whole-run rollup of the produced segments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RallySummary {
    pub total_rallies: usize,
    pub total_rally_time: f64,
    pub mean_rally_duration: f64,
    pub longest_rally: f64,
    pub coverage_percent: f64,
}

impl RallySummary {
    pub fn from_segments(segments: &[RallySegment], video_duration: f64) -> Self {
        let total_rally_time: f64 = segments.iter().map(|s| s.duration()).sum();
        let longest_rally = segments
            .iter()
            .map(|s| s.duration())
            .fold(0.0_f64, f64::max);
        let mean_rally_duration = if segments.is_empty() {
            0.0
        } else {
            total_rally_time / segments.len() as f64
        };
        let coverage_percent = if video_duration > 0.0 {
            100.0 * total_rally_time / video_duration
        } else {
            0.0
        };

        Self {
            total_rallies: segments.len(),
            total_rally_time,
            mean_rally_duration,
            longest_rally,
            coverage_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: f64, end: f64) -> RallySegment {
        RallySegment {
            start,
            end,
            mean_confidence: None,
            detection_count: 0,
            frame_count: 0,
            physics_valid_ratio: None,
        }
    }

    #[test]
    fn test_bbox_center() {
        let b = BoundingBox::new(0.2, 0.4, 0.1, 0.2);
        let c = b.center();
        assert!((c.x - 0.25).abs() < 1e-6);
        assert!((c.y - 0.5).abs() < 1e-6);

        let round_trip = BoundingBox::centered(c, 0.1, 0.2);
        assert!((round_trip.x - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_summary_coverage() {
        let segments = vec![segment(10.0, 16.0), segment(30.0, 34.0)];
        let summary = RallySummary::from_segments(&segments, 100.0);
        assert_eq!(summary.total_rallies, 2);
        assert!((summary.total_rally_time - 10.0).abs() < 1e-9);
        assert!((summary.mean_rally_duration - 5.0).abs() < 1e-9);
        assert!((summary.longest_rally - 6.0).abs() < 1e-9);
        assert!((summary.coverage_percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_empty() {
        let summary = RallySummary::from_segments(&[], 0.0);
        assert_eq!(summary.total_rallies, 0);
        assert_eq!(summary.coverage_percent, 0.0);
    }

    #[test]
    fn test_detection_deserializes_without_label() {
        let json = r#"{"bbox":{"x":0.1,"y":0.2,"width":0.02,"height":0.02},"timestamp":1.5,"confidence":0.9}"#;
        let det: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(det.label, "");
        assert!((det.timestamp - 1.5).abs() < 1e-12);
    }
}
