// src/replay.rs
//
// Replays a recorded detection log through the pipeline, so rally
// segmentation can be re-tuned without decoding video or running a model.
//
// Log format: one JSON object per line
//   {"timestamp": 1.033, "detections": [{"bbox": {...}, "confidence": 0.91, "label": "ball"}]}
// Blank lines are skipped; `detections` and `label` may be omitted.

use crate::error::{DetectorError, SourceError};
use crate::pipeline::{Detector, FrameSource};
use crate::types::{BoundingBox, Detection, Frame};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct FrameRecord {
    timestamp: f64,
    #[serde(default)]
    detections: Vec<RecordedDetection>,
}

#[derive(Debug, Deserialize)]
struct RecordedDetection {
    bbox: BoundingBox,
    confidence: f32,
    #[serde(default)]
    label: String,
}

/// Frame source whose "image" is the list of detections recorded for it.
pub struct DetectionLogSource<R> {
    lines: Option<Lines<R>>,
    line_no: usize,
    duration: Option<f64>,
}

impl DetectionLogSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SourceError::Open(format!("{}: {}", path.display(), e)))?;
        debug!("Replaying detections from {}", path.display());
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> DetectionLogSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: Some(reader.lines()),
            line_no: 0,
            duration: None,
        }
    }

    /// Declare the recording length (enables progress reporting).
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn is_released(&self) -> bool {
        self.lines.is_none()
    }
}

impl<R: BufRead> FrameSource for DetectionLogSource<R> {
    type Image = Vec<Detection>;

    fn next_frame(&mut self) -> Result<Option<Frame<Vec<Detection>>>, SourceError> {
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };

        for line in lines.by_ref() {
            let line = line?;
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let record: FrameRecord =
                serde_json::from_str(&line).map_err(|source| SourceError::Malformed {
                    line: self.line_no,
                    source,
                })?;
            let timestamp = record.timestamp;
            let detections = record
                .detections
                .into_iter()
                .map(|d| Detection::new(d.bbox, timestamp, d.confidence, d.label))
                .collect();
            return Ok(Some(Frame::new(detections, timestamp)));
        }

        Ok(None)
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn release(&mut self) {
        self.lines = None;
    }
}

/// Hands back the detections recorded with each frame.
#[derive(Debug, Default)]
pub struct ReplayDetector;

impl Detector<Vec<Detection>> for ReplayDetector {
    fn detect(
        &mut self,
        image: &Vec<Detection>,
        _timestamp: f64,
    ) -> Result<Vec<Detection>, DetectorError> {
        Ok(image.clone())
    }
}
