// src/lib.rs
//
// Single-pass rally segmentation for sports video.
//
// Frames → external detector → ball tracker → ballistics gate →
// hysteresis decider → segment builder → padded, merged rally segments.

pub mod analysis;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod replay;
pub mod types;

pub use config::ProcessorConfig;
pub use error::{ConfigError, DetectorError, RallyError, Result, SourceError};
pub use pipeline::{
    process, CancelToken, Detector, FrameSource, ProcessingReport, ProcessingStats,
    ProgressSink, RallyOutcome, RallyProcessor,
};
pub use types::{BoundingBox, Detection, Frame, Point, RallySegment, RallySummary};
