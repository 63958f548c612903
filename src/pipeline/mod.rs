// src/pipeline/mod.rs

pub mod cancel;
pub mod detector;
pub mod frame_source;
pub mod metrics;
pub mod orchestrator;
pub mod progress;

pub use cancel::CancelToken;
pub use detector::{Detector, FnDetector};
pub use frame_source::{FrameSource, VecFrameSource};
pub use metrics::{ProcessingStats, RunMetrics};
pub use orchestrator::{process, ProcessingReport, RallyOutcome, RallyProcessor};
pub use progress::{NoProgress, ProgressFn, ProgressSink, ProgressThrottle};
