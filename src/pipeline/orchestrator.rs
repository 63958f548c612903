// src/pipeline/orchestrator.rs
//
// Single-pass processing loop. Per frame:
//   cancel check → next frame → detector → tracker → freshest track →
//   ballistics gate → decider → segment builder → progress
// At end of stream the builder is finalized into rally segments.
//
// Every run builds fresh components from the (read-only) config, so a
// processor can be reused for any number of sequential runs. The frame
// source is released explicitly on every exit path.

use super::cancel::CancelToken;
use super::detector::Detector;
use super::frame_source::FrameSource;
use super::metrics::{ProcessingStats, RunMetrics};
use super::progress::{NoProgress, ProgressSink, ProgressThrottle};
use crate::analysis::{
    BallTracker, BallisticsGate, FrameEvidence, RallyDecider, SegmentBuilder,
};
use crate::config::ProcessorConfig;
use crate::error::{RallyError, Result, SourceError};
use crate::types::{Detection, RallySegment, RallySummary};
use serde::Serialize;
use tracing::{debug, error, info, warn};

// ============================================================================
// OUTPUT
// ============================================================================

/// Successful end of a run. Finding nothing is a valid outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "segments", rename_all = "snake_case")]
pub enum RallyOutcome {
    Rallies(Vec<RallySegment>),
    NoRallies,
}

impl RallyOutcome {
    fn from_segments(segments: Vec<RallySegment>) -> Self {
        if segments.is_empty() {
            Self::NoRallies
        } else {
            Self::Rallies(segments)
        }
    }

    pub fn segments(&self) -> &[RallySegment] {
        match self {
            Self::Rallies(segments) => segments,
            Self::NoRallies => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::NoRallies)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingReport {
    pub outcome: RallyOutcome,
    pub summary: RallySummary,
    pub stats: ProcessingStats,
}

// ============================================================================
// PROCESSOR
// ============================================================================

pub struct RallyProcessor {
    config: ProcessorConfig,
}

impl RallyProcessor {
    /// Validates the configuration up front; a run never fails on config.
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn run<S, D, P>(
        &self,
        source: &mut S,
        detector: &mut D,
        progress: &mut P,
        cancel: &CancelToken,
    ) -> Result<ProcessingReport>
    where
        S: FrameSource,
        D: Detector<S::Image>,
        P: ProgressSink,
    {
        info!(
            "Rally processing started (duration: {})",
            source
                .duration()
                .map(|d| format!("{:.1}s", d))
                .unwrap_or_else(|| "unknown".into())
        );

        let result = self.drive(source, detector, progress, cancel);
        source.release();

        match &result {
            Ok(report) => info!(
                "Rally processing finished: {} segments from {} frames in {:.1}s ({:.0} fps)",
                report.outcome.segments().len(),
                report.stats.frames_processed,
                report.stats.elapsed_secs,
                report.stats.fps
            ),
            Err(e) if e.is_cancelled() => warn!("Rally processing cancelled: {}", e),
            Err(e) => error!("Rally processing failed: {}", e),
        }

        result
    }

    fn drive<S, D, P>(
        &self,
        source: &mut S,
        detector: &mut D,
        progress: &mut P,
        cancel: &CancelToken,
    ) -> Result<ProcessingReport>
    where
        S: FrameSource,
        D: Detector<S::Image>,
        P: ProgressSink,
    {
        let cfg = &self.config;
        let mut tracker = BallTracker::new(cfg.tracker.clone());
        let gate = BallisticsGate::new(
            cfg.ballistics.clone(),
            cfg.tracker.min_track_age_for_physics,
        );
        let mut decider = RallyDecider::new(cfg.decider.clone());
        let mut builder = SegmentBuilder::new(cfg.segments.clone());
        let mut metrics = RunMetrics::new();
        let mut throttle = ProgressThrottle::new(source.duration());

        loop {
            if cancel.is_cancelled() {
                return Err(RallyError::Cancelled {
                    frames_processed: metrics.frames,
                });
            }

            let Some(frame) = source.next_frame()? else {
                break;
            };
            let timestamp = frame.timestamp;
            check_timestamp(metrics.last_timestamp, timestamp)?;

            let detections: Vec<Detection> = detector
                .detect(&frame.image, timestamp)?
                .into_iter()
                .filter(|d| cfg.tracker.accepts(d))
                .collect();

            let association = tracker.update(&detections, timestamp);
            metrics.duplicates_suppressed += association.suppressed as u64;

            let validation = tracker.freshest_track().map(|track| gate.validate(track));
            let trajectory_valid = validation.as_ref().is_some_and(|v| v.valid);
            let has_detection = !detections.is_empty();

            let active = decider.update(has_detection, trajectory_valid, timestamp);
            builder.observe_frame(
                active,
                timestamp,
                FrameEvidence::from_detections(&detections, trajectory_valid),
            );
            metrics.record_frame(timestamp, &detections, validation.as_ref(), active);

            if let Some(fraction) = throttle.tick(timestamp) {
                debug!("Progress {:.0}% at {:.1}s", fraction * 100.0, timestamp);
                progress.report(fraction);
            }
        }

        let Some(last_timestamp) = metrics.last_timestamp else {
            return Err(RallyError::EmptySource);
        };
        let total_duration = source.duration().unwrap_or(last_timestamp);

        let segments = builder.finalize(total_duration);
        progress.report(1.0);

        let stats = metrics.summary(
            tracker.tracks_created(),
            decider.activations(),
            segments.len(),
            total_duration,
        );
        let summary = RallySummary::from_segments(&segments, total_duration);

        Ok(ProcessingReport {
            outcome: RallyOutcome::from_segments(segments),
            summary,
            stats,
        })
    }
}

fn check_timestamp(previous: Option<f64>, current: f64) -> std::result::Result<(), SourceError> {
    if !current.is_finite() {
        return Err(SourceError::Decode {
            timestamp: current,
            message: "non-finite frame timestamp".into(),
        });
    }
    match previous {
        Some(previous) if current <= previous => {
            Err(SourceError::NonMonotonic { previous, current })
        }
        _ => Ok(()),
    }
}

/// One-shot convenience: run with no progress reporting and no external
/// cancellation.
pub fn process<S, D>(source: &mut S, detector: &mut D, config: ProcessorConfig) -> Result<RallyOutcome>
where
    S: FrameSource,
    D: Detector<S::Image>,
{
    let processor = RallyProcessor::new(config)?;
    let report = processor.run(source, detector, &mut NoProgress, &CancelToken::new())?;
    Ok(report.outcome)
}
