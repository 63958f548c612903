// src/analysis/mod.rs
//
// Rally detection core.
//
// Signal flow (per frame):
//   Detections → ball_tracker → freshest Track → ballistics_gate ─┐
//   Detections present ────────────────────────────────────────────┼→ rally_decider → segment_builder
//
// Orchestrated by pipeline::orchestrator::RallyProcessor.

pub mod ball_tracker;
pub mod ballistics_gate;
pub mod rally_decider;
pub mod segment_builder;

pub use ball_tracker::{AssociationSummary, BallTracker, Track, TrackSample, TrackerConfig};
pub use ballistics_gate::{
    fit_quadratic, BallisticsConfig, BallisticsGate, FitAxis, QuadraticFit, RejectReason,
    ValidationResult,
};
pub use rally_decider::{DeciderConfig, RallyDecider, RallyState};
pub use segment_builder::{FrameEvidence, SegmentBuilder, SegmentConfig, ShortRallyPreroll};
