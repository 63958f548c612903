// src/analysis/ball_tracker.rs
//
// Greedy nearest-neighbour tracker that turns per-frame ball detections
// into time-ordered trajectories.
//
// Design:
//   - Constant-velocity prediction from the last two samples of a track
//   - Each detection claims the closest unclaimed track inside the gating
//     radius (greedy, in detection order, first-found wins ties)
//   - Unmatched detections spawn a track unless an established track
//     (age >= min_track_age_for_physics) that another detection already
//     extended this frame sits within the suppression radius; a duplicate
//     next to a real trajectory must not fork it, but a lone detection
//     always extends or creates a track
//   - Tracks are a bounded sliding window of samples and are pruned once
//     unseen for longer than the staleness timeout

use crate::types::{Detection, Point};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;
use tracing::{debug, warn};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Max distance (normalized units) between a track's predicted
    /// position and a detection for the two to be associated
    pub gating_radius: f32,
    /// Radius for duplicate suppression; falls back to the gating radius
    pub suppression_radius: Option<f32>,
    /// Sliding-window cap on samples kept per track
    pub max_track_samples: usize,
    /// Seconds a track survives without a new sample
    pub stale_timeout: f64,
    /// Samples a track needs before it is trusted for physics and before
    /// it suppresses nearby spawns
    pub min_track_age_for_physics: usize,
    /// Detections below this confidence are ignored
    pub min_confidence: f32,
    /// Detector labels to accept; empty accepts every label
    pub labels: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gating_radius: 0.08,
            suppression_radius: None,
            max_track_samples: 300, // 10s at 30fps
            stale_timeout: 0.5,
            min_track_age_for_physics: 5,
            min_confidence: 0.3,
            labels: Vec::new(),
        }
    }
}

impl TrackerConfig {
    /// Whether a raw detection passes the confidence and label filters.
    pub fn accepts(&self, det: &Detection) -> bool {
        det.confidence >= self.min_confidence
            && (self.labels.is_empty() || self.labels.iter().any(|l| *l == det.label))
    }

    pub fn effective_suppression_radius(&self) -> f32 {
        self.suppression_radius.unwrap_or(self.gating_radius)
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSample {
    pub position: Point,
    pub timestamp: f64,
    pub confidence: f32,
}

/// A trajectory believed to belong to one physical object. Never empty;
/// samples are strictly ascending in time.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: u32,
    samples: VecDeque<TrackSample>,
    max_samples: usize,
}

impl Track {
    fn new(id: u32, sample: TrackSample, max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        let mut samples = VecDeque::with_capacity(max_samples.min(64));
        samples.push_back(sample);
        Self {
            id,
            samples,
            max_samples,
        }
    }

    /// Build a track from recorded samples. Samples that do not advance in
    /// time are dropped; returns None if nothing is left.
    pub fn from_samples<I>(id: u32, samples: I, max_samples: usize) -> Option<Self>
    where
        I: IntoIterator<Item = TrackSample>,
    {
        let mut iter = samples.into_iter();
        let mut track = Self::new(id, iter.next()?, max_samples);
        for sample in iter {
            if sample.timestamp > track.last().timestamp {
                track.push(sample);
            }
        }
        Some(track)
    }

    pub fn age(&self) -> usize {
        self.samples.len()
    }

    pub fn first(&self) -> &TrackSample {
        &self.samples[0]
    }

    pub fn last(&self) -> &TrackSample {
        &self.samples[self.samples.len() - 1]
    }

    pub fn samples(&self) -> impl Iterator<Item = &TrackSample> {
        self.samples.iter()
    }

    /// The most recent `n` samples, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &TrackSample> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip)
    }

    /// Straight-line distance from the first to the last retained sample.
    pub fn net_displacement(&self) -> f32 {
        self.first().position.distance(&self.last().position)
    }

    /// Constant-velocity extrapolation to `timestamp`.
    pub fn predict(&self, timestamp: f64) -> Point {
        let last = self.last();
        if self.samples.len() < 2 {
            return last.position;
        }
        let prev = &self.samples[self.samples.len() - 2];
        let dt = last.timestamp - prev.timestamp;
        if dt <= 0.0 {
            return last.position;
        }
        let ahead = (timestamp - last.timestamp) as f32;
        let vx = (last.position.x - prev.position.x) / dt as f32;
        let vy = (last.position.y - prev.position.y) / dt as f32;
        Point::new(last.position.x + vx * ahead, last.position.y + vy * ahead)
    }

    fn push(&mut self, sample: TrackSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }
}

/// What one `update` call did, for metrics and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssociationSummary {
    pub accepted: usize,
    pub matched: usize,
    pub spawned: usize,
    pub suppressed: usize,
    pub pruned: usize,
}

// ============================================================================
// MAIN TRACKER
// ============================================================================

pub struct BallTracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u32,
}

impl BallTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::with_capacity(8),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Process one frame of detections. Must be called in timestamp order.
    pub fn update(&mut self, detections: &[Detection], timestamp: f64) -> AssociationSummary {
        let mut summary = AssociationSummary::default();
        let gate = self.config.gating_radius;
        let mut claimed: Vec<bool> = vec![false; self.tracks.len()];

        for det in detections.iter().filter(|d| self.config.accepts(d)) {
            let center = det.center();
            if !center.x.is_finite() || !center.y.is_finite() {
                warn!("Dropping detection with non-finite center at {:.3}s", timestamp);
                continue;
            }
            summary.accepted += 1;

            let sample = TrackSample {
                position: center,
                timestamp,
                confidence: det.confidence,
            };

            // ── Association: closest unclaimed track inside the gate ──
            let mut best: Option<(usize, f32)> = None;
            for (ti, track) in self.tracks.iter().enumerate() {
                if claimed[ti] || track.last().timestamp >= timestamp {
                    continue;
                }
                let dist = track.predict(timestamp).distance(&center);
                if dist > gate {
                    continue;
                }
                if best.map_or(true, |(_, best_dist)| dist < best_dist) {
                    best = Some((ti, dist));
                }
            }

            if let Some((ti, _)) = best {
                claimed[ti] = true;
                self.tracks[ti].push(sample);
                summary.matched += 1;
                continue;
            }

            // ── Duplicate suppression ──
            if let Some(owner) = self.established_neighbor(&center, &claimed, timestamp) {
                debug!(
                    "Suppressed spawn at ({:.3},{:.3}) next to T{}",
                    center.x, center.y, owner
                );
                summary.suppressed += 1;
                continue;
            }

            let track = Track::new(self.next_id, sample, self.config.max_track_samples);
            debug!(
                "New track T{} at ({:.3},{:.3}) t={:.3}s",
                self.next_id, center.x, center.y, timestamp
            );
            self.next_id += 1;
            self.tracks.push(track);
            claimed.push(true);
            summary.spawned += 1;
        }

        // ── Prune stale tracks ──
        let timeout = self.config.stale_timeout;
        let before = self.tracks.len();
        self.tracks.retain(|t| {
            let unseen = timestamp - t.last().timestamp;
            if unseen > timeout {
                debug!("Track T{} pruned (unseen {:.2}s, age={})", t.id, unseen, t.age());
                return false;
            }
            true
        });
        summary.pruned = before - self.tracks.len();

        summary
    }

    /// An established track already extended this frame whose predicted
    /// position lies within the suppression radius of `center`.
    fn established_neighbor(
        &self,
        center: &Point,
        claimed: &[bool],
        timestamp: f64,
    ) -> Option<u32> {
        let radius = self.config.effective_suppression_radius();
        self.tracks
            .iter()
            .zip(claimed)
            .find(|(t, taken)| {
                **taken
                    && t.age() >= self.config.min_track_age_for_physics
                    && t.predict(timestamp).distance(center) <= radius
            })
            .map(|(t, _)| t.id)
    }

    /// The most recently updated track. Ties go to the longer track, then
    /// to the older id.
    pub fn freshest_track(&self) -> Option<&Track> {
        self.tracks.iter().max_by(|a, b| {
            a.last()
                .timestamp
                .partial_cmp(&b.last().timestamp)
                .unwrap_or(Ordering::Equal)
                .then(a.age().cmp(&b.age()))
                .then(b.id.cmp(&a.id))
        })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get_track(&self, id: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn tracks_created(&self) -> u32 {
        self.next_id - 1
    }

    pub fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 1;
    }
}

// ============================================================================
// TESTS
// ============================================================================
