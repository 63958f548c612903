// src/analysis/rally_decider.rs
//
// Debounced active/inactive decision over the per-frame evidence
// "ball present AND trajectory physically plausible".
//
//   Inactive ──(evidence held for >= start_sustain)──▶ Active
//   Active   ──(no evidence for >= end_timeout)──────▶ Inactive
//
// Timers reset on entry to each state. A single flickering frame on
// either side never causes a transition.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Float slack so a sustain of exactly N frames triggers on the Nth frame.
const TIME_EPSILON: f64 = 1e-9;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeciderConfig {
    /// Evidence must hold this long (seconds) before a rally starts
    pub start_sustain: f64,
    /// Evidence must be missing this long (seconds) before a rally ends
    pub end_timeout: f64,
}

impl Default for DeciderConfig {
    fn default() -> Self {
        Self {
            start_sustain: 0.3,
            end_timeout: 1.0,
        }
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RallyState {
    Inactive,
    Active,
}

pub struct RallyDecider {
    config: DeciderConfig,
    state: RallyState,
    /// Inactive: when the current unbroken run of evidence began
    evidence_since: Option<f64>,
    /// Active: last time evidence was seen
    last_evidence: f64,
    activations: u32,
}

impl RallyDecider {
    pub fn new(config: DeciderConfig) -> Self {
        Self {
            config,
            state: RallyState::Inactive,
            evidence_since: None,
            last_evidence: 0.0,
            activations: 0,
        }
    }

    /// Feed one frame. Returns whether a rally is active after this frame.
    pub fn update(&mut self, has_detection: bool, trajectory_valid: bool, timestamp: f64) -> bool {
        let evidence = has_detection && trajectory_valid;

        match self.state {
            RallyState::Inactive => {
                if !evidence {
                    self.evidence_since = None;
                    return false;
                }

                let since = *self.evidence_since.get_or_insert(timestamp);
                if timestamp - since + TIME_EPSILON >= self.config.start_sustain {
                    self.state = RallyState::Active;
                    self.evidence_since = None;
                    self.last_evidence = timestamp;
                    self.activations += 1;
                    info!(
                        "Rally started at {:.2}s (evidence since {:.2}s)",
                        timestamp, since
                    );
                }
            }
            RallyState::Active => {
                if evidence {
                    self.last_evidence = timestamp;
                } else if timestamp - self.last_evidence + TIME_EPSILON >= self.config.end_timeout {
                    self.state = RallyState::Inactive;
                    self.evidence_since = None;
                    info!(
                        "Rally ended at {:.2}s (last evidence {:.2}s)",
                        timestamp, self.last_evidence
                    );
                } else {
                    debug!(
                        "No evidence at {:.2}s, holding rally ({:.2}s since last)",
                        timestamp,
                        timestamp - self.last_evidence
                    );
                }
            }
        }

        self.is_active()
    }

    pub fn state(&self) -> RallyState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == RallyState::Active
    }

    /// Inactive → Active transitions since construction or the last reset.
    pub fn activations(&self) -> u32 {
        self.activations
    }

    pub fn reset(&mut self) {
        self.state = RallyState::Inactive;
        self.evidence_since = None;
        self.last_evidence = 0.0;
        self.activations = 0;
    }
}

// ============================================================================
// TESTS
// ============================================================================
