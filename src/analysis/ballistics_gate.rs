// src/analysis/ballistics_gate.rs
//
// Physics gate for ball trajectories.
//
// Fits the most recent samples of a track to uniformly accelerated motion
//   p(τ) = c0 + c1·τ + c2·τ²      (τ = t − mean(t), seconds)
// by least squares on the chosen axis and accepts the track when:
//   - the fit explains the motion (R² >= min_r_squared)
//   - the fitted acceleration 2·c2 lies inside the gravity band
//
// Image convention: +y points down, so gravity shows up as a POSITIVE
// acceleration on the vertical axis.
//
// Enhanced mode adds three computed checks that reject sliding / rolling
// objects and detector teleports:
//   - velocity consistency: share of sample-to-sample speeds <= max_speed
//   - axis dominance: Σ|Δaxis| / (Σ|Δx| + Σ|Δy|) over the window
//   - net displacement over the window (stationary jitter)
//
// Degenerate inputs (all samples at one position, fewer than three
// distinct timestamps) are invalid, never NaN.

use super::ball_tracker::{Track, TrackSample};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Position variance below this is treated as "no motion at all".
const DEGENERATE_VARIANCE: f64 = 1e-14;

// ============================================================================
// 3×3 SOLVE (inline, no external dependency)
// ============================================================================

/// 3×3 matrix stored row-major.
#[derive(Debug, Clone, Copy)]
struct Mat3([f64; 9]);

impl Mat3 {
    fn determinant(&self) -> f64 {
        let m = &self.0;
        m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
            + m[2] * (m[3] * m[7] - m[4] * m[6])
    }

    /// Invert via cofactors. `scale` is the magnitude the determinant is
    /// compared against; returns None when the matrix is singular relative
    /// to it.
    fn invert(&self, scale: f64) -> Option<Self> {
        let m = &self.0;
        let det = self.determinant();
        if !det.is_finite() || det.abs() <= 1e-12 * scale.abs().max(f64::MIN_POSITIVE) {
            return None;
        }

        let inv_det = 1.0 / det;
        Some(Mat3([
            (m[4] * m[8] - m[5] * m[7]) * inv_det,
            (m[2] * m[7] - m[1] * m[8]) * inv_det,
            (m[1] * m[5] - m[2] * m[4]) * inv_det,
            (m[5] * m[6] - m[3] * m[8]) * inv_det,
            (m[0] * m[8] - m[2] * m[6]) * inv_det,
            (m[2] * m[3] - m[0] * m[5]) * inv_det,
            (m[3] * m[7] - m[4] * m[6]) * inv_det,
            (m[1] * m[6] - m[0] * m[7]) * inv_det,
            (m[0] * m[4] - m[1] * m[3]) * inv_det,
        ]))
    }

    fn mul_vec(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        [
            m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
            m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
            m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
        ]
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitAxis {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BallisticsConfig {
    /// Samples a track needs before it is fitted at all
    pub min_samples: usize,
    /// Most recent samples used for the fit
    pub fit_window: usize,
    /// Minimum coefficient of determination
    pub min_r_squared: f64,
    /// Gravity band on the fitted acceleration (normalized units / s²,
    /// positive = toward the bottom of the frame)
    pub min_gravity: f64,
    pub max_gravity: f64,
    pub axis: FitAxis,
    /// Enables the velocity / dominance / displacement checks
    pub enhanced: bool,
    /// Max plausible speed between consecutive samples (units / s)
    pub max_speed: f64,
    pub min_velocity_consistency: f64,
    pub min_axis_dominance: f64,
    /// Minimum first-to-last displacement across the fit window
    pub min_net_displacement: f32,
}

impl Default for BallisticsConfig {
    fn default() -> Self {
        Self {
            min_samples: 6,
            fit_window: 12, // ~0.4s at 30fps
            min_r_squared: 0.85,
            min_gravity: 0.25,
            max_gravity: 8.0,
            axis: FitAxis::Vertical,
            enhanced: true,
            max_speed: 6.0,
            min_velocity_consistency: 0.8,
            min_axis_dominance: 0.25,
            min_net_displacement: 0.01,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// Least-squares fit of p(τ) = c0 + c1·τ + c2·τ².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticFit {
    pub c0: f64,
    pub c1: f64,
    pub c2: f64,
    /// Clamped to [0, 1]
    pub r_squared: f64,
    pub rms_error: f64,
    pub point_count: usize,
}

impl QuadraticFit {
    pub fn acceleration(&self) -> f64 {
        2.0 * self.c2
    }

    /// Velocity at the mean timestamp of the fitted samples.
    pub fn mid_velocity(&self) -> f64 {
        self.c1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    TooFewSamples,
    TrackTooYoung,
    DegenerateFit,
    PoorFit,
    GravityOutOfBand,
    InconsistentVelocity,
    NotAxisDominant,
    Stationary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub valid: bool,
    pub reason: Option<RejectReason>,
    pub fit: Option<QuadraticFit>,
    /// Enhanced mode only
    pub velocity_consistency: Option<f64>,
    /// Enhanced mode only
    pub axis_dominance: Option<f64>,
}

impl ValidationResult {
    fn rejected(reason: RejectReason) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            fit: None,
            velocity_consistency: None,
            axis_dominance: None,
        }
    }

    /// Goodness of fit, 0.0 when no fit was possible.
    pub fn r_squared(&self) -> f64 {
        self.fit.map(|f| f.r_squared).unwrap_or(0.0)
    }
}

// ============================================================================
// FITTING
// ============================================================================

/// Fit `(t, p)` pairs to a quadratic in time. None when the system is
/// singular or the positions have no variance.
pub fn fit_quadratic(points: &[(f64, f64)]) -> Option<QuadraticFit> {
    let n = points.len();
    if n < 3 {
        return None;
    }

    let t_mean = points.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let p_mean = points.iter().map(|p| p.1).sum::<f64>() / n as f64;

    // Power sums Σ τ^k (k = 0..4) and Σ p·τ^k (k = 0..2)
    let mut s = [0.0f64; 5];
    let mut r = [0.0f64; 3];
    for &(t, p) in points {
        let tau = t - t_mean;
        let mut tk = 1.0;
        for k in 0..5 {
            s[k] += tk;
            if k < 3 {
                r[k] += p * tk;
            }
            tk *= tau;
        }
    }

    let normal = Mat3([s[0], s[1], s[2], s[1], s[2], s[3], s[2], s[3], s[4]]);
    let inverse = normal.invert(s[0] * s[2] * s[4])?;
    let [c0, c1, c2] = inverse.mul_vec(r);

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for &(t, p) in points {
        let tau = t - t_mean;
        let predicted = c0 + c1 * tau + c2 * tau * tau;
        ss_res += (p - predicted).powi(2);
        ss_tot += (p - p_mean).powi(2);
    }

    if ss_tot <= DEGENERATE_VARIANCE || !ss_res.is_finite() {
        return None;
    }

    Some(QuadraticFit {
        c0,
        c1,
        c2,
        r_squared: (1.0 - ss_res / ss_tot).clamp(0.0, 1.0),
        rms_error: (ss_res / n as f64).sqrt(),
        point_count: n,
    })
}

fn velocity_consistency(window: &[&TrackSample], max_speed: f64) -> f64 {
    let mut total = 0usize;
    let mut plausible = 0usize;
    for pair in window.windows(2) {
        let dt = pair[1].timestamp - pair[0].timestamp;
        if dt <= 0.0 {
            continue;
        }
        let speed = pair[0].position.distance(&pair[1].position) as f64 / dt;
        total += 1;
        if speed <= max_speed {
            plausible += 1;
        }
    }
    if total == 0 {
        return 1.0;
    }
    plausible as f64 / total as f64
}

fn axis_dominance(window: &[&TrackSample], axis: FitAxis) -> f64 {
    let mut along = 0.0f64;
    let mut total = 0.0f64;
    for pair in window.windows(2) {
        let dx = (pair[1].position.x - pair[0].position.x).abs() as f64;
        let dy = (pair[1].position.y - pair[0].position.y).abs() as f64;
        along += match axis {
            FitAxis::Vertical => dy,
            FitAxis::Horizontal => dx,
        };
        total += dx + dy;
    }
    if total <= 0.0 {
        return 0.0;
    }
    along / total
}

// ============================================================================
// GATE
// ============================================================================

pub struct BallisticsGate {
    config: BallisticsConfig,
    min_track_age: usize,
}

impl BallisticsGate {
    pub fn new(config: BallisticsConfig, min_track_age: usize) -> Self {
        Self {
            config,
            min_track_age,
        }
    }

    pub fn config(&self) -> &BallisticsConfig {
        &self.config
    }

    pub fn is_valid(&self, track: &Track) -> bool {
        self.validate(track).valid
    }

    pub fn validate(&self, track: &Track) -> ValidationResult {
        let cfg = &self.config;

        if track.age() < cfg.min_samples {
            return ValidationResult::rejected(RejectReason::TooFewSamples);
        }
        if track.age() < self.min_track_age {
            return ValidationResult::rejected(RejectReason::TrackTooYoung);
        }

        let window: Vec<&TrackSample> = track.recent(cfg.fit_window.max(3)).collect();
        let points: Vec<(f64, f64)> = window
            .iter()
            .map(|s| {
                let p = match cfg.axis {
                    FitAxis::Vertical => s.position.y,
                    FitAxis::Horizontal => s.position.x,
                };
                (s.timestamp, p as f64)
            })
            .collect();

        let Some(fit) = fit_quadratic(&points) else {
            return ValidationResult::rejected(RejectReason::DegenerateFit);
        };

        let (velocity_score, dominance_score) = if cfg.enhanced {
            (
                Some(velocity_consistency(&window, cfg.max_speed)),
                Some(axis_dominance(&window, cfg.axis)),
            )
        } else {
            (None, None)
        };

        let acceleration = fit.acceleration();
        let reason = if fit.r_squared < cfg.min_r_squared {
            Some(RejectReason::PoorFit)
        } else if !(cfg.min_gravity..=cfg.max_gravity).contains(&acceleration) {
            Some(RejectReason::GravityOutOfBand)
        } else if !cfg.enhanced {
            None
        } else if velocity_score.unwrap_or(1.0) < cfg.min_velocity_consistency {
            Some(RejectReason::InconsistentVelocity)
        } else if dominance_score.unwrap_or(1.0) < cfg.min_axis_dominance {
            Some(RejectReason::NotAxisDominant)
        } else if window_displacement(&window) < cfg.min_net_displacement {
            Some(RejectReason::Stationary)
        } else {
            None
        };

        if let Some(reason) = reason {
            debug!(
                "T{} rejected: {:?} (R²={:.3}, a={:.3}, v_mid={:.3})",
                track.id,
                reason,
                fit.r_squared,
                acceleration,
                fit.mid_velocity()
            );
        }

        ValidationResult {
            valid: reason.is_none(),
            reason,
            fit: Some(fit),
            velocity_consistency: velocity_score,
            axis_dominance: dominance_score,
        }
    }
}

fn window_displacement(window: &[&TrackSample]) -> f32 {
    match (window.first(), window.last()) {
        (Some(first), Some(last)) => first.position.distance(&last.position),
        _ => 0.0,
    }
}

// ============================================================================
// TESTS
// ============================================================================
