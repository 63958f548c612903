// src/pipeline/progress.rs
//
// Fire-and-forget progress reporting. Sinks must never block the frame
// loop: channel sinks overwrite or enqueue, closures should return fast.

use tokio::sync::{mpsc, watch};

pub trait ProgressSink {
    /// `fraction` is in [0, 1].
    fn report(&mut self, fraction: f64);
}

/// Discards progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _fraction: f64) {}
}

/// Adapts a closure into a [`ProgressSink`].
pub struct ProgressFn<F>(pub F);

impl<F: FnMut(f64)> ProgressSink for ProgressFn<F> {
    fn report(&mut self, fraction: f64) {
        (self.0)(fraction)
    }
}

/// Latest value wins; a slow reader only ever sees the newest fraction.
impl ProgressSink for watch::Sender<f64> {
    fn report(&mut self, fraction: f64) {
        self.send_replace(fraction);
    }
}

impl ProgressSink for mpsc::UnboundedSender<f64> {
    fn report(&mut self, fraction: f64) {
        // Receiver gone means nobody is listening any more.
        let _ = self.send(fraction);
    }
}

/// Decides when to report: once whenever the frame timestamp enters a new
/// whole second of video. Without a known duration no fraction can be
/// computed and nothing is emitted until the run finishes.
#[derive(Debug)]
pub struct ProgressThrottle {
    duration: Option<f64>,
    last_second: Option<i64>,
}

impl ProgressThrottle {
    pub fn new(duration: Option<f64>) -> Self {
        Self {
            duration: duration.filter(|d| d.is_finite() && *d > 0.0),
            last_second: None,
        }
    }

    pub fn tick(&mut self, timestamp: f64) -> Option<f64> {
        let duration = self.duration?;
        let second = timestamp.floor() as i64;
        if self.last_second == Some(second) {
            return None;
        }
        self.last_second = Some(second);
        Some((timestamp / duration).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_once_per_second() {
        let mut throttle = ProgressThrottle::new(Some(10.0));
        let emitted: Vec<f64> = (0..300)
            .filter_map(|i| throttle.tick(i as f64 / 30.0))
            .collect();
        assert_eq!(emitted.len(), 10);
        assert_eq!(emitted[0], 0.0);
        assert!((emitted[9] - 0.9).abs() < 1e-9);
        assert!(emitted.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_throttle_without_duration_is_silent() {
        let mut throttle = ProgressThrottle::new(None);
        assert!((0..100).all(|i| throttle.tick(i as f64 * 0.1).is_none()));

        let mut zero = ProgressThrottle::new(Some(0.0));
        assert!(zero.tick(1.0).is_none());
    }

    #[test]
    fn test_throttle_clamps_past_duration() {
        let mut throttle = ProgressThrottle::new(Some(2.0));
        assert_eq!(throttle.tick(5.0), Some(1.0));
    }

    #[test]
    fn test_watch_sink_keeps_latest() {
        let (mut tx, rx) = watch::channel(0.0);
        tx.report(0.25);
        tx.report(0.5);
        assert_eq!(*rx.borrow(), 0.5);
    }

    #[test]
    fn test_closure_sink_and_dropped_channel() {
        let mut seen = Vec::new();
        {
            let mut sink = ProgressFn(|f: f64| seen.push(f));
            sink.report(0.1);
            sink.report(1.0);
        }
        assert_eq!(seen, vec![0.1, 1.0]);

        let (mut tx, rx) = mpsc::unbounded_channel::<f64>();
        drop(rx);
        tx.report(0.5);
    }
}
