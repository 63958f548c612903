// src/pipeline/frame_source.rs
//
// Pull-based frame input. A source yields frames lazily, forward only,
// with increasing timestamps; `Ok(None)` is end of stream and is distinct
// from an error. The processor calls `release()` explicitly on every exit
// path (success, error, cancellation), so implementations should free
// decoders / file handles there rather than in Drop.

use crate::error::SourceError;
use crate::types::Frame;
use std::collections::VecDeque;

pub trait FrameSource {
    type Image;

    fn next_frame(&mut self) -> Result<Option<Frame<Self::Image>>, SourceError>;

    /// Declared length of the recording in seconds, if known up front.
    fn duration(&self) -> Option<f64> {
        None
    }

    /// Free underlying resources. Must be safe to call more than once.
    fn release(&mut self);
}

/// Frames already held in memory. Mostly useful for tests and for callers
/// that decode elsewhere.
pub struct VecFrameSource<I> {
    frames: VecDeque<Frame<I>>,
    duration: Option<f64>,
    released: bool,
}

impl<I> VecFrameSource<I> {
    pub fn new(frames: Vec<Frame<I>>) -> Self {
        Self {
            frames: frames.into(),
            duration: None,
            released: false,
        }
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl<I> FrameSource for VecFrameSource<I> {
    type Image = I;

    fn next_frame(&mut self) -> Result<Option<Frame<I>>, SourceError> {
        if self.released {
            return Ok(None);
        }
        Ok(self.frames.pop_front())
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn release(&mut self) {
        self.frames.clear();
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_source_yields_in_order_then_ends() {
        let mut source = VecFrameSource::new(vec![Frame::new((), 0.0), Frame::new((), 0.5)]);
        assert_eq!(source.next_frame().unwrap().unwrap().timestamp, 0.0);
        assert_eq!(source.next_frame().unwrap().unwrap().timestamp, 0.5);
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.duration(), None);
    }

    #[test]
    fn test_release_drops_remaining_frames() {
        let mut source =
            VecFrameSource::new(vec![Frame::new((), 0.0), Frame::new((), 0.5)]).with_duration(1.0);
        source.release();
        source.release();
        assert!(source.is_released());
        assert_eq!(source.remaining(), 0);
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.duration(), Some(1.0));
    }
}
