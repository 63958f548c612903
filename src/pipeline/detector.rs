// src/pipeline/detector.rs
//
// Boundary to the external object detector. A detector maps one image
// (plus its timestamp) to ball detections in normalized coordinates and
// carries no tracking state between calls.

use crate::error::DetectorError;
use crate::types::Detection;

pub trait Detector<I> {
    fn detect(&mut self, image: &I, timestamp: f64) -> Result<Vec<Detection>, DetectorError>;
}

/// Adapts a closure into a [`Detector`].
pub struct FnDetector<F>(pub F);

impl<I, F> Detector<I> for FnDetector<F>
where
    F: FnMut(&I, f64) -> Result<Vec<Detection>, DetectorError>,
{
    fn detect(&mut self, image: &I, timestamp: f64) -> Result<Vec<Detection>, DetectorError> {
        (self.0)(image, timestamp)
    }
}

impl<I, D: Detector<I> + ?Sized> Detector<I> for Box<D> {
    fn detect(&mut self, image: &I, timestamp: f64) -> Result<Vec<Detection>, DetectorError> {
        (**self).detect(image, timestamp)
    }
}
