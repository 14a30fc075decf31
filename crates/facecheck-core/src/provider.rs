//! The landmark provider seam.

use crate::types::LandmarkSet;
use facecheck_media::Frame;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("model file not found: {0} — export MediaPipe Face Mesh to ONNX and point FACECHECK_MODEL_PATH at it")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Maps an RGB8 frame to the landmarks of its most prominent face.
///
/// `Ok(None)` means no face was found, which is a normal outcome. Errors
/// are reserved for a broken provider. Every call on one provider must
/// return the same number of points.
pub trait LandmarkProvider {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, ProviderError>;
}

impl<P: LandmarkProvider + ?Sized> LandmarkProvider for Box<P> {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, ProviderError> {
        (**self).detect(frame)
    }
}
