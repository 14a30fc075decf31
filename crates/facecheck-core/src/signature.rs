//! Frame → face signature.

use crate::landmarks::{face_ratios, normalize, AnchorIndices, GeometryError};
use crate::provider::{LandmarkProvider, ProviderError};
use crate::types::{FaceSignature, LandmarkSet};
use facecheck_media::Frame;

/// Why a frame produced no signature. Neither reason is an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoFaceDetected,
    DegenerateGeometry(GeometryError),
}

/// Outcome of building a signature for one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureOutcome {
    Face(FaceSignature),
    Skipped(SkipReason),
}

impl SignatureOutcome {
    pub fn into_signature(self) -> Option<FaceSignature> {
        match self {
            Self::Face(sig) => Some(sig),
            Self::Skipped(_) => None,
        }
    }
}

/// Derive a signature from raw landmarks. Ratios use the raw points,
/// the landmark term uses the normalized ones.
pub fn signature_from_landmarks(
    landmarks: LandmarkSet,
    anchors: &AnchorIndices,
) -> Result<FaceSignature, GeometryError> {
    let ratios = face_ratios(&landmarks, anchors)?;
    let landmarks = normalize(&landmarks)?;
    Ok(FaceSignature { landmarks, ratios })
}

/// Owns a landmark provider and turns frames into signatures.
pub struct SignatureBuilder<P> {
    provider: P,
    anchors: AnchorIndices,
}

impl<P: LandmarkProvider> SignatureBuilder<P> {
    pub fn new(provider: P, anchors: AnchorIndices) -> Self {
        Self { provider, anchors }
    }

    /// Build a signature, or report why the frame has none.
    ///
    /// Only provider failures are errors.
    pub fn build(&mut self, frame: &Frame) -> Result<SignatureOutcome, ProviderError> {
        let Some(landmarks) = self.provider.detect(frame)? else {
            return Ok(SignatureOutcome::Skipped(SkipReason::NoFaceDetected));
        };

        Ok(match signature_from_landmarks(landmarks, &self.anchors) {
            Ok(sig) => SignatureOutcome::Face(sig),
            Err(e) => {
                tracing::debug!(error = %e, "degenerate landmarks, no signature");
                SignatureOutcome::Skipped(SkipReason::DegenerateGeometry(e))
            }
        })
    }
}
