//! facecheck-core — Geometric face verification.
//!
//! Builds landmark signatures (normalized mesh + anchor ratios) for faces in
//! reference images and video frames, and decides whether every face in the
//! videos matches a reference. Landmarks come from a pluggable provider; the
//! bundled one runs MediaPipe Face Mesh via ONNX Runtime.

pub mod comparator;
pub mod landmarks;
pub mod mesh;
pub mod provider;
pub mod reference;
pub mod signature;
pub mod types;
pub mod verifier;

pub use comparator::{Comparator, ThresholdMatcher, WeightedComparator};
pub use landmarks::AnchorIndices;
pub use mesh::FaceMeshProvider;
pub use provider::LandmarkProvider;
pub use reference::build_reference_collection;
pub use signature::{SignatureBuilder, SignatureOutcome, SkipReason};
pub use types::{FaceSignature, LandmarkSet, MatchResult, Point3, ReferenceCollection};
pub use verifier::{VerificationReport, Verifier, VerifierState, VerifyError};
