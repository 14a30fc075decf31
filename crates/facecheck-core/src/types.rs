use crate::landmarks::GeometryError;
use serde::{Deserialize, Serialize};

/// One landmark point: x/y in frame pixels, z in provider-relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in 3D.
    pub fn distance(&self, other: &Point3) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2)).sqrt()
    }

    /// Euclidean distance in the image plane, ignoring depth.
    pub fn planar_distance(&self, other: &Point3) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// The full landmark output of one detected face. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point3>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point3>) -> Result<Self, GeometryError> {
        if points.is_empty() {
            return Err(GeometryError::EmptyLandmarks);
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: construction rejects empty sets.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Landmarks centred on their x/y mean and divided by the dominant extent.
///
/// Only produced by [`crate::landmarks::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedLandmarkSet {
    pub(crate) points: Vec<Point3>,
    /// The divisor that was applied (max of x-extent and y-extent, in pixels).
    pub(crate) scale: f32,
}

impl NormalizedLandmarkSet {
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

/// Number of entries in a [`RatioVector`].
pub const RATIO_COUNT: usize = 4;

/// Anchor distances divided by the eye-to-eye distance:
/// `[left_eye→nose, right_eye→nose, mouth width, nose→chin]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatioVector(pub [f32; RATIO_COUNT]);

impl RatioVector {
    /// Mean absolute element-wise difference.
    pub fn mean_abs_diff(&self, other: &RatioVector) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).abs())
            .sum::<f32>()
            / RATIO_COUNT as f32
    }
}

/// Geometric signature of one detected face in one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceSignature {
    pub landmarks: NormalizedLandmarkSet,
    pub ratios: RatioVector,
}

/// A reference signature and the image it was built from.
#[derive(Debug, Clone)]
pub struct ReferenceFace {
    pub label: String,
    pub signature: FaceSignature,
}

/// The allowed identities. Built once, read-only afterwards; may be empty.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCollection {
    faces: Vec<ReferenceFace>,
}

impl ReferenceCollection {
    pub fn new(faces: Vec<ReferenceFace>) -> Self {
        Self { faces }
    }

    pub fn faces(&self) -> &[ReferenceFace] {
        &self.faces
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// No frame can ever match an empty collection.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Result of matching a probe signature against a reference collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    /// Lowest dissimilarity seen, `None` when the collection was empty.
    pub best_score: Option<f32>,
    /// Label of the closest reference, if it passed the threshold.
    pub reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_set_rejects_empty() {
        assert!(matches!(LandmarkSet::new(vec![]), Err(GeometryError::EmptyLandmarks)));
    }

    #[test]
    fn test_point_distances() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(3.0, 4.0, 12.0);
        assert!((a.planar_distance(&b) - 5.0).abs() < 1e-6);
        assert!((a.distance(&b) - 13.0).abs() < 1e-6);
    }

    #[test]
    fn test_ratio_mean_abs_diff() {
        let a = RatioVector([1.0, 1.0, 1.0, 1.0]);
        let b = RatioVector([1.2, 0.8, 1.0, 1.4]);
        assert!((a.mean_abs_diff(&b) - 0.2).abs() < 1e-6);
        assert_eq!(a.mean_abs_diff(&a), 0.0);
    }

    #[test]
    fn test_empty_reference_collection() {
        let refs = ReferenceCollection::default();
        assert!(refs.is_empty());
        assert_eq!(refs.len(), 0);
    }
}
