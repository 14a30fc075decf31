//! Landmark geometry: scale/translation normalization and anchor ratios.
//!
//! Both transforms are pure and deterministic. Neither divides by zero:
//! a collapsed face (zero extent, coincident eyes) is reported as
//! [`GeometryError`] and the caller treats the face as unusable.

use crate::types::{LandmarkSet, NormalizedLandmarkSet, Point3, RatioVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("landmark set is empty")]
    EmptyLandmarks,
    #[error("landmark extent is zero, cannot normalize")]
    ZeroScale,
    #[error("eye landmarks coincide, cannot compute ratios")]
    ZeroEyeDistance,
    #[error("anchor index {index} out of range for {len} landmarks")]
    AnchorOutOfRange { index: usize, len: usize },
    #[error("landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },
}

/// Provider-specific landmark indices of the six anatomical anchor points.
///
/// These are a contract with the landmark provider: a different model (or
/// a different export of the same model) may order its points differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorIndices {
    pub left_eye: usize,
    pub right_eye: usize,
    pub nose: usize,
    pub mouth_left: usize,
    pub mouth_right: usize,
    pub chin: usize,
}

impl AnchorIndices {
    /// MediaPipe Face Mesh (468/478 points): outer eye corners, nose tip,
    /// mouth corners, chin.
    pub const MEDIAPIPE_FACE_MESH: Self = Self {
        left_eye: 33,
        right_eye: 263,
        nose: 1,
        mouth_left: 61,
        mouth_right: 291,
        chin: 152,
    };

    fn all(&self) -> [usize; 6] {
        [
            self.left_eye,
            self.right_eye,
            self.nose,
            self.mouth_left,
            self.mouth_right,
            self.chin,
        ]
    }

    /// Check every anchor exists in a set of `len` landmarks.
    pub fn check(&self, len: usize) -> Result<(), GeometryError> {
        match self.all().into_iter().find(|&i| i >= len) {
            Some(index) => Err(GeometryError::AnchorOutOfRange { index, len }),
            None => Ok(()),
        }
    }
}

impl Default for AnchorIndices {
    fn default() -> Self {
        Self::MEDIAPIPE_FACE_MESH
    }
}

/// Reject NaN or infinite coordinates before any arithmetic.
fn check_finite(landmarks: &LandmarkSet) -> Result<(), GeometryError> {
    match landmarks
        .points()
        .iter()
        .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
    {
        Some(index) => Err(GeometryError::NonFinite { index }),
        None => Ok(()),
    }
}

/// Centre on the x/y mean and divide by `max(x-extent, y-extent)`.
///
/// z is divided by the same scale but not centred.
pub fn normalize(landmarks: &LandmarkSet) -> Result<NormalizedLandmarkSet, GeometryError> {
    check_finite(landmarks)?;
    let points = landmarks.points();
    let n = points.len() as f32;

    let (mut sum_x, mut sum_y) = (0.0f32, 0.0f32);
    let (mut min_x, mut max_x) = (f32::INFINITY, f32::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f32::INFINITY, f32::NEG_INFINITY);
    for p in points {
        sum_x += p.x;
        sum_y += p.y;
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    let scale = (max_x - min_x).max(max_y - min_y);
    if scale <= 0.0 || !scale.is_finite() {
        return Err(GeometryError::ZeroScale);
    }

    let (cx, cy) = (sum_x / n, sum_y / n);
    let points = points
        .iter()
        .map(|p| Point3::new((p.x - cx) / scale, (p.y - cy) / scale, p.z / scale))
        .collect();

    Ok(NormalizedLandmarkSet { points, scale })
}

/// Compute the four anchor ratios on raw landmarks (x/y only).
pub fn face_ratios(landmarks: &LandmarkSet, anchors: &AnchorIndices) -> Result<RatioVector, GeometryError> {
    check_finite(landmarks)?;
    anchors.check(landmarks.len())?;
    let pts = landmarks.points();
    let dist = |a: usize, b: usize| pts[a].planar_distance(&pts[b]);

    let eye_dist = dist(anchors.left_eye, anchors.right_eye);
    if eye_dist == 0.0 {
        return Err(GeometryError::ZeroEyeDistance);
    }

    Ok(RatioVector([
        dist(anchors.left_eye, anchors.nose) / eye_dist,
        dist(anchors.right_eye, anchors.nose) / eye_dist,
        dist(anchors.mouth_left, anchors.mouth_right) / eye_dist,
        dist(anchors.nose, anchors.chin) / eye_dist,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Six-point face with anchors at indices 0..6.
    const COMPACT: AnchorIndices = AnchorIndices {
        left_eye: 0,
        right_eye: 1,
        nose: 2,
        mouth_left: 3,
        mouth_right: 4,
        chin: 5,
    };

    fn compact_face() -> LandmarkSet {
        LandmarkSet::new(vec![
            Point3::new(80.0, 60.0, 0.0),   // left eye
            Point3::new(120.0, 60.0, 0.0),  // right eye
            Point3::new(100.0, 90.0, -5.0), // nose
            Point3::new(85.0, 110.0, 0.0),  // mouth left
            Point3::new(115.0, 110.0, 0.0), // mouth right
            Point3::new(100.0, 140.0, 2.0), // chin
        ])
        .unwrap()
    }

    #[test]
    fn test_normalize_centred_unit_extent() {
        let norm = normalize(&compact_face()).unwrap();
        let n = norm.len() as f32;
        let mean_x: f32 = norm.points().iter().map(|p| p.x).sum::<f32>() / n;
        let mean_y: f32 = norm.points().iter().map(|p| p.y).sum::<f32>() / n;
        assert!(mean_x.abs() < 1e-6, "mean_x = {mean_x}");
        assert!(mean_y.abs() < 1e-6, "mean_y = {mean_y}");

        // y-extent (80) dominates x-extent (40)
        assert_eq!(norm.scale(), 80.0);
        let ys: Vec<f32> = norm.points().iter().map(|p| p.y).collect();
        let extent = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max)
            - ys.iter().cloned().fold(f32::INFINITY, f32::min);
        assert!((extent - 1.0).abs() < 1e-6, "extent = {extent}");
    }

    #[test]
    fn test_normalize_scales_depth_without_centring() {
        let norm = normalize(&compact_face()).unwrap();
        assert!((norm.points()[2].z - (-5.0 / 80.0)).abs() < 1e-7);
        assert!((norm.points()[5].z - (2.0 / 80.0)).abs() < 1e-7);
    }

    #[test]
    fn test_normalize_translation_and_scale_invariant() {
        let base = normalize(&compact_face()).unwrap();
        let moved = LandmarkSet::new(
            compact_face()
                .points()
                .iter()
                .map(|p| Point3::new(p.x * 2.0 + 17.0, p.y * 2.0 - 3.0, p.z * 2.0))
                .collect(),
        )
        .unwrap();
        let moved = normalize(&moved).unwrap();
        for (a, b) in base.points().iter().zip(moved.points()) {
            assert!(a.distance(b) < 1e-5);
        }
    }

    #[test]
    fn test_normalize_single_point_is_degenerate() {
        let lm = LandmarkSet::new(vec![Point3::new(5.0, 5.0, 1.0)]).unwrap();
        assert_eq!(normalize(&lm), Err(GeometryError::ZeroScale));
    }

    #[test]
    fn test_normalize_coincident_points_is_degenerate() {
        let lm = LandmarkSet::new(vec![Point3::new(5.0, 5.0, 0.0); 10]).unwrap();
        assert_eq!(normalize(&lm), Err(GeometryError::ZeroScale));
    }

    #[test]
    fn test_non_finite_landmark_is_degenerate() {
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let mut pts = compact_face().points().to_vec();
            pts[3].x = bad;
            let lm = LandmarkSet::new(pts.clone()).unwrap();
            assert_eq!(normalize(&lm), Err(GeometryError::NonFinite { index: 3 }));
            assert_eq!(face_ratios(&lm, &COMPACT), Err(GeometryError::NonFinite { index: 3 }));

            pts[3].x = 85.0;
            pts[5].z = bad;
            let lm = LandmarkSet::new(pts).unwrap();
            assert_eq!(normalize(&lm), Err(GeometryError::NonFinite { index: 5 }));
        }
    }

    #[test]
    fn test_normalize_collinear_points_use_nonzero_axis() {
        // Vertical line: x-extent 0, y-extent 10
        let lm = LandmarkSet::new(vec![Point3::new(5.0, 0.0, 0.0), Point3::new(5.0, 10.0, 0.0)]).unwrap();
        let norm = normalize(&lm).unwrap();
        assert_eq!(norm.scale(), 10.0);
        assert!((norm.points()[0].y + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_face_ratios_values() {
        let r = face_ratios(&compact_face(), &COMPACT).unwrap();
        // eye distance 40; left eye → nose = sqrt(20² + 30²)
        let expected_eye_nose = (20.0f32 * 20.0 + 30.0 * 30.0).sqrt() / 40.0;
        assert!((r.0[0] - expected_eye_nose).abs() < 1e-6);
        assert!((r.0[1] - expected_eye_nose).abs() < 1e-6);
        assert!((r.0[2] - 30.0 / 40.0).abs() < 1e-6);
        assert!((r.0[3] - 50.0 / 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_face_ratios_ignore_depth() {
        let flat = LandmarkSet::new(
            compact_face()
                .points()
                .iter()
                .map(|p| Point3::new(p.x, p.y, 0.0))
                .collect(),
        )
        .unwrap();
        assert_eq!(
            face_ratios(&flat, &COMPACT).unwrap(),
            face_ratios(&compact_face(), &COMPACT).unwrap()
        );
    }

    #[test]
    fn test_face_ratios_scale_invariant() {
        let scaled = LandmarkSet::new(
            compact_face()
                .points()
                .iter()
                .map(|p| Point3::new(p.x * 3.0, p.y * 3.0, p.z))
                .collect(),
        )
        .unwrap();
        let a = face_ratios(&compact_face(), &COMPACT).unwrap();
        let b = face_ratios(&scaled, &COMPACT).unwrap();
        for i in 0..4 {
            assert!((a.0[i] - b.0[i]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_face_ratios_zero_eye_distance() {
        let mut pts = compact_face().points().to_vec();
        pts[1] = pts[0];
        let lm = LandmarkSet::new(pts).unwrap();
        assert_eq!(face_ratios(&lm, &COMPACT), Err(GeometryError::ZeroEyeDistance));
    }

    #[test]
    fn test_face_ratios_anchor_out_of_range() {
        let result = face_ratios(&compact_face(), &AnchorIndices::MEDIAPIPE_FACE_MESH);
        assert_eq!(
            result,
            Err(GeometryError::AnchorOutOfRange { index: 33, len: 6 })
        );
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let a = (normalize(&compact_face()).unwrap(), face_ratios(&compact_face(), &COMPACT).unwrap());
        let b = (normalize(&compact_face()).unwrap(), face_ratios(&compact_face(), &COMPACT).unwrap());
        assert_eq!(a, b);
    }
}
