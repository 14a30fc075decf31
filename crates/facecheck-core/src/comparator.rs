//! Signature dissimilarity and threshold matching against a reference set.

use crate::types::{FaceSignature, MatchResult, ReferenceCollection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Weight of the mean landmark distance in the combined score.
pub const DEFAULT_LANDMARK_WEIGHT: f32 = 0.7;
/// Weight of the mean ratio difference in the combined score.
pub const DEFAULT_RATIO_WEIGHT: f32 = 0.3;
/// Scores strictly below this count as the same person. Calibrated for
/// MediaPipe Face Mesh landmarks; recalibrate for any other provider.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.06;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompareError {
    #[error("landmark count mismatch: {left} vs {right} — providers disagree on layout")]
    ShapeMismatch { left: usize, right: usize },
}

/// Strategy for scoring the dissimilarity of two face signatures.
/// Lower is more similar; 0 means identical.
pub trait Comparator {
    fn score(&self, a: &FaceSignature, b: &FaceSignature) -> Result<f32, CompareError>;
}

/// `landmark_weight * mean point distance + ratio_weight * mean ratio difference`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightedComparator {
    pub landmark_weight: f32,
    pub ratio_weight: f32,
}

impl Default for WeightedComparator {
    fn default() -> Self {
        Self {
            landmark_weight: DEFAULT_LANDMARK_WEIGHT,
            ratio_weight: DEFAULT_RATIO_WEIGHT,
        }
    }
}

impl Comparator for WeightedComparator {
    fn score(&self, a: &FaceSignature, b: &FaceSignature) -> Result<f32, CompareError> {
        let (pa, pb) = (a.landmarks.points(), b.landmarks.points());
        if pa.len() != pb.len() {
            return Err(CompareError::ShapeMismatch {
                left: pa.len(),
                right: pb.len(),
            });
        }

        let lm_dist = pa.iter().zip(pb).map(|(p, q)| p.distance(q)).sum::<f32>() / pa.len() as f32;
        let ratio_dist = a.ratios.mean_abs_diff(&b.ratios);

        Ok(self.landmark_weight * lm_dist + self.ratio_weight * ratio_dist)
    }
}

/// Compares a probe against every reference and applies the threshold.
#[derive(Debug, Clone)]
pub struct ThresholdMatcher<C> {
    comparator: C,
    threshold: f32,
}

impl<C: Comparator> ThresholdMatcher<C> {
    pub fn new(comparator: C, threshold: f32) -> Self {
        Self {
            comparator,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Matched iff any reference scores strictly below the threshold.
    ///
    /// Every reference is scored, so the result always carries the best
    /// score for diagnostics. NaN scores never match and never become the
    /// best. A shape mismatch on any entry aborts.
    pub fn compare(
        &self,
        probe: &FaceSignature,
        references: &ReferenceCollection,
    ) -> Result<MatchResult, CompareError> {
        let mut best: Option<(f32, usize)> = None;
        let mut matched = false;

        for (i, reference) in references.faces().iter().enumerate() {
            let score = self.comparator.score(probe, &reference.signature)?;
            if score.is_nan() {
                tracing::warn!(reference = %reference.label, "comparator produced NaN, reference ignored");
                continue;
            }
            matched |= score < self.threshold;
            if best.map_or(true, |(s, _)| score < s) {
                best = Some((score, i));
            }
        }

        Ok(MatchResult {
            matched,
            best_score: best.map(|(s, _)| s),
            reference: best
                .filter(|_| matched)
                .map(|(_, idx)| references.faces()[idx].label.clone()),
        })
    }
}
