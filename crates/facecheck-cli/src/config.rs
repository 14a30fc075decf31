use facecheck_core::comparator::{DEFAULT_MATCH_THRESHOLD, WeightedComparator};
use facecheck_core::mesh::DEFAULT_MIN_FACE_CONFIDENCE;
use facecheck_core::AnchorIndices;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Pipeline configuration.
///
/// Sources, later wins: built-in defaults, the TOML file named by
/// `FACECHECK_CONFIG`, then individual `FACECHECK_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the Face Mesh ONNX model.
    pub model_path: PathBuf,
    /// Minimum face-presence probability from the landmark model.
    pub min_face_confidence: f32,
    /// Scores strictly below this are a match.
    pub threshold: f32,
    /// Square size frames are resized to before detection; 0 keeps the
    /// decoded size.
    pub frame_size: u32,
    /// Number of parallel video workers (each loads its own model).
    pub workers: usize,
    /// Weights of the landmark and ratio terms.
    pub comparator: WeightedComparator,
    /// Landmark indices of the ratio anchor points.
    pub anchors: AnchorIndices,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("facecheck");

        Self {
            model_path: data_dir.join("face_mesh.onnx"),
            min_face_confidence: DEFAULT_MIN_FACE_CONFIDENCE,
            threshold: DEFAULT_MATCH_THRESHOLD,
            frame_size: 224,
            workers: 1,
            comparator: WeightedComparator::default(),
            anchors: AnchorIndices::default(),
        }
    }
}

impl Config {
    /// Load from the config file (if any) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("FACECHECK_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&src)
    }

    pub fn from_toml(src: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(src)?)
    }

    /// Override fields from `FACECHECK_*` variables. Unparseable values
    /// leave the field unchanged.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("FACECHECK_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        self.min_face_confidence = env_f32(&var, "FACECHECK_MIN_FACE_CONFIDENCE", self.min_face_confidence);
        self.threshold = env_f32(&var, "FACECHECK_THRESHOLD", self.threshold);
        self.comparator.landmark_weight =
            env_f32(&var, "FACECHECK_LANDMARK_WEIGHT", self.comparator.landmark_weight);
        self.comparator.ratio_weight = env_f32(&var, "FACECHECK_RATIO_WEIGHT", self.comparator.ratio_weight);
        self.frame_size = env_u32(&var, "FACECHECK_FRAME_SIZE", self.frame_size);
        self.workers = env_usize(&var, "FACECHECK_WORKERS", self.workers);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("threshold", self.threshold),
            ("comparator.landmark_weight", self.comparator.landmark_weight),
            ("comparator.ratio_weight", self.comparator.ratio_weight),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be a finite non-negative number, got {value}")));
            }
        }
        if !(0.0..=1.0).contains(&self.min_face_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_face_confidence must be within 0–1, got {}",
                self.min_face_confidence
            )));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        Ok(())
    }

    /// Resize target for decoded frames.
    pub fn resize(&self) -> Option<u32> {
        (self.frame_size > 0).then_some(self.frame_size)
    }

    pub fn model_path_str(&self) -> String {
        self.model_path.to_string_lossy().into_owned()
    }
}

fn env_f32(var: &impl Fn(&str) -> Option<String>, key: &str, default: f32) -> f32 {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(var: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> u32 {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(var: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.threshold, 0.06);
        assert_eq!(config.comparator.landmark_weight, 0.7);
        assert_eq!(config.comparator.ratio_weight, 0.3);
        assert_eq!(config.anchors, AnchorIndices::MEDIAPIPE_FACE_MESH);
        assert_eq!(config.resize(), Some(224));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = Config::from_toml(
            r#"
            threshold = 0.08
            frame_size = 0

            [anchors]
            left_eye = 130
            right_eye = 359

            [comparator]
            ratio_weight = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.threshold, 0.08);
        assert_eq!(config.resize(), None);
        assert_eq!(config.anchors.left_eye, 130);
        assert_eq!(config.anchors.right_eye, 359);
        // Unspecified anchors keep the Face Mesh defaults
        assert_eq!(config.anchors.chin, 152);
        assert_eq!(config.comparator.ratio_weight, 0.5);
        assert_eq!(config.comparator.landmark_weight, 0.7);
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(matches!(Config::from_toml("threshold = \"low\""), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("FACECHECK_THRESHOLD", "0.1"),
            ("FACECHECK_RATIO_WEIGHT", "0.25"),
            ("FACECHECK_WORKERS", "4"),
            ("FACECHECK_MODEL_PATH", "/models/mesh.onnx"),
            ("FACECHECK_FRAME_SIZE", "not-a-number"),
        ]));
        assert_eq!(config.threshold, 0.1);
        assert_eq!(config.comparator.ratio_weight, 0.25);
        assert_eq!(config.workers, 4);
        assert_eq!(config.model_path, PathBuf::from("/models/mesh.onnx"));
        assert_eq!(config.frame_size, 224);
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut config = Config::default();
        config.comparator.landmark_weight = -0.1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_nan_threshold() {
        let mut config = Config::default();
        config.threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file(Path::new("/nonexistent/facecheck.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_roundtrips_through_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let back = Config::from_toml(&text).unwrap();
        assert_eq!(back.anchors, config.anchors);
        assert_eq!(back.threshold, config.threshold);
    }
}
