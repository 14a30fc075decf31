//! MediaPipe Face Mesh landmark provider via ONNX Runtime.
//!
//! Runs the 192×192 face-landmark model on the whole frame (the frame is
//! expected to be a face-centred crop, as the dataset images are) and maps
//! the 468/478 mesh points back to frame pixel coordinates.

use crate::provider::{LandmarkProvider, ProviderError};
use crate::types::{LandmarkSet, Point3};
use facecheck_media::Frame;
use image::imageops::FilterType;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const MESH_INPUT_SIZE: usize = 192;
/// Face-presence probability below which a frame counts as faceless.
pub const DEFAULT_MIN_FACE_CONFIDENCE: f32 = 0.7;

/// Face Mesh ONNX session.
pub struct FaceMeshProvider {
    session: Session,
    num_outputs: usize,
    min_confidence: f32,
}

impl FaceMeshProvider {
    /// Load the Face Mesh ONNX model from the given path.
    pub fn load(model_path: &str, min_confidence: f32) -> Result<Self, ProviderError> {
        if !Path::new(model_path).exists() {
            return Err(ProviderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let num_outputs = session.outputs().len();
        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            min_confidence,
            "loaded Face Mesh model"
        );

        if num_outputs < 2 {
            return Err(ProviderError::InferenceFailed(format!(
                "Face Mesh model requires landmark and face-flag outputs, got {num_outputs}"
            )));
        }

        Ok(Self {
            session,
            num_outputs,
            min_confidence,
        })
    }

    /// Resize to 192×192 and pack into an NHWC float tensor in [0, 1].
    fn preprocess(frame: &Frame) -> Result<Array4<f32>, ProviderError> {
        let rgb = frame.to_rgb_image().ok_or_else(|| {
            ProviderError::InferenceFailed(format!(
                "frame buffer of {} bytes does not match {}x{}",
                frame.data.len(),
                frame.width,
                frame.height
            ))
        })?;
        let size = MESH_INPUT_SIZE as u32;
        let resized = image::imageops::resize(&rgb, size, size, FilterType::Triangle);

        let mut tensor = Array4::<f32>::zeros((1, MESH_INPUT_SIZE, MESH_INPUT_SIZE, 3));
        for (x, y, px) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, y as usize, x as usize, c]] = px[c] as f32 / 255.0;
            }
        }
        Ok(tensor)
    }
}

impl LandmarkProvider for FaceMeshProvider {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, ProviderError> {
        let input = Self::preprocess(frame)?;
        let num_outputs = self.num_outputs;

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let tensors = (0..num_outputs)
            .map(|i| {
                outputs[i]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| ProviderError::InferenceFailed(format!("output {i}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let MeshOutputs {
            face_logit,
            landmarks: raw_landmarks,
        } = classify_outputs(&tensors);

        let logit = face_logit
            .ok_or_else(|| ProviderError::InferenceFailed("no face-flag output".into()))?;
        let confidence = sigmoid(logit);
        if confidence < self.min_confidence {
            tracing::trace!(confidence, "no face in frame");
            return Ok(None);
        }

        let raw = raw_landmarks
            .ok_or_else(|| ProviderError::InferenceFailed("no landmark output".into()))?;
        decode_landmarks(raw, frame.width, frame.height).map(Some)
    }
}

/// The two Face Mesh outputs `detect` needs.
#[derive(Debug, Default, PartialEq)]
struct MeshOutputs<'a> {
    face_logit: Option<f32>,
    landmarks: Option<&'a [f32]>,
}

/// Tell outputs apart by size, since names differ between exports: a
/// single value is the face-flag logit, the first non-empty multiple of
/// three is the landmark tensor. Anything else is ignored.
fn classify_outputs<'a>(tensors: &[&'a [f32]]) -> MeshOutputs<'a> {
    let mut out = MeshOutputs::default();
    for &data in tensors {
        match data.len() {
            1 => out.face_logit = Some(data[0]),
            n if n > 0 && n % 3 == 0 && out.landmarks.is_none() => out.landmarks = Some(data),
            _ => {}
        }
    }
    out
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Map flat `[x, y, z]*` model-space triples to frame pixels.
///
/// z is divided by the input size, giving the same relative-depth units the
/// MediaPipe runtime reports.
fn decode_landmarks(raw: &[f32], width: u32, height: u32) -> Result<LandmarkSet, ProviderError> {
    let size = MESH_INPUT_SIZE as f32;
    let (sx, sy) = (width as f32 / size, height as f32 / size);
    let points = raw
        .chunks_exact(3)
        .map(|c| Point3::new(c[0] * sx, c[1] * sy, c[2] / size))
        .collect();
    LandmarkSet::new(points)
        .map_err(|e| ProviderError::InferenceFailed(format!("landmark output: {e}")))
}
