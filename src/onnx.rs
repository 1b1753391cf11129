//! ONNX Runtime backed segmentation model.
//!
//! Expects an NHWC export of the network: input `[1, H, W, 2]`, output
//! `[1, H, W, C]` with softmax probabilities along the last axis.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array3;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tracing::info;

use crate::model::{INPUT_CHANNELS, InferenceError, InputTensor, ProbabilityMap, SegmentationModel};

pub struct OnnxSegmenter {
    // `Session::run` needs exclusive access.
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    path: PathBuf,
}

impl OnnxSegmenter {
    /// Load the model once at start-up.
    ///
    /// `input_name` and `output_name` default to the session's first input
    /// and first output.
    pub fn load(
        path: impl AsRef<Path>,
        input_name: Option<&str>,
        output_name: Option<&str>,
        intra_threads: usize,
    ) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let unavailable = |reason: String| InferenceError::ModelUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        if !path.is_file() {
            return Err(unavailable("model file not found".to_string()));
        }

        info!(path = %path.display(), threads = intra_threads, "Loading ONNX segmentation model");
        let session =
            build_session(path, intra_threads).map_err(|e| unavailable(format!("{e:#}")))?;

        let input_name = match input_name {
            Some(name) => name.to_string(),
            None => session
                .inputs()
                .first()
                .map(|input| input.name().to_string())
                .ok_or_else(|| unavailable("model declares no inputs".to_string()))?,
        };
        let output_name = match output_name {
            Some(name) => name.to_string(),
            None => session
                .outputs()
                .first()
                .map(|output| output.name().to_string())
                .ok_or_else(|| unavailable("model declares no outputs".to_string()))?,
        };

        info!(input = %input_name, output = %output_name, "Model loaded successfully");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn build_session(path: &Path, intra_threads: usize) -> anyhow::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(path)?;
    Ok(session)
}

impl SegmentationModel for OnnxSegmenter {
    fn segment(&self, input: &InputTensor) -> Result<ProbabilityMap, InferenceError> {
        let (height, width) = input.resolution();
        let shape = [1_i64, height as i64, width as i64, INPUT_CHANNELS as i64];
        let values: Vec<f32> = input.data().iter().copied().collect();
        let tensor = Tensor::from_array((shape, values.into_boxed_slice()))
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| InferenceError::Runtime(format!("session lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            InferenceError::Runtime(format!("model produced no output '{}'", self.output_name))
        })?;
        let (output_shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let dims: &[i64] = output_shape;
        let (rows, columns, classes) = match dims {
            [1, h, w, c] | [h, w, c] => (*h as usize, *w as usize, *c as usize),
            _ => {
                return Err(InferenceError::UnexpectedOutputShape {
                    expected: (height, width, 0),
                    actual: dims.iter().map(|&d| d as usize).collect(),
                });
            }
        };

        let probabilities = Array3::from_shape_vec((rows, columns, classes), data.to_vec())
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;
        Ok(ProbabilityMap::new(probabilities))
    }
}
