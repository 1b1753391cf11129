//! Boundary to the pre-trained segmentation network.
//!
//! The network is a black box behind [`SegmentationModel`]: it receives a
//! `(H, W, 2)` stack of normalised slices and answers with a `(H, W, C)`
//! tensor of per-pixel class probabilities. [`InferenceAdapter`] owns the
//! stacking and checks both sides of that contract so that a misbehaving
//! model surfaces as an [`InferenceError`] instead of a wrong verdict.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use ndarray::{Array3, Axis, stack};
use thiserror::Error;
use tracing::debug;

use crate::preprocess::Slice;

/// Number of input channels: Flair and T1ce.
pub const INPUT_CHANNELS: usize = 2;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Segmentation model at {path} is unavailable: {reason}")]
    ModelUnavailable { path: PathBuf, reason: String },

    #[error("Input slices differ in resolution: {first:?} vs {second:?}")]
    MismatchedSlices {
        first: (usize, usize),
        second: (usize, usize),
    },

    #[error("Model returned shape {actual:?}, expected {expected:?}")]
    UnexpectedOutputShape {
        expected: (usize, usize, usize),
        actual: Vec<usize>,
    },

    #[error("Model returned {count} non-finite probabilities")]
    InvalidOutput { count: usize },

    #[error("Model inference failed: {0}")]
    Runtime(String),
}

/// Two normalised slices stacked along the channel axis, shape `(H, W, 2)`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor(Array3<f32>);

impl InputTensor {
    pub fn data(&self) -> &Array3<f32> {
        &self.0
    }

    /// `(height, width)` of each channel.
    pub fn resolution(&self) -> (usize, usize) {
        let (height, width, _) = self.0.dim();
        (height, width)
    }
}

/// Per-pixel class probabilities, shape `(H, W, C)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap(Array3<f32>);

impl ProbabilityMap {
    pub fn new(data: Array3<f32>) -> Self {
        Self(data)
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.0
    }

    pub fn class_count(&self) -> usize {
        self.0.dim().2
    }
}

/// A segmentation network treated as a pure function.
///
/// Implementations are loaded once and shared read-only between requests;
/// a runtime that needs exclusive access to run must serialise internally.
pub trait SegmentationModel: Send + Sync {
    fn segment(&self, input: &InputTensor) -> Result<ProbabilityMap, InferenceError>;
}

#[derive(Clone)]
pub struct InferenceAdapter {
    model: Arc<dyn SegmentationModel>,
    class_count: usize,
}

impl InferenceAdapter {
    pub fn new(model: Arc<dyn SegmentationModel>, class_count: usize) -> Self {
        Self { model, class_count }
    }

    /// Stack the Flair and T1ce slices, in that order, into the model input.
    pub fn stack(flair: &Slice, t1ce: &Slice) -> Result<InputTensor, InferenceError> {
        if flair.dim() != t1ce.dim() {
            return Err(InferenceError::MismatchedSlices {
                first: flair.dim(),
                second: t1ce.dim(),
            });
        }
        let stacked = stack(Axis(2), &[flair.data().view(), t1ce.data().view()])
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;
        Ok(InputTensor(stacked))
    }

    /// Run the model on a pair of slices and validate the output.
    ///
    /// The output must be `(H, W, C)` for the configured class count and
    /// hold only finite values.
    pub fn infer(&self, flair: &Slice, t1ce: &Slice) -> Result<ProbabilityMap, InferenceError> {
        let input = Self::stack(flair, t1ce)?;
        let (height, width) = input.resolution();

        let start = Instant::now();
        let probabilities = self.model.segment(&input)?;
        debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            "Segmentation model returned"
        );

        let expected = (height, width, self.class_count);
        if probabilities.data().dim() != expected {
            return Err(InferenceError::UnexpectedOutputShape {
                expected,
                actual: probabilities.data().shape().to_vec(),
            });
        }

        let count = probabilities.data().iter().filter(|p| !p.is_finite()).count();
        if count > 0 {
            return Err(InferenceError::InvalidOutput { count });
        }
        Ok(probabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, s};

    /// Echoes the Flair channel into class 0 and the T1ce channel into class 1.
    struct Echo {
        classes: usize,
    }

    impl SegmentationModel for Echo {
        fn segment(&self, input: &InputTensor) -> Result<ProbabilityMap, InferenceError> {
            let (height, width) = input.resolution();
            let mut out = Array3::zeros((height, width, self.classes));
            out.slice_mut(s![.., .., 0]).assign(&input.data().slice(s![.., .., 0]));
            out.slice_mut(s![.., .., 1]).assign(&input.data().slice(s![.., .., 1]));
            Ok(ProbabilityMap::new(out))
        }
    }

    /// Answers with the right shape but a poisoned pixel.
    struct Poisoned;

    impl SegmentationModel for Poisoned {
        fn segment(&self, input: &InputTensor) -> Result<ProbabilityMap, InferenceError> {
            let (height, width) = input.resolution();
            let mut out = Array3::from_elem((height, width, 4), 0.25);
            out[[0, 1, 2]] = f32::NAN;
            out[[1, 0, 3]] = f32::INFINITY;
            Ok(ProbabilityMap::new(out))
        }
    }

    fn slice(value: f32, size: usize) -> Slice {
        Slice::normalized(Array2::from_elem((size, size), value))
    }

    #[test]
    fn stacks_flair_then_t1ce() {
        let input = InferenceAdapter::stack(&slice(1.0, 3), &slice(0.0, 3)).unwrap();
        assert_eq!(input.data().dim(), (3, 3, INPUT_CHANNELS));
        assert_eq!(input.data()[[1, 1, 0]], 1.0);
        assert_eq!(input.data()[[1, 1, 1]], 0.0);
    }

    #[test]
    fn rejects_mismatched_resolutions() {
        let err = InferenceAdapter::stack(&slice(1.0, 3), &slice(1.0, 4)).unwrap_err();
        assert!(matches!(err, InferenceError::MismatchedSlices { .. }));
    }

    #[test]
    fn passes_probabilities_through() {
        let adapter = InferenceAdapter::new(Arc::new(Echo { classes: 4 }), 4);
        let probabilities = adapter.infer(&slice(2.0, 2), &slice(0.0, 2)).unwrap();
        assert_eq!(probabilities.class_count(), 4);
        assert_eq!(probabilities.data()[[0, 0, 0]], 1.0);
    }

    #[test]
    fn rejects_wrong_class_count() {
        let adapter = InferenceAdapter::new(Arc::new(Echo { classes: 3 }), 4);
        let err = adapter.infer(&slice(1.0, 2), &slice(1.0, 2)).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::UnexpectedOutputShape {
                expected: (2, 2, 4),
                ..
            }
        ));
    }

    #[test]
    fn rejects_non_finite_probabilities() {
        let adapter = InferenceAdapter::new(Arc::new(Poisoned), 4);
        let err = adapter.infer(&slice(1.0, 2), &slice(1.0, 2)).unwrap_err();
        assert!(matches!(err, InferenceError::InvalidOutput { count: 2 }));
    }
}
