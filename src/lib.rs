//! # Tumor-grade library
//!
//! This crate grades brain MRI scans for tumor presence using a pre-trained
//! segmentation network.

//!
//! A Flair and a T1ce volume of the same patient are loaded from NIfTI files
//! (or a DICOM series directory), the same axial slice is taken from both,
//! resampled to the network's input resolution and normalised by the slice
//! maximum. The network labels every pixel as one of four tissue classes:
//!  - NOT tumor
//!  - NECROTIC/CORE
//!  - EDEMA
//!  - ENHANCING
//!
//!  The slice is then graded from the labels it contains: any necrotic core
//!  or enhancing tumor is high grade, edema alone is low grade, and a slice
//!  without either is reported as tumor not detected. Grading looks at label
//!  presence only; it is a triage signal, not a clinical grading standard.
//!
//!  The network is a black box behind [`SegmentationModel`]. With the `onnx`
//!  feature, [`OnnxSegmenter`] runs an ONNX export of it through ONNX
//!  Runtime. The model is loaded once and shared by every request.
//!
//! # Examples
//!
//! ## Grading a scan pair
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use tumor_grade::{AppConfig, InferenceError, InputTensor, Pipeline, ProbabilityMap, SegmentationModel};
//! struct Background;
//!
//! impl SegmentationModel for Background {
//!     fn segment(&self, input: &InputTensor) -> Result<ProbabilityMap, InferenceError> {
//!         let (height, width) = input.resolution();
//!         let mut probabilities = ndarray::Array3::zeros((height, width, 4));
//!         probabilities.slice_mut(ndarray::s![.., .., 0]).fill(1.0);
//!         Ok(ProbabilityMap::new(probabilities))
//!     }
//! }
//!
//! let pipeline = Pipeline::new(&AppConfig::default(), Arc::new(Background));
//! let diagnosis = pipeline
//!     .diagnose_files("BraTS20_Training_275_flair.nii", "BraTS20_Training_275_t1ce.nii")
//!     .expect("should have graded the scan pair");
//! println!("{}", diagnosis.verdict);
//! ```

pub mod classifier;
pub mod config;
pub mod enums;
#[doc(hidden)]
pub mod fixtures;
pub mod grade;
mod interpolator;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod pipeline;
pub mod preprocess;
pub mod volume;
pub mod volume_loader;

pub use classifier::{ClassMap, Classifier, LabelMap, SegmentClasses};
pub use self::config::AppConfig;
pub use enums::{Interpolation, Modality, Orientation, SortBy};
pub use grade::{GradeEvaluator, GradeVerdict};
pub use model::{InferenceAdapter, InferenceError, InputTensor, ProbabilityMap, SegmentationModel};
#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmenter;
pub use pipeline::{Diagnosis, Pipeline, PipelineError};
pub use preprocess::{Slice, SlicePreprocessor};
pub use volume::Volume;
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
