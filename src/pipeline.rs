//! End-to-end grading of a Flair/T1ce scan pair.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span};

use crate::classifier::{ClassMap, ClassifyError, Classifier, LabelMap, SegmentClasses};
use crate::config::AppConfig;
use crate::enums::Modality;
use crate::grade::{GradeEvaluator, GradeVerdict};
use crate::model::{InferenceAdapter, InferenceError, SegmentationModel};
use crate::preprocess::{PreprocessError, SlicePreprocessor};
use crate::volume::Volume;
use crate::volume_loader::{VolumeLoader, VolumeLoaderError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0} volume is missing or empty")]
    InputMissing(Modality),

    #[error("Failed to load {modality} volume: {source}")]
    VolumeLoad {
        modality: Modality,
        #[source]
        source: VolumeLoaderError,
    },

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

impl PipelineError {
    fn from_load(modality: Modality, source: VolumeLoaderError) -> Self {
        match source {
            VolumeLoaderError::MissingInput => Self::InputMissing(modality),
            source => Self::VolumeLoad { modality, source },
        }
    }

    /// True when the request itself was at fault rather than the service.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InputMissing(_) | Self::VolumeLoad { .. } | Self::Preprocess(_) => true,
            Self::Inference(_) | Self::Classify(_) => false,
        }
    }
}

/// Outcome of grading one scan pair.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub verdict: GradeVerdict,
    pub slice_index: usize,
    pub label_map: LabelMap,
    /// Pixels per label. Informational only, grading ignores area.
    pub label_counts: BTreeMap<String, usize>,
    /// Inputs whose slice was blank and fed to the model as zeros.
    pub degenerate_inputs: Vec<Modality>,
    #[serde(skip)]
    pub class_map: ClassMap,
}

/// Preprocess, segment, classify and grade, in that order.
///
/// The model is shared; a pipeline is cheap to clone per request.
#[derive(Clone)]
pub struct Pipeline {
    preprocessor: SlicePreprocessor,
    slice_index: usize,
    adapter: InferenceAdapter,
    classes: SegmentClasses,
    grader: GradeEvaluator,
}

impl Pipeline {
    pub fn new(config: &AppConfig, model: Arc<dyn SegmentationModel>) -> Self {
        let preprocessing = &config.preprocessing;
        let classes = SegmentClasses::new(config.segmentation.labels.clone());
        Self {
            preprocessor: SlicePreprocessor::new(
                preprocessing.target_size,
                preprocessing.orientation,
                preprocessing.interpolation,
            ),
            slice_index: preprocessing.slice_index,
            adapter: InferenceAdapter::new(model, classes.len()),
            classes,
            grader: GradeEvaluator::new(
                config.grading.high_grade.clone(),
                config.grading.low_grade.clone(),
            ),
        }
    }

    pub fn slice_index(&self) -> usize {
        self.slice_index
    }

    pub fn diagnose_files(
        &self,
        flair: impl AsRef<Path>,
        t1ce: impl AsRef<Path>,
    ) -> Result<Diagnosis, PipelineError> {
        let (flair, t1ce) = (flair.as_ref(), t1ce.as_ref());
        let (flair, t1ce) =
            rayon::join(|| VolumeLoader::load(flair), || VolumeLoader::load(t1ce));
        let flair = flair.map_err(|e| PipelineError::from_load(Modality::Flair, e))?;
        let t1ce = t1ce.map_err(|e| PipelineError::from_load(Modality::T1ce, e))?;
        self.diagnose_volumes(&flair, &t1ce)
    }

    /// Grade NIfTI byte streams, e.g. straight from an upload.
    pub fn diagnose_bytes(&self, flair: &[u8], t1ce: &[u8]) -> Result<Diagnosis, PipelineError> {
        // Both inputs are checked before either is parsed.
        if flair.is_empty() {
            return Err(PipelineError::InputMissing(Modality::Flair));
        }
        if t1ce.is_empty() {
            return Err(PipelineError::InputMissing(Modality::T1ce));
        }
        let (flair, t1ce) = rayon::join(
            || VolumeLoader::load_nifti_bytes(flair),
            || VolumeLoader::load_nifti_bytes(t1ce),
        );
        let flair = flair.map_err(|e| PipelineError::from_load(Modality::Flair, e))?;
        let t1ce = t1ce.map_err(|e| PipelineError::from_load(Modality::T1ce, e))?;
        self.diagnose_volumes(&flair, &t1ce)
    }

    pub fn diagnose_volumes(&self, flair: &Volume, t1ce: &Volume) -> Result<Diagnosis, PipelineError> {
        let _span = info_span!("diagnose", slice_index = self.slice_index).entered();
        let start = Instant::now();

        let flair_slice = self.preprocessor.prepare(flair, self.slice_index)?;
        let t1ce_slice = self.preprocessor.prepare(t1ce, self.slice_index)?;
        let degenerate_inputs: Vec<Modality> = [
            (Modality::Flair, flair_slice.is_degenerate()),
            (Modality::T1ce, t1ce_slice.is_degenerate()),
        ]
        .into_iter()
        .filter_map(|(modality, degenerate)| degenerate.then_some(modality))
        .collect();

        let probabilities = self.adapter.infer(&flair_slice, &t1ce_slice)?;
        let class_map = Classifier::argmax(&probabilities);
        let label_map = self.classes.map(&class_map)?;
        let verdict = self.grader.evaluate(&label_map);
        let label_counts = label_map.label_counts();

        info!(
            verdict = %verdict,
            labels = ?label_counts.keys().collect::<Vec<_>>(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Scan pair graded"
        );

        Ok(Diagnosis {
            verdict,
            slice_index: self.slice_index,
            label_map,
            label_counts,
            degenerate_inputs,
            class_map,
        })
    }
}
