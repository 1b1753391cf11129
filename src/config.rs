//! Configuration management for the grading pipeline

use crate::classifier::DEFAULT_LABELS;
use crate::enums::{Interpolation, Orientation};
use anyhow::{Context, Result, ensure};
use ::config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the optional configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/tumor_grade.toml";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub preprocessing: PreprocessingConfig,
    pub model: ModelConfig,
    pub segmentation: SegmentationConfig,
    pub grading: GradingConfig,
    pub logging: LoggingConfig,
}

/// Slice selection and resampling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Side length of the square model input
    pub target_size: usize,
    /// Index of the slice fed to the model
    pub slice_index: usize,
    pub orientation: Orientation,
    pub interpolation: Interpolation,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            target_size: 128,
            slice_index: 75,
            orientation: Orientation::Axial,
            interpolation: Interpolation::Bilinear,
        }
    }
}

/// Segmentation model configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX export of the segmentation network
    pub path: PathBuf,
    /// Input tensor name, defaults to the model's first input
    pub input_name: Option<String>,
    /// Output tensor name, defaults to the model's first output
    pub output_name: Option<String>,
    /// Number of threads for ONNX inference
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/brain_tumor_segmentation.onnx"),
            input_name: None,
            output_name: None,
            intra_threads: 1,
        }
    }
}

/// Class label enumeration, indexed by model output channel
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub labels: Vec<String>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Labels that decide the verdict
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    pub high_grade: Vec<String>,
    pub low_grade: Vec<String>,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            high_grade: vec!["NECROTIC/CORE".to_string(), "ENHANCING".to_string()],
            low_grade: vec!["EDEMA".to_string()],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file, if present, and the environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH, false)
    }

    /// Load configuration from a specific path layered under `TUMOR_GRADE__*`
    /// environment variables
    pub fn load_from_path<P: AsRef<Path>>(path: P, required: bool) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(required))
            .add_source(Environment::with_prefix("TUMOR_GRADE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.preprocessing.target_size > 0,
            "preprocessing.target_size must be positive"
        );
        ensure!(
            !self.segmentation.labels.is_empty(),
            "segmentation.labels must not be empty"
        );
        for label in self.grading.high_grade.iter().chain(&self.grading.low_grade) {
            ensure!(
                self.segmentation.labels.contains(label),
                "grading label '{label}' is not one of the segmentation labels"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.preprocessing.target_size, 128);
        assert_eq!(config.preprocessing.slice_index, 75);
        assert_eq!(config.preprocessing.orientation, Orientation::Axial);
        assert_eq!(config.segmentation.labels.len(), 4);
        assert_eq!(config.grading.low_grade, vec!["EDEMA".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tumor_grade.toml");
        fs::write(
            &path,
            "[preprocessing]\nslice_index = 60\ninterpolation = \"nearest\"\n\n[model]\npath = \"other.onnx\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path, true).unwrap();
        assert_eq!(config.preprocessing.slice_index, 60);
        assert_eq!(config.preprocessing.interpolation, Interpolation::Nearest);
        assert_eq!(config.preprocessing.target_size, 128);
        assert_eq!(config.model.path, PathBuf::from("other.onnx"));
        assert_eq!(config.grading.high_grade.len(), 2);
    }

    #[test]
    fn test_missing_optional_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load_from_path(dir.path().join("absent.toml"), false).is_ok());
        assert!(AppConfig::load_from_path(dir.path().join("absent.toml"), true).is_err());
    }

    #[test]
    fn test_rejects_unknown_grading_label() {
        let mut config = AppConfig::default();
        config.grading.low_grade.push("CALCIFICATION".to_string());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.preprocessing.target_size = 0;
        assert!(config.validate().is_err());
    }
}
