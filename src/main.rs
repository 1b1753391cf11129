//! Command-line front end: grade one Flair/T1ce scan pair.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tumor_grade::{AppConfig, OnnxSegmenter, Pipeline, config::LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "tumor-grade", version, about = "Grade a brain MRI scan pair for tumor presence")]
struct Cli {
    /// Flair volume (.nii, .nii.gz or a DICOM series directory)
    #[arg(long)]
    flair: PathBuf,

    /// T1ce volume (.nii, .nii.gz or a DICOM series directory)
    #[arg(long)]
    t1ce: PathBuf,

    /// Configuration file
    #[arg(short, long, env = "TUMOR_GRADE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the segmentation model path
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Override the slice index
    #[arg(short = 's', long)]
    slice_index: Option<usize>,

    /// Print the full diagnosis as JSON
    #[arg(long)]
    json: bool,

    /// Write the per-pixel label map as JSON
    #[arg(long)]
    labels_out: Option<PathBuf>,

    /// Write a colourised segmentation PNG
    #[arg(long)]
    overlay: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // No subscriber exists until the configuration is read.
    let config = load_config(&cli)?;
    init_tracing(&config.logging)?;
    grade(&cli, &config).inspect_err(|e| error!(error = %format!("{e:#}"), "Grading failed"))
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_path(path, true)?,
        None => AppConfig::load()?,
    };
    if let Some(model) = &cli.model {
        config.model.path = model.clone();
    }
    if let Some(slice_index) = cli.slice_index {
        config.preprocessing.slice_index = slice_index;
    }
    Ok(config)
}

fn grade(cli: &Cli, config: &AppConfig) -> Result<()> {
    info!(
        slice_index = config.preprocessing.slice_index,
        target_size = config.preprocessing.target_size,
        "Configuration loaded"
    );

    // A missing model is fatal before any input is touched.
    let model = OnnxSegmenter::load(
        &config.model.path,
        config.model.input_name.as_deref(),
        config.model.output_name.as_deref(),
        config.model.intra_threads,
    )?;
    let pipeline = Pipeline::new(config, Arc::new(model));

    let diagnosis = pipeline.diagnose_files(&cli.flair, &cli.t1ce)?;

    if let Some(path) = &cli.labels_out {
        let json = diagnosis.label_map.to_json()?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Label map written");
    }
    if let Some(path) = &cli.overlay {
        diagnosis
            .class_map
            .to_image()
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Segmentation overlay written");
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&diagnosis)?);
    } else {
        println!("Tumor grade: {}", diagnosis.verdict);
    }
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("tumor_grade={}", logging.level)))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
