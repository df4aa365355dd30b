use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use legseg::{DirectorySink, SegmentError, SegmentationConfig, Segmenter, Stage};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Segment(#[from] SegmentError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Unsupported output format `{0}`")]
    UnsupportedFormat(String),
    #[error("Input directory does not exist: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("{} is not inside {}", .path.display(), .root.display())]
    OutsideInput { path: PathBuf, root: PathBuf },
    #[error("{} and {} would both be written to {}", .first.display(), .path.display(), .output.display())]
    OutputCollision { path: PathBuf, first: PathBuf, output: PathBuf },
    #[error("{failed} of {total} images failed")]
    BatchIncomplete { failed: usize, total: usize },
}

/// Counts for one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: Vec<PathBuf>,
    pub by_stage: BTreeMap<Stage, usize>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.processed + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Error to surface when at least one image failed
    pub fn into_result(self) -> Result<Self, CliError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(CliError::BatchIncomplete {
                failed: self.failed.len(),
                total: self.total(),
            })
        }
    }

    fn record(&mut self, path: PathBuf, outcome: Result<Stage, CliError>) {
        match outcome {
            Ok(stage) => {
                self.processed += 1;
                *self.by_stage.entry(stage).or_default() += 1;
            }
            Err(e) => {
                error!("Failed to segment {}: {e}", path.display());
                self.failed.push(path);
            }
        }
    }
}

/// Load the configuration file if one was given, otherwise use the defaults
pub fn load_config(path: Option<&Path>) -> Result<SegmentationConfig, CliError> {
    let config = match path {
        Some(path) => SegmentationConfig::from_file(path)?,
        None => SegmentationConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Resolve a file extension to a writable image format
pub fn output_format(extension: &str) -> Result<ImageFormat, CliError> {
    ImageFormat::from_extension(extension)
        .filter(|format| format.writing_enabled())
        .ok_or_else(|| CliError::UnsupportedFormat(extension.to_string()))
}

pub fn is_supported_image(path: &Path) -> bool {
    ImageFormat::from_path(path).is_ok_and(|format| format.reading_enabled())
}

/// All decodable images below `dir`, in a stable order
pub fn collect_images(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_supported_image(e.path()))
        .map(|e| e.into_path())
        .collect();
    paths.sort();
    paths
}

/// Mirror `path` from `input_root` into `output_root` with a new extension
pub fn output_path_for(
    path: &Path,
    input_root: &Path,
    output_root: &Path,
    extension: &str,
) -> Result<PathBuf, CliError> {
    let relative = path.strip_prefix(input_root).map_err(|_| CliError::OutsideInput {
        path: path.to_path_buf(),
        root: input_root.to_path_buf(),
    })?;
    Ok(output_root.join(relative).with_extension(extension))
}

/// Output path for every input. Inputs that differ only by extension would
/// share an output; the first one in path order keeps it and the rest fail
/// with [`CliError::OutputCollision`].
pub fn plan_outputs(
    paths: Vec<PathBuf>,
    input_root: &Path,
    output_root: &Path,
    extension: &str,
) -> Vec<(PathBuf, Result<PathBuf, CliError>)> {
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    paths
        .into_iter()
        .map(|path| {
            let output = output_path_for(&path, input_root, output_root, extension).and_then(
                |output| match claimed.get(&output) {
                    Some(first) => Err(CliError::OutputCollision {
                        path: path.clone(),
                        first: first.clone(),
                        output,
                    }),
                    None => {
                        claimed.insert(output.clone(), path.clone());
                        Ok(output)
                    }
                },
            );
            (path, output)
        })
        .collect()
}

/// Segment one file and write the result, returning the stage that produced it.
///
/// With `diagnostics` set, every artifact is written to that directory as
/// `<stem>_<kind>.png`.
pub fn segment_and_save(
    segmenter: &Segmenter,
    input: &Path,
    output: &Path,
    diagnostics: Option<&Path>,
) -> Result<Stage, CliError> {
    let image = image::open(input)?.to_rgb8();
    let segmentation = match diagnostics {
        Some(dir) => {
            let mut sink = DirectorySink::for_input(dir, input);
            segmenter.segment_with_sink(&image, &mut sink)?
        }
        None => segmenter.segment(&image, false)?,
    };

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    segmentation.image.save(output)?;
    info!(
        stage = %segmentation.stage,
        "Saved {} -> {}",
        input.display(),
        output.display()
    );
    Ok(segmentation.stage)
}

/// Segment every image below `input_dir` in parallel on the current rayon pool.
///
/// A failing file is logged and counted; it never stops the batch.
pub fn run_batch(
    segmenter: &Segmenter,
    input_dir: &Path,
    output_dir: &Path,
    extension: &str,
) -> Result<BatchSummary, CliError> {
    if !input_dir.is_dir() {
        return Err(CliError::MissingInput(input_dir.to_path_buf()));
    }
    output_format(extension)?;

    let paths = collect_images(input_dir);
    info!("Found {} images in {}", paths.len(), input_dir.display());

    let jobs = plan_outputs(paths, input_dir, output_dir, extension);
    let outcomes: Vec<(PathBuf, Result<Stage, CliError>)> = jobs
        .into_par_iter()
        .map(|(path, output)| {
            let outcome =
                output.and_then(|output| segment_and_save(segmenter, &path, &output, None));
            (path, outcome)
        })
        .collect();

    let mut summary = BatchSummary::default();
    for (path, outcome) in outcomes {
        summary.record(path, outcome);
    }
    Ok(summary)
}
