use clap::{Parser, Subcommand};
use color_eyre::eyre::{ensure, Result};
use legseg::{SegmentationConfig, Segmenter};
use legseg_cli::{load_config, run_batch, segment_and_save};
use rayon::ThreadPoolBuilder;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment a single image
    Segment {
        /// Path to the input image
        #[arg(short, long)]
        input: PathBuf,
        /// Path of the segmented image (format follows the extension)
        #[arg(short, long)]
        output: PathBuf,
        /// TOML or JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory for intermediate masks and the overview panel
        #[arg(long)]
        diagnostics: Option<PathBuf>,
    },
    /// Segment every image below a directory
    Batch {
        /// Input directory, walked recursively
        #[arg(short, long)]
        input_dir: PathBuf,
        /// Output directory, mirrors the input layout
        #[arg(short, long)]
        output_dir: PathBuf,
        /// TOML or JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output image format
        #[arg(short, long, default_value_t = String::from("png"))]
        format: String,
        /// Worker threads (defaults to one per core)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Print the JSON schema of the configuration file
    Schema,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Segment { input, output, config, diagnostics } => {
            segment_one(input, output, config.as_deref(), diagnostics.as_deref())?;
        }
        Commands::Batch { input_dir, output_dir, config, format, jobs } => {
            batch(input_dir, output_dir, config.as_deref(), format, *jobs)?;
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&SegmentationConfig::schema())?);
        }
    }

    Ok(())
}

fn segment_one(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    diagnostics: Option<&Path>,
) -> Result<()> {
    ensure!(input.exists(), "Input image does not exist: {}", input.display());

    let segmenter = Segmenter::new(load_config(config)?)?;
    let stage = segment_and_save(&segmenter, input, output, diagnostics)?;
    info!("✅ Segmented with {stage}");
    Ok(())
}

fn batch(
    input_dir: &Path,
    output_dir: &Path,
    config: Option<&Path>,
    format: &str,
    jobs: Option<usize>,
) -> Result<()> {
    if let Some(jobs) = jobs {
        ensure!(jobs > 0, "--jobs must be at least 1");
        ThreadPoolBuilder::new().num_threads(jobs).build_global()?;
    }

    let segmenter = Segmenter::new(load_config(config)?)?;
    let summary = run_batch(&segmenter, input_dir, output_dir, format)?;

    info!(
        "Processed {} of {} images ({} failed)",
        summary.processed,
        summary.total(),
        summary.failed.len()
    );
    for (stage, count) in &summary.by_stage {
        info!("  {stage}: {count}");
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);

    summary.into_result()?;
    Ok(())
}
