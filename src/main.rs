use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use storyprep::extract::{BatchExtractor, InputTable};
use storyprep::segment::{load_metadata, Segmenter};
use storyprep::{ExtractionConfig, SegmentConfig};

/// storyprep - prepare labelled story audio for classification
///
/// Cuts source recordings into fixed-length segments and extracts
/// spectral and voice-quality feature vectors from them.
#[derive(Parser, Debug)]
#[command(name = "storyprep")]
#[command(version = "0.1.0")]
#[command(about = "Audio segmentation and feature extraction for story classification", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split source recordings into fixed-duration WAV segments.
    Segment(SegmentArgs),
    /// Extract feature vectors for every row of a path table.
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct SegmentArgs {
    /// JSON array of {filename, Language, Story_type} records
    #[arg(long, value_name = "PATH")]
    metadata: PathBuf,

    /// Directory containing the source recordings
    #[arg(long, value_name = "DIR")]
    input_dir: PathBuf,

    /// Directory the segment files are written to (created if absent)
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Segment length in seconds
    #[arg(long, default_value_t = storyprep::config::DEFAULT_SEGMENT_DURATION)]
    segment_duration: u32,

    /// Where to write the segment metadata (JSON array)
    #[arg(long, value_name = "PATH")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// JSON array of records holding at least the path column
    #[arg(long, value_name = "PATH")]
    table: PathBuf,

    /// Where to write the feature table (JSON array)
    #[arg(long, value_name = "PATH")]
    out: PathBuf,

    /// JSON extraction config; command-line flags override it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Column holding the audio path
    #[arg(long)]
    path_column: Option<String>,

    /// Number of cepstral coefficients
    #[arg(long)]
    n_mfcc: Option<usize>,

    /// Add time-stretched, pitch-shifted and noisy variants
    #[arg(long)]
    augment: bool,

    /// Seed for the noise variant
    #[arg(long)]
    seed: Option<u64>,
}

impl ExtractArgs {
    fn extraction_config(&self) -> Result<ExtractionConfig> {
        let mut config = match &self.config {
            Some(path) => ExtractionConfig::from_file(path)?,
            None => ExtractionConfig::default(),
        };
        if let Some(column) = &self.path_column {
            config.path_column = column.clone();
        }
        if let Some(n_mfcc) = self.n_mfcc {
            config.n_mfcc = n_mfcc;
        }
        config.augment |= self.augment;
        if self.seed.is_some() {
            config.noise_seed = self.seed;
        }
        config.validate().context("Invalid extraction settings")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Segment(args) => run_segment(&args),
        Command::Extract(args) => run_extract(&args),
    }
}

fn run_segment(args: &SegmentArgs) -> Result<()> {
    let rows = load_metadata(&args.metadata)?;
    let config = SegmentConfig::new(&args.input_dir, &args.output_dir)
        .with_segment_duration(args.segment_duration);
    let segments = Segmenter::new(config).run(&rows)?;
    write_json(&args.out, &segments)?;
    println!(
        "Wrote {} segments from {} source files to {:?}",
        segments.len(),
        rows.len(),
        args.output_dir
    );
    Ok(())
}

fn run_extract(args: &ExtractArgs) -> Result<()> {
    let config = args.extraction_config()?;
    let table = InputTable::from_json_file(&args.table)?;
    let features = BatchExtractor::new(&config)?.run(&table)?;
    features.write_json(&args.out)?;
    println!(
        "Wrote {} feature rows ({} columns, {} rows skipped) to {:?}",
        features.len(),
        features.column_names().len(),
        features.diagnostics().len(),
        args.out
    );
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))
}
