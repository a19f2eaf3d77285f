//! Command-line front end for the datum transformer.
//!
//! - Transform a directory of images with a TOML transformation config
//! - Compute a mean file from a directory of same-sized images
//! - Inspect an existing mean file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use datum_core::{load_transform_config, setup_cli_logging, ColorMode, Phase, Record};
use datum_transform::{
    compute_mean, load_mean_reference, FileMeanLoader, RecordLoader, TensorStatistics, Transformer,
};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "datum-tool")]
#[command(about = "Crop, mirror and normalize image records", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform every image in a directory into one batch tensor
    Transform {
        /// Directory containing images
        #[arg(short, long)]
        input_dir: PathBuf,

        /// TOML file with transformation parameters
        #[arg(short, long)]
        config: PathBuf,

        /// Pipeline phase (train or test)
        #[arg(short, long, default_value = "test")]
        phase: Phase,

        /// Random seed for training-phase crops and mirroring
        #[arg(long)]
        seed: Option<u64>,

        /// Write the flat tensor and its shape as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compute a mean file from a directory of same-sized images
    ComputeMean {
        /// Directory containing images
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Output mean file (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Convert images to grayscale before averaging
        #[arg(long)]
        gray: bool,
    },

    /// Print the shape and channel averages of a mean file
    InspectMean {
        /// Mean file (JSON or image)
        #[arg(short, long)]
        mean_file: PathBuf,
    },
}

#[derive(Serialize)]
struct TensorDump {
    shape: [usize; 4],
    labels: Vec<Option<i64>>,
    data: Vec<f32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_cli_logging(cli.verbose)?;

    match cli.command {
        Commands::Transform {
            input_dir,
            config,
            phase,
            seed,
            output,
        } => transform_directory(&input_dir, &config, phase, seed, output.as_deref())?,

        Commands::ComputeMean {
            input_dir,
            output,
            gray,
        } => compute_mean_file(&input_dir, &output, gray)?,

        Commands::InspectMean { mean_file } => inspect_mean(&mean_file)?,
    }

    Ok(())
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    Ok(pb)
}

/// Decodes every image in `dir` in parallel; any undecodable file fails the run
fn load_records(dir: &Path, color_mode: ColorMode) -> Result<Vec<Record>> {
    let loader = RecordLoader::new(dir, color_mode);
    let paths = loader
        .scan_directory(Path::new(""))
        .context("Failed to scan input directory")?;

    if paths.is_empty() {
        bail!("No images found in {}", dir.display());
    }
    info!("Found {} images in {}", paths.len(), dir.display());

    let pb = progress_bar(paths.len())?;
    let records = paths
        .par_iter()
        .map(|path| {
            let result = loader
                .load_record(path, None)
                .with_context(|| format!("Failed to decode {}", path.display()));
            pb.inc(1);
            result
        })
        .collect::<Result<Vec<Record>>>();
    pb.finish_and_clear();

    records
}

/// Transforms `records` into one flat buffer of consecutive slots.
///
/// Records must share one output shape; a mismatch fails before any write.
fn transform_records(
    transformer: &mut Transformer,
    records: &[Record],
) -> Result<(Vec<f32>, [usize; 3])> {
    let first = records.first().context("No records to transform")?;
    let [channels, height, width] = transformer.infer_shape(first)?;

    let mut data = vec![0.0f32; records.len() * channels * height * width];
    transformer
        .transform_batch(records, &mut data)
        .context("Failed to transform records")?;

    Ok((data, [channels, height, width]))
}

fn transform_directory(
    input_dir: &Path,
    config_path: &Path,
    phase: Phase,
    seed: Option<u64>,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_transform_config(config_path)
        .with_context(|| format!("Invalid config {}", config_path.display()))?;

    let color_mode = config.color_mode();
    let mut transformer = Transformer::with_loader(config, phase, &FileMeanLoader)
        .context("Failed to build transformer")?;
    let records = load_records(input_dir, color_mode)?;
    if let Some(seed) = seed {
        transformer = transformer.with_seed(seed);
    }

    let (data, [channels, height, width]) = transform_records(&mut transformer, &records)?;

    let stats = TensorStatistics::from_batch(&data, [channels, height, width])?;
    info!(
        "Transformed {} records into [{}, {}, {}, {}]",
        stats.num_items, stats.num_items, channels, height, width
    );
    for c in 0..channels {
        info!(
            "  channel {}: mean {:.4}, min {:.4}, max {:.4}",
            c, stats.channel_mean[c], stats.channel_min[c], stats.channel_max[c]
        );
    }

    if let Some(output) = output {
        let dump = TensorDump {
            shape: [records.len(), channels, height, width],
            labels: records.iter().map(Record::label).collect(),
            data,
        };
        fs::write(output, serde_json::to_vec(&dump)?)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Wrote tensor to {}", output.display());
    }

    Ok(())
}

fn compute_mean_file(input_dir: &Path, output: &Path, gray: bool) -> Result<()> {
    let color_mode = if gray { ColorMode::Gray } else { ColorMode::Color };
    let records = load_records(input_dir, color_mode)?;

    let mean = compute_mean(&records).context("Failed to compute mean")?;
    mean.save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Wrote mean of {} images with shape {:?} to {}",
        records.len(),
        mean.shape(),
        output.display()
    );
    Ok(())
}

fn inspect_mean(path: &Path) -> Result<()> {
    let mean = load_mean_reference(path)
        .with_context(|| format!("Failed to load mean file {}", path.display()))?;

    println!("shape: {:?}", mean.shape());
    for (c, value) in mean.channel_means().iter().enumerate() {
        println!("channel {}: {:.4}", c, value);
    }
    Ok(())
}
