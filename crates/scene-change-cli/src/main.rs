// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, Subcommand};
use scene_change::{
    ChangeDetectionResults, ChangeDetector, ChangeSummary, Error, POINT_CLOUD_FILE,
    PipelineConfig, Progress, Reconstructor, change_points,
    loader::{ArkitDataset, LoaderKind},
    refine::{ChangeDetection3dResults, RefinementParams, Refiner, convert_result_2d_to_3d},
    write_ply,
};
use std::{
    path::{Path, PathBuf},
    sync::mpsc::{Sender, channel},
    thread,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scene Change Command
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Classify the detections of every before/after image pair as added,
    /// removed or unchanged.  Results are written to
    /// change_detection_result.json.
    Detect {
        /// Directory holding the before dataset and one after dataset
        #[clap(long, env = "SCENE_CHANGE_DATASETS")]
        datasets: PathBuf,

        /// Name of the before dataset directory
        #[clap(long, default_value = "before")]
        before_name: String,

        /// Detection loader
        #[clap(long, default_value = "yolo")]
        loader: LoaderKind,

        /// Output directory, defaults to the datasets directory
        #[clap(long)]
        output: Option<PathBuf>,
    },
    /// Unproject 2D change detection results into world space.  Results are
    /// written to change_detection_result_3d.json.
    Lift {
        /// Directory holding the before dataset and one after dataset
        #[clap(long, env = "SCENE_CHANGE_DATASETS")]
        datasets: PathBuf,

        /// 2D results, defaults to change_detection_result.json in the
        /// datasets directory
        #[clap(long)]
        results: Option<PathBuf>,

        /// Name of the before dataset directory
        #[clap(long, default_value = "before")]
        before_name: String,

        /// Depth and camera loader
        #[clap(long, default_value = "arkit-ue5")]
        loader: LoaderKind,

        /// Output directory, defaults to the datasets directory
        #[clap(long)]
        output: Option<PathBuf>,
    },
    /// Cluster 3D results per category and assign each cluster its majority
    /// change.  Results are written to
    /// refined_change_detection_result_3d.json.
    Refine {
        /// 3D results to refine
        #[clap(long)]
        input: PathBuf,

        /// Output directory
        #[clap(long)]
        output: PathBuf,

        /// Clustering neighborhood radius in world units
        #[clap(long, env = "SCENE_CHANGE_EPSILON", default_value_t = RefinementParams::default().epsilon)]
        epsilon: f64,

        /// Neighbors, self included, required for a core point
        #[clap(long, env = "SCENE_CHANGE_MIN_SAMPLES", default_value_t = RefinementParams::default().min_samples)]
        min_samples: usize,

        /// Also write the refined points, colored by change, to this PLY file
        #[clap(long)]
        ply: Option<PathBuf>,
    },
    /// Run detection, lifting and refinement from the pipeline configuration.
    Run {
        /// Configuration file, defaults to config.toml in the user
        /// configuration directory
        #[clap(long, env = "SCENE_CHANGE_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Print per-category counts of a results file.
    Summary {
        /// Results file
        path: PathBuf,

        /// The file holds 3D results
        #[clap(long = "3d")]
        three_d: bool,
    },
    /// Reconstruct the point cloud of an ARKit capture to check its depth
    /// maps and cameras.
    Reconstruct {
        /// ARKit dataset directory
        #[clap(long)]
        dataset: PathBuf,

        /// Output PLY file, defaults to point_cloud.ply in the dataset
        #[clap(long)]
        output: Option<PathBuf>,

        /// Maximum number of points per frame
        #[clap(long)]
        max_samples: Option<usize>,

        /// Keep only depth samples with at least this confidence (0 to 2)
        #[clap(long)]
        min_confidence: Option<u8>,
    },
}

/// Runs `f` with a progress channel drawn as a progress bar.
fn with_progress<T>(
    message: &'static str,
    f: impl FnOnce(&Sender<Progress>) -> Result<T, Error>,
) -> Result<T, Error> {
    use indicatif::{ProgressBar, ProgressStyle};

    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(
        "[{elapsed_precise} ETA: {eta}] {msg}: {wide_bar:.yellow} {human_pos}/{human_len}",
    ) {
        bar.set_style(style.progress_chars("█▇▆▅▄▃▂▁  "));
    }
    bar.set_message(message);

    let (tx, rx) = channel::<Progress>();
    let drawer = thread::spawn(move || {
        for progress in rx {
            if progress.total > 0 {
                bar.set_length(progress.total as u64);
                bar.set_position(progress.current as u64);
            }
        }
        bar.finish_and_clear();
    });

    let result = f(&tx);
    drop(tx);
    if drawer.join().is_err() {
        log::warn!("Progress display stopped unexpectedly");
    }
    result
}

fn handle_detect(
    datasets: PathBuf,
    before_name: String,
    loader: LoaderKind,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let source = loader.detection_source()?;
    let detector = ChangeDetector::new();
    let results = with_progress("Detecting", |tx| {
        detector.run_all(&datasets, source.as_ref(), &before_name, Some(tx))
    })?;

    let output = output.unwrap_or(datasets);
    detector.export(&results, &output)?;
    println!("{}", ChangeSummary::from_results_2d(&results));
    Ok(())
}

fn handle_lift(
    datasets: PathBuf,
    results: Option<PathBuf>,
    before_name: String,
    loader: LoaderKind,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let source = loader.geometry_source()?;
    let results_path =
        results.unwrap_or_else(|| datasets.join(scene_change::RESULT_FILE));
    let results = ChangeDetectionResults::read(&results_path)?;

    let results_3d = with_progress("Lifting", |tx| {
        convert_result_2d_to_3d(&datasets, &results, source.as_ref(), &before_name, Some(tx))
    })?;

    let output = output.unwrap_or(datasets);
    results_3d.export(&output, false)?;
    println!("{}", ChangeSummary::from_results_3d(&results_3d));
    Ok(())
}

fn handle_refine(
    input: PathBuf,
    output: PathBuf,
    params: RefinementParams,
    ply: Option<PathBuf>,
) -> Result<(), Error> {
    let refiner = Refiner::new(params)?;
    let results = ChangeDetection3dResults::read(&input)?;
    let (refined, _) = refiner.refine_and_export(&results, &output)?;

    if let Some(ply) = ply {
        write_ply(ply, &change_points(&refined))?;
    }
    println!("{}", ChangeSummary::from_results_3d(&refined));
    Ok(())
}

fn handle_run(config: Option<PathBuf>) -> Result<(), Error> {
    let config = PipelineConfig::load(config.as_deref())?;
    config.validate()?;

    let datasets = config.dataset.datasets_path.as_path();
    let before_name = config.dataset.before_name.as_str();
    let output = config.results_path();

    let detection = config.change_detection.loader.detection_source()?;
    let detector = ChangeDetector::new();
    let results = with_progress("Detecting", |tx| {
        detector.run_all(datasets, detection.as_ref(), before_name, Some(tx))
    })?;
    detector.export(&results, output)?;

    let geometry = config.refinement.loader.geometry_source()?;
    let results_3d = with_progress("Lifting", |tx| {
        convert_result_2d_to_3d(datasets, &results, geometry.as_ref(), before_name, Some(tx))
    })?;
    results_3d.export(output, false)?;

    let refiner = Refiner::new(config.refinement.params())?;
    let (refined, _) = refiner.refine_and_export(&results_3d, output)?;
    println!("{}", ChangeSummary::from_results_3d(&refined));
    Ok(())
}

fn handle_summary(path: &Path, three_d: bool) -> Result<(), Error> {
    let summary = if three_d {
        ChangeSummary::from_results_3d(&ChangeDetection3dResults::read(path)?)
    } else {
        ChangeSummary::from_results_2d(&ChangeDetectionResults::read(path)?)
    };
    print!("{}", summary);
    Ok(())
}

fn handle_reconstruct(
    dataset: PathBuf,
    output: Option<PathBuf>,
    max_samples: Option<usize>,
    min_confidence: Option<u8>,
) -> Result<(), Error> {
    let output = output.unwrap_or_else(|| dataset.join(POINT_CLOUD_FILE));
    let dataset = ArkitDataset::new(dataset);
    let points = with_progress("Reconstructing", |tx| {
        Reconstructor::new().reconstruct_dataset(&dataset, min_confidence, max_samples, Some(tx))
    })?;
    write_ply(&output, &points)?;
    println!("Wrote {} points to {}", points.len(), output.display());
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match args.cmd {
        Command::Detect {
            datasets,
            before_name,
            loader,
            output,
        } => handle_detect(datasets, before_name, loader, output),
        Command::Lift {
            datasets,
            results,
            before_name,
            loader,
            output,
        } => handle_lift(datasets, results, before_name, loader, output),
        Command::Refine {
            input,
            output,
            epsilon,
            min_samples,
            ply,
        } => handle_refine(
            input,
            output,
            RefinementParams {
                epsilon,
                min_samples,
            },
            ply,
        ),
        Command::Run { config } => handle_run(config),
        Command::Summary { path, three_d } => handle_summary(&path, three_d),
        Command::Reconstruct {
            dataset,
            output,
            max_samples,
            min_confidence,
        } => handle_reconstruct(dataset, output, max_samples, min_confidence),
    }
}
