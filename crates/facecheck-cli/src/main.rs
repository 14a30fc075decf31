use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facecheck_core::{
    build_reference_collection, Comparator, FaceMeshProvider, FaceSignature, SignatureBuilder,
    SignatureOutcome, ThresholdMatcher, VerificationReport, Verifier,
};
use facecheck_media::{discover_videos, load_frame, load_reference_images};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(
    name = "facecheck",
    about = "Check that every face in a set of videos appears in the reference images"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify videos against reference images
    Verify {
        /// Directory of reference face images
        #[arg(short, long)]
        references: PathBuf,
        /// Directory with one sub-directory of frame images per video
        #[arg(short, long)]
        videos: PathBuf,
        /// Parallel video workers (overrides FACECHECK_WORKERS)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the face signature of one image
    Inspect {
        image: PathBuf,
    },
    /// Score two images against each other
    Compare {
        first: PathBuf,
        second: PathBuf,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load().context("loading configuration")?;

    match cli.command {
        Commands::Verify {
            references,
            videos,
            workers,
            json,
        } => {
            if let Some(n) = workers {
                config.workers = n;
                config.validate()?;
            }
            let report = run_verify(&config, &references, &videos)?;
            print_report(&report, json)?;
            Ok(if report.verdict() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Commands::Inspect { image } => {
            let mut builder = signature_builder(&config)?;
            let output = match signature_for(&mut builder, &config, &image)? {
                SignatureOutcome::Face(sig) => serde_json::json!({
                    "image": image.display().to_string(),
                    "face": true,
                    "landmarks": sig.landmarks.len(),
                    "scale": sig.landmarks.scale(),
                    "ratios": sig.ratios,
                }),
                SignatureOutcome::Skipped(reason) => serde_json::json!({
                    "image": image.display().to_string(),
                    "face": false,
                    "reason": format!("{reason:?}"),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Compare { first, second } => {
            let mut builder = signature_builder(&config)?;
            let a = require_face(&mut builder, &config, &first)?;
            let b = require_face(&mut builder, &config, &second)?;
            let score = config.comparator.score(&a, &b)?;
            let matched = score < config.threshold;
            println!(
                "score {score:.4} (threshold {}): {}",
                config.threshold,
                if matched { "same person" } else { "different person" }
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn signature_builder(config: &Config) -> Result<SignatureBuilder<FaceMeshProvider>> {
    let provider = FaceMeshProvider::load(&config.model_path_str(), config.min_face_confidence)?;
    Ok(SignatureBuilder::new(provider, config.anchors))
}

fn signature_for(
    builder: &mut SignatureBuilder<FaceMeshProvider>,
    config: &Config,
    path: &Path,
) -> Result<SignatureOutcome> {
    let frame = load_frame(path, config.resize())?;
    Ok(builder.build(&frame)?)
}

fn require_face(
    builder: &mut SignatureBuilder<FaceMeshProvider>,
    config: &Config,
    path: &Path,
) -> Result<FaceSignature> {
    match signature_for(builder, config, path)? {
        SignatureOutcome::Face(sig) => Ok(sig),
        SignatureOutcome::Skipped(reason) => bail!("no usable face in {}: {reason:?}", path.display()),
    }
}

fn run_verify(config: &Config, references_dir: &Path, videos_dir: &Path) -> Result<VerificationReport> {
    let size = config.resize();

    let images = load_reference_images(references_dir, size)
        .with_context(|| format!("loading reference images from {}", references_dir.display()))?;
    tracing::info!(count = images.len(), "reference images loaded");

    let videos = discover_videos(videos_dir, size)
        .with_context(|| format!("discovering videos in {}", videos_dir.display()))?;
    tracing::info!(count = videos.len(), "videos found");

    let mut builders = (0..config.workers)
        .map(|_| signature_builder(config))
        .collect::<Result<Vec<_>>>()?;

    let references = build_reference_collection(
        &mut builders[0],
        images.into_iter().map(|img| (img.label, img.frame)),
    )?;

    let verifier = Verifier::new(
        &references,
        ThresholdMatcher::new(config.comparator, config.threshold),
    );
    let inputs = videos.iter().map(|v| (v.id.clone(), v.frames()));

    let report = if builders.len() > 1 {
        verifier.run_parallel(&mut builders, inputs)?
    } else {
        verifier.run(&mut builders[0], inputs)?
    };
    Ok(report)
}

fn print_report(report: &VerificationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for video in &report.videos {
        println!(
            "{}: {} ({} frames, {} faces matched, {} without a face)",
            video.video,
            if video.passed { "ok" } else { "FAILED" },
            video.frames_examined,
            video.faces_matched,
            video.frames_skipped,
        );
    }

    match report.failure() {
        None => println!("MATCH: every face in the videos appears in the reference images"),
        Some(point) => {
            let score = point
                .best_score
                .map(|s| format!("{s:.4}"))
                .unwrap_or_else(|| "n/a, no reference faces".into());
            println!(
                "NOT MATCH: unknown face in {} at frame {} (best score {score})",
                point.video,
                point.frame_index + 1
            );
        }
    }
    Ok(())
}
