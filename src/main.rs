use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use facefind::{
    build_reference, config, storage, BatchRunner, Concurrency, MatchOptions, OnnxExtractor,
    ReferenceSet, ResultAggregator,
};
use log::{info, warn};

#[derive(Parser)]
#[command(name = "facefind")]
#[command(
    version,
    about = "Recognize known people in a batch of photos"
)]
struct Cli {
    /// Folder with one subfolder of photos per known person
    #[arg(long, alias = "known_people_folder", default_value = "people/")]
    known_people_folder: PathBuf,

    /// Image file, or folder of images, to check
    #[arg(long, alias = "image_to_check", default_value = "uk/")]
    image_to_check: PathBuf,

    /// Number of CPU cores to use in parallel. -1 means "use all in system"
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    cpus: i32,

    /// Tolerance for face comparisons (overrides the config file). Lower this if you get multiple matches for the same person
    #[arg(long)]
    tolerance: Option<f32>,

    /// Output face distance. Useful for tweaking the tolerance setting
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    show_distance: bool,

    /// Show the best distance per file once all images are checked (lower is better)
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    show_final: bool,

    /// Config file (defaults to the system config path)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reuse the reference set stored here, or build it and store it here
    #[arg(long)]
    reference_cache: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;
    let concurrency = Concurrency::from_cpus(cli.cpus)?;

    let options = MatchOptions {
        tolerance: cli.tolerance.unwrap_or(cfg.tolerance),
        metric: cfg.metric,
        max_dimension: cfg.max_dimension,
    };
    let make_extractor = || {
        OnnxExtractor::load(&cfg.detector_model, &cfg.encoder_model, cfg.detection())
            .context("Failed to initialize face recognition models")
    };

    let reference = known_people(
        &cli.known_people_folder,
        cli.reference_cache.as_deref(),
        make_extractor,
    )?;
    if reference.is_empty() {
        warn!("No usable reference images; every face will be reported as unknown");
    }

    let mut aggregator = ResultAggregator::new(io::stdout().lock(), cli.show_distance);
    let report = BatchRunner::new(&reference, options, concurrency).run(
        &cli.image_to_check,
        make_extractor,
        &mut aggregator,
    )?;

    if cli.show_final {
        aggregator.summarize()?;
    }

    if report.failed > 0 {
        warn!(
            "{} image(s) could not be processed, {} checked",
            report.failed, report.processed
        );
        if report.processed == 0 {
            anyhow::bail!("No images could be processed");
        }
    }

    Ok(())
}

fn known_people<F>(root: &Path, cache: Option<&Path>, make_extractor: F) -> Result<ReferenceSet>
where
    F: Fn() -> Result<OnnxExtractor>,
{
    if let Some(cache) = cache {
        if let Some(reference) = storage::load_reference(cache)? {
            info!(
                "Loaded {} reference face(s) from {}",
                reference.len(),
                cache.display()
            );
            return Ok(reference);
        }
    }

    let mut extractor = make_extractor()?;
    let build = build_reference(&mut extractor, root)
        .with_context(|| format!("Failed to scan known people in {}", root.display()))?;
    info!(
        "Indexed {} reference face(s), skipped {} image(s)",
        build.reference.len(),
        build.skipped.len()
    );

    if let Some(cache) = cache {
        storage::save_reference(cache, &build.reference).context("Failed to save reference cache")?;
        info!("Saved reference set to {}", cache.display());
    }

    Ok(build.reference)
}
