//! Neo RVC - command line voice conversion
//!
//! 1. Loads the YAML config (writing defaults on first run) and rebuilds the model catalog from the working directory
//! 2. Optionally downloads a model bundle (`--model_url`) or registers a local `.pth`
//! 3. Separates the first audio file and converts its vocal stem plus any further files
//!
//! Prints the converted file's path on success.

mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};

use cli::Args;
use neo_core::config::{default_config_path, load_config, load_or_init_config, NeoConfig};
use neo_core::engine::{PythonConverter, PythonRuntime, PythonSeparator};
use neo_core::fetch::{progress_bar, FetchProgress, RemoteBundleRequest};
use neo_core::registry::is_weight_file;
use neo_core::{ModelRegistry, Pipeline};

fn main() -> ExitCode {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse_legacy();

    match run(args) {
        Ok(output) => {
            println!("{}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<PathBuf> {
    // An explicit --config is only read; the default location is seeded on first run
    let mut config: NeoConfig = match &args.config {
        Some(path) => load_config(path),
        None => load_or_init_config(&default_config_path()),
    };
    config.apply_env_overrides();
    config.validate();

    let registry = Arc::new(ModelRegistry::new());
    registry
        .rescan_work_dir(&config.work_dir)
        .with_context(|| format!("Failed to scan working directory {:?}", config.work_dir))?;

    let runtime = PythonRuntime::from_config(&config.engine);
    let separator = Arc::new(PythonSeparator::new(
        runtime.clone(),
        config.work_dir.join("stems"),
    ));
    let converter = Arc::new(PythonConverter::new(runtime));
    let pipeline = Pipeline::new(config, registry, separator, converter)
        .context("Failed to prepare working directory")?;

    let model_name = register_model_source(&pipeline, &args)?;

    let output = pipeline.run(&model_name, &args.audio_files, &args.pitch_params())?;
    Ok(output)
}

/// Make `--model` resolvable: download `--model_url` or register a local
/// `.pth` path. Returns the catalog name to run with.
fn register_model_source(pipeline: &Pipeline, args: &Args) -> Result<String> {
    if let Some(url) = &args.model_url {
        let progress: FetchProgress = Box::new(|current, total| {
            eprint!("\r{}", progress_bar(current, total));
        });
        let entry = pipeline
            .acquire_model(&RemoteBundleRequest::new(url, &args.model), Some(progress))
            .with_context(|| format!("Failed to download model from {}", url))?;
        eprintln!();
        return Ok(entry.model_name);
    }

    let path = Path::new(&args.model);
    if is_weight_file(path) && path.is_file() {
        let entry = pipeline.registry().register_local(path, "")?;
        return Ok(entry.model_name);
    }

    Ok(args.model.clone())
}
