// src/main.rs

mod cli;
mod logging;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use cli::{Cli, Commands};
use drvpkg::{AssembleOptions, BuildConfig, Flavor, FlavorManifest, PackageAssembler, StepOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Log file name inside `<output>/log`
const LOG_FILE: &str = "drvpkg.log";

fn run(cli: Cli, log_file: &logging::DeferredLogFile) -> Result<()> {
    let now = Local::now();
    let (flavor, skip_driver_build) = match &cli.command {
        Commands::Driver { no_driver, .. } => (Flavor::Driver, *no_driver),
        Commands::Tool { .. } => (Flavor::Tool, false),
    };
    let common = cli.command.common();

    let config = match &common.config {
        Some(path) => BuildConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BuildConfig::new(),
    };

    let project_dir = common
        .project_dir
        .canonicalize()
        .with_context(|| format!("Project directory not found: {}", common.project_dir.display()))?;

    let output_dir = common.output_dir.clone().unwrap_or_else(|| {
        PathBuf::from("output").join(now.format("%Y-%m-%d_%H-%M-%S").to_string())
    });

    let mut options =
        AssembleOptions::new(&project_dir, output_dir, now.date_naive()).with_force(common.force);
    if let Some(release) = &common.pkg_release {
        options = options.with_release(release.clone());
    }

    let step_options = StepOptions {
        skip_version_generation: common.no_gen_version,
        skip_driver_build,
    };
    let manifest = FlavorManifest::for_flavor(flavor, &project_dir, step_options);

    let mut assembler = PackageAssembler::new(manifest, config, options);
    assembler.prepare_output()?;

    let log_path = assembler.options().log_dir().join(LOG_FILE);
    log_file
        .attach(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
    info!("Log file: {}", log_path.display());

    let output = assembler.run()?;
    info!(
        "Built {} {}: {}",
        output.descriptor.name(),
        output.descriptor.full_version(),
        output.package.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_file = logging::init(cli.command.common().verbose);

    match run(cli, &log_file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
