use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::process::ExitCode;
use stencil_core::Builder;
use crate::cmd::{Outcome, exit_interrupted, until_interrupted};
use crate::config::{DEFAULT_CONFIG_FILE, load_build_config};

pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("layout")
                .short('l')
                .long("layout")
                .value_name("FILE")
                .help("Layout file name inside <path>/layouts"),
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .value_name("DIR")
                .help("Source directory containing .hbs templates"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for generated pages"),
        )
        .arg(
            Arg::new("components")
                .long("components")
                .help("Also build every component as a standalone page")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("watch")
                .short('w')
                .long("watch")
                .help("Rebuild whenever a source file changes")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .default_value(DEFAULT_CONFIG_FILE),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build"))
        .about("Build HTML pages from templates")
}

pub async fn execute(args: &ArgMatches) -> Result<ExitCode> {
    // Load cascading configuration
    let stencil_config = load_build_config(args)?;
    let build_config = stencil_config.build_config()?;

    if build_config.watch {
        return super::watch::run(build_config).await;
    }

    let output_dir = build_config.output.clone();
    let mut builder = Builder::new(build_config).context("Invalid build configuration")?;

    let pass = tokio::task::spawn_blocking(move || builder.run_pass());

    let report = match until_interrupted(pass, tokio::signal::ctrl_c()).await {
        Outcome::Done(joined) => joined?.context("Build failed")?,
        Outcome::Interrupted => exit_interrupted(),
    };

    if !report.is_clean() {
        tracing::warn!(
            "{} of {} pages failed to build",
            report.failures.len(),
            report.failures.len() + report.pages.len()
        );
        return Ok(ExitCode::FAILURE);
    }

    tracing::info!("Site built successfully in {}", output_dir.display());

    Ok(ExitCode::SUCCESS)
}
