use anyhow::Result;
use clap::Command;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;
mod config;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stencil=info,stencil_core=info,stencil_watch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let matches = Command::new("stencil")
        .about("Build static HTML pages from Handlebars templates, components and a layout")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(cmd::build::make_subcommand())
        .subcommand(cmd::watch::make_subcommand())
        .get_matches();

    match matches.subcommand() {
        Some(("build", args)) => cmd::build::execute(args).await,
        Some(("watch", args)) => cmd::watch::execute(args).await,
        _ => Ok(ExitCode::FAILURE),
    }
}
