use anyhow::{Context, Result};
use clap::{ArgMatches, Command};
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use stencil_core::{BuildConfig, BuildError, BuildReport, Builder};
use stencil_watch::WatchController;
use tokio::sync::mpsc;
use crate::cmd::build::add_build_args;
use crate::cmd::{Outcome, exit_interrupted, until_interrupted};
use crate::config::load_build_config;

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("watch"))
        .about("Build HTML pages and rebuild them whenever a source file changes")
}

pub async fn execute(args: &ArgMatches) -> Result<ExitCode> {
    let stencil_config = load_build_config(args)?;
    let build_config = stencil_config.build_config()?.watch(true);

    run(build_config).await
}

/// Sending half of the rebuild queue. At most one rebuild is ever pending.
#[derive(Clone)]
pub struct RebuildTrigger {
    tx: mpsc::Sender<Vec<PathBuf>>,
}

impl RebuildTrigger {
    /// Queue a rebuild for `paths`. Returns `false` when a rebuild is already
    /// pending; that one will pick up these changes too.
    pub fn request(&self, paths: Vec<PathBuf>) -> bool {
        self.tx.try_send(paths).is_ok()
    }
}

pub fn rebuild_queue() -> (RebuildTrigger, mpsc::Receiver<Vec<PathBuf>>) {
    let (tx, rx) = mpsc::channel(1);
    (RebuildTrigger { tx }, rx)
}

/// Build once, then rebuild on every change until interrupted.
pub async fn run(config: BuildConfig) -> Result<ExitCode> {
    let source_dir = config.source.clone();
    let ignore = vec![config.output.clone()];
    let builder = Builder::new(config).context("Invalid build configuration")?;

    let (trigger, rx) = rebuild_queue();
    let mut watcher = WatchController::new();
    watcher.enable(&source_dir, &ignore, move |paths| {
        for path in &paths {
            tracing::debug!("Source file changed: {}", path.display());
        }
        trigger.request(paths);
    })?;

    let outcome = rebuild_loop(builder, rx, tokio::signal::ctrl_c()).await;
    watcher.disable();

    match outcome? {
        Outcome::Done(_) => Ok(ExitCode::SUCCESS),
        Outcome::Interrupted => exit_interrupted(),
    }
}

/// Run a pass, then one more per queued trigger, until the queue closes or
/// `interrupt` fires. Passes never overlap, and a failed pass is logged
/// without ending the loop. Returns the number of passes run.
pub async fn rebuild_loop<I>(
    mut builder: Builder,
    mut rx: mpsc::Receiver<Vec<PathBuf>>,
    interrupt: I,
) -> Result<Outcome<usize>>
where
    I: Future,
{
    let mut interrupt = std::pin::pin!(interrupt);
    let mut passes = 0;

    loop {
        let pass = tokio::task::spawn_blocking(move || {
            let result = builder.run_pass();
            (builder, result)
        });

        let (returned, result) = match until_interrupted(pass, &mut interrupt).await {
            Outcome::Done(joined) => joined?,
            Outcome::Interrupted => return Ok(Outcome::Interrupted),
        };
        builder = returned;
        passes += 1;
        log_pass(&result);

        tracing::info!("Watching source files for changes...");
        match until_interrupted(rx.recv(), &mut interrupt).await {
            Outcome::Done(Some(paths)) => {
                tracing::info!("{} file(s) changed, rebuilding", paths.len())
            }
            Outcome::Done(None) => break,
            Outcome::Interrupted => return Ok(Outcome::Interrupted),
        }
    }

    Ok(Outcome::Done(passes))
}

fn log_pass(result: &Result<BuildReport, BuildError>) {
    match result {
        Ok(report) if report.is_clean() => tracing::info!("Site rebuilt successfully"),
        Ok(report) => tracing::warn!(
            "Site rebuilt with {} failed page(s)",
            report.failures.len()
        ),
        Err(e) => tracing::error!("Build error: {e}"),
    }
}
