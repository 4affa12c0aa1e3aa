//! Rebuild triggers from filesystem changes.
//!
//! A [`WatchSession`] owns one debounced, recursive watcher over a source
//! tree and calls back with the changed paths. Dropping the session stops
//! the watcher. [`WatchController`] holds at most one session and always
//! stops the running one before starting another.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use thiserror::Error;

pub const DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Cannot watch {}: path does not exist", .0.display())]
    MissingRoot(PathBuf),

    #[error("Failed to watch {}: {source}", path.display())]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// An active watcher. Stops on [`WatchSession::stop`] or drop.
pub struct WatchSession {
    root: PathBuf,
    debouncer: Option<Debouncer<RecommendedWatcher>>,
}

impl WatchSession {
    /// Watch `root` recursively and call `on_change` with every batch of
    /// changed paths. Paths under any of `ignore`, and editor temp files, are
    /// dropped before `on_change` sees them; a batch left empty is skipped.
    pub fn start<F>(root: &Path, ignore: &[PathBuf], mut on_change: F) -> Result<Self, WatchError>
    where
        F: FnMut(Vec<PathBuf>) + Send + 'static,
    {
        let root = root
            .canonicalize()
            .map_err(|_| WatchError::MissingRoot(root.to_path_buf()))?;
        let ignore: Vec<PathBuf> = ignore
            .iter()
            .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
            .collect();

        let mut debouncer = new_debouncer(
            Duration::from_millis(DEBOUNCE_MS),
            move |res: DebounceEventResult| match res {
                Ok(events) => {
                    let paths = relevant_paths(events.into_iter().map(|e| e.path), &ignore);
                    if !paths.is_empty() {
                        on_change(paths);
                    }
                }
                Err(e) => tracing::warn!("watch error: {e:?}"),
            },
        )
        .map_err(|source| WatchError::Notify {
            path: root.clone(),
            source,
        })?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Notify {
                path: root.clone(),
                source,
            })?;

        tracing::info!("Watching {}", root.display());

        Ok(Self {
            root,
            debouncer: Some(debouncer),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        self.debouncer.is_some()
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(mut debouncer) = self.debouncer.take() {
            if let Err(e) = debouncer.watcher().unwatch(&self.root) {
                tracing::debug!("unwatch {}: {e}", self.root.display());
            }
            drop(debouncer);
            tracing::info!("Stopped watching {}", self.root.display());
        }
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Holds at most one live [`WatchSession`].
#[derive(Default)]
pub struct WatchController {
    session: Option<WatchSession>,
}

impl WatchController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching `root`, stopping any session that is already running.
    pub fn enable<F>(&mut self, root: &Path, ignore: &[PathBuf], on_change: F) -> Result<(), WatchError>
    where
        F: FnMut(Vec<PathBuf>) + Send + 'static,
    {
        self.disable();
        self.session = Some(WatchSession::start(root, ignore, on_change)?);
        Ok(())
    }

    pub fn disable(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(WatchSession::is_running)
    }

    pub fn root(&self) -> Option<&Path> {
        self.session.as_ref().map(WatchSession::root)
    }
}

/// Editor swap and backup files, and dotfiles.
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

fn relevant_paths<I>(paths: I, ignore: &[PathBuf]) -> Vec<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut relevant: Vec<PathBuf> = paths
        .into_iter()
        .filter(|p| !is_temp_file(p))
        .filter(|p| !ignore.iter().any(|dir| p.starts_with(dir)))
        .collect();
    relevant.sort();
    relevant.dedup();
    relevant
}
