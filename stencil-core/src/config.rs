use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};
use crate::scanner::COMPONENTS_DIR;
use crate::output::ensure_dir;

/// What a build pass reads and where it writes. Read-only for the duration
/// of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// File name of the layout under `<source>/layouts`.
    pub layout: String,
    pub watch: bool,
    /// Also render every component as its own page under `<output>/components`.
    pub build_components: bool,
    pub source: PathBuf,
    pub output: PathBuf,
}

impl BuildConfig {
    pub fn new<S, P, O>(layout: S, source: P, output: O) -> Self
    where
        S: Into<String>,
        P: AsRef<Path>,
        O: AsRef<Path>,
    {
        Self {
            layout: layout.into(),
            watch: false,
            build_components: false,
            source: source.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
        }
    }

    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn build_components(mut self, build_components: bool) -> Self {
        self.build_components = build_components;
        self
    }

    /// Check the configuration and create the output directories.
    ///
    /// Nothing is deleted or written here, so a bad configuration never
    /// touches existing output.
    pub fn prepare(&self) -> Result<()> {
        if self.layout.trim().is_empty() {
            return Err(BuildError::Config("a layout file name is required".into()));
        }

        if !self.source.is_dir() {
            return Err(BuildError::Config(format!(
                "source directory {} does not exist",
                self.source.display()
            )));
        }

        if self.output.exists() && same_dir(&self.source, &self.output) {
            return Err(BuildError::Config(format!(
                "output directory {} must be different from the source directory",
                self.output.display()
            )));
        }

        if self.output.exists() && !self.output.is_dir() {
            return Err(BuildError::Config(format!(
                "output path {} is not a directory",
                self.output.display()
            )));
        }

        ensure_dir(&self.output)?;
        if self.build_components {
            ensure_dir(&self.output.join(COMPONENTS_DIR))?;
        }

        Ok(())
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
