//! The build pass.
//!
//! Every pass runs the same stages in order, and each stage finishes before
//! the next begins:
//!
//! 1. discover the layout, templates and components, and compile the layout
//! 2. clean pages generated by earlier passes
//! 3. rebuild the fragment registry from the component files
//! 4. render every page into the layout and write it
//!
//! Failures in stage 1 abort the pass before any output is touched. A failure
//! while building one page is recorded in the [`BuildReport`] and the pass
//! moves on to the next page.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::compiler::{Compiler, Layout};
use crate::config::BuildConfig;
use crate::document::TemplateDocument;
use crate::error::{BuildError, Result};
use crate::fragments::FragmentRegistry;
use crate::output::{clean_output, write_page};
use crate::scanner::{SiteScanner, SourceFile};

/// A page (or fragment) that could not be built.
#[derive(Debug)]
pub struct PageFailure {
    pub source: PathBuf,
    pub error: BuildError,
}

/// What one pass produced.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Pages written, in build order.
    pub pages: Vec<PathBuf>,
    /// Stale pages removed before rendering.
    pub removed: usize,
    pub failures: Vec<PageFailure>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Builder {
    config: BuildConfig,
    scanner: SiteScanner,
    registry: FragmentRegistry,
    compiler: Compiler,
}

impl Builder {
    /// Validate `config` and set up the output directories.
    pub fn new(config: BuildConfig) -> Result<Self> {
        Self::with_compiler(config, Compiler::new())
    }

    pub fn with_compiler(config: BuildConfig, compiler: Compiler) -> Result<Self> {
        config.prepare()?;

        Ok(Self {
            scanner: SiteScanner::new(&config.source),
            config,
            registry: FragmentRegistry::new(),
            compiler,
        })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn registry(&self) -> &FragmentRegistry {
        &self.registry
    }

    /// Run one full pass over the source tree.
    ///
    /// Returns `Err` only when the pass as a whole cannot proceed: bad
    /// configuration, an unreadable or broken layout, a failure while
    /// cleaning, or an unreadable component.
    pub fn run_pass(&mut self) -> Result<BuildReport> {
        let started = Instant::now();
        tracing::info!(source = %self.config.source.display(), "building");

        // The output directory may have been removed since the last pass.
        self.config.prepare()?;
        let discovery = self.scanner.scan(&self.config.layout)?;
        let layout = self.load_layout(&discovery.layout)?;

        let removed = clean_output(&self.config.output)?;

        self.registry.reset(&discovery.components)?;
        let mut report = BuildReport {
            removed,
            ..Default::default()
        };

        for error in self.compiler.load_fragments(&self.registry) {
            let source = fragment_source(&discovery.components, &error);
            tracing::warn!(fragment = %source.display(), "{error}");
            report.failures.push(PageFailure { source, error });
        }

        let components: &[SourceFile] = if self.config.build_components {
            &discovery.components
        } else {
            &[]
        };

        for file in discovery.templates.iter().chain(components) {
            match self.build_page(file, &layout) {
                Ok(out_path) => {
                    tracing::info!("Updated template: {}", file.file_name());
                    report.pages.push(out_path);
                }
                Err(error) => {
                    tracing::warn!(template = %file.path.display(), "{error}");
                    report.failures.push(PageFailure {
                        source: file.path.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            pages = report.pages.len(),
            failed = report.failures.len(),
            removed = report.removed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "build finished"
        );

        Ok(report)
    }

    fn load_layout(&self, path: &Path) -> Result<Layout> {
        let raw = std::fs::read_to_string(path).map_err(|e| BuildError::read(path, e))?;
        self.compiler.compile_layout(&self.config.layout, &raw)
    }

    fn build_page(&self, file: &SourceFile, layout: &Layout) -> Result<PathBuf> {
        let doc = TemplateDocument::parse(&file.path)?;
        let body = self.compiler.render_document(&file.file_name(), &doc)?;
        let html = layout.wrap(&self.compiler, &body)?;

        let out_path = file.out_path(&self.config.output);
        write_page(&out_path, &html)?;

        Ok(out_path)
    }
}

/// Run a single pass with a fresh builder.
pub fn build_site(config: BuildConfig) -> Result<BuildReport> {
    Builder::new(config)?.run_pass()
}

fn fragment_source(components: &[SourceFile], error: &BuildError) -> PathBuf {
    let name = match error {
        BuildError::Compile { name, .. } => name.as_str(),
        _ => "",
    };

    components
        .iter()
        .rev()
        .find(|c| c.name == name)
        .map(|c| c.path.clone())
        .unwrap_or_else(|| PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn site() -> (tempfile::TempDir, BuildConfig) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("layouts")).unwrap();
        fs::write(src.join("layouts/main.hbs"), "<main>{{{yield}}}</main>").unwrap();
        let config = BuildConfig::new("main.hbs", &src, dir.path().join("out"));
        (dir, config)
    }

    #[test]
    fn test_missing_layout_aborts_before_clean() {
        let (dir, config) = site();
        let config = BuildConfig {
            layout: "missing.hbs".into(),
            ..config
        };
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("old.html"), "keep me").unwrap();

        let err = Builder::new(config).unwrap().run_pass().unwrap_err();
        assert!(matches!(err, BuildError::Read { .. }));
        assert!(out.join("old.html").exists());
    }

    #[test]
    fn test_broken_layout_aborts_before_clean() {
        let (dir, config) = site();
        fs::write(config.source.join("layouts/main.hbs"), "{{#if x}}").unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("old.html"), "keep me").unwrap();

        let err = build_site(config).unwrap_err();
        assert!(matches!(err, BuildError::Compile { .. }));
        assert!(out.join("old.html").exists());
    }

    #[test]
    fn test_components_page_only_when_enabled() {
        let (dir, config) = site();
        fs::create_dir_all(config.source.join("components")).unwrap();
        fs::write(config.source.join("components/card.hbs"), "card").unwrap();
        let out = dir.path().join("out");

        let report = build_site(config.clone()).unwrap();
        assert!(report.pages.is_empty());
        assert!(!out.join("components/card.html").exists());

        let report = build_site(config.build_components(true)).unwrap();
        assert_eq!(report.pages, vec![out.join("components").join("card.html")]);
        assert_eq!(fs::read_to_string(out.join("components/card.html")).unwrap(), "<main>card</main>");
    }

    #[test]
    fn test_broken_fragment_is_reported() {
        let (_dir, config) = site();
        fs::create_dir_all(config.source.join("components")).unwrap();
        fs::write(config.source.join("components/bad.hbs"), "{{#each items}}").unwrap();
        fs::write(config.source.join("index.hbs"), "fine").unwrap();

        let report = build_site(config.clone()).unwrap();
        assert_eq!(report.pages.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source, config.source.join("components").join("bad.hbs"));
    }
}
