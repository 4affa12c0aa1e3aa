use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{BuildError, Result};

pub const TEMPLATE_EXTENSION: &str = "hbs";
pub const OUTPUT_EXTENSION: &str = "html";
pub const LAYOUTS_DIR: &str = "layouts";
pub const COMPONENTS_DIR: &str = "components";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Template,
    Component,
}

/// A `.hbs` file found in the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// The file stem, used as the output name and the fragment name.
    pub name: String,
    pub kind: SourceKind,
}

impl SourceFile {
    fn new(path: PathBuf, kind: SourceKind) -> Option<Self> {
        let name = path.file_stem()?.to_string_lossy().to_string();
        Some(Self { path, name, kind })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name.clone())
    }

    /// Where this file's page lands under `output_dir`.
    pub fn out_path(&self, output_dir: &Path) -> PathBuf {
        let file_name = format!("{}.{}", self.name, OUTPUT_EXTENSION);
        match self.kind {
            SourceKind::Template => output_dir.join(file_name),
            SourceKind::Component => output_dir.join(COMPONENTS_DIR).join(file_name),
        }
    }
}

/// Everything a pass needs to know about the source tree.
#[derive(Debug, Default)]
pub struct Discovery {
    pub layout: PathBuf,
    pub templates: Vec<SourceFile>,
    pub components: Vec<SourceFile>,
}

pub struct SiteScanner {
    source_dir: PathBuf,
}

impl SiteScanner {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            source_dir: path.as_ref().to_path_buf(),
        }
    }

    pub fn layout_path(&self, layout: &str) -> PathBuf {
        self.source_dir.join(LAYOUTS_DIR).join(layout)
    }

    pub fn scan(&self, layout: &str) -> Result<Discovery> {
        let templates = self.scan_dir(&self.source_dir, SourceKind::Template)?;
        let components = self.scan_dir(&self.source_dir.join(COMPONENTS_DIR), SourceKind::Component)?;

        tracing::debug!(
            source = %self.source_dir.display(),
            templates = templates.len(),
            components = components.len(),
            "discovered source files"
        );

        Ok(Discovery {
            layout: self.layout_path(layout),
            templates,
            components,
        })
    }

    /// Direct children of `dir` with the template extension, sorted by name.
    /// A missing directory simply has no templates.
    fn scan_dir(&self, dir: &Path, kind: SourceKind) -> Result<Vec<SourceFile>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| walk_error(dir, e))?;
            let path = entry.path();

            if entry.file_type().is_file() && has_extension(path, TEMPLATE_EXTENSION) {
                if let Some(file) = SourceFile::new(path.to_path_buf(), kind) {
                    files.push(file);
                }
            }
        }

        Ok(files)
    }
}

/// Generated pages from earlier passes: `*.html` directly under `output_dir`
/// and under its `components` directory.
pub fn generated_files(output_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for dir in [output_dir.to_path_buf(), output_dir.join(COMPONENTS_DIR)] {
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| walk_error(&dir, e))?;
            if entry.file_type().is_file() && has_extension(entry.path(), OUTPUT_EXTENSION) {
                files.push(entry.into_path());
            }
        }
    }

    Ok(files)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().map(|e| e == ext).unwrap_or(false)
}

fn walk_error(dir: &Path, err: walkdir::Error) -> BuildError {
    let path = err.path().unwrap_or(dir).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    BuildError::Read { path, source }
}
