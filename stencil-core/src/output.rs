use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::{BuildError, Result};
use crate::scanner::generated_files;

/// Write `content` to `path`, replacing any existing file.
///
/// Parent directories are created first. Returns once the data has been
/// flushed to disk.
pub fn write_page(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let mut file = File::create(path).map_err(|e| BuildError::write(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| BuildError::write(path, e))?;
    file.sync_all().map_err(|e| BuildError::write(path, e))?;

    Ok(())
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| BuildError::write(path, e))
}

/// Delete every page a previous pass generated under `output_dir`.
/// Returns how many files were removed.
pub fn clean_output(output_dir: &Path) -> Result<usize> {
    let files = generated_files(output_dir)?;

    for file in &files {
        tracing::debug!(path = %file.display(), "removing generated page");
        match fs::remove_file(file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(BuildError::Clean {
                    path: file.clone(),
                    source,
                });
            }
        }
    }

    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/page.html");

        write_page(&path, "<p>hi</p>").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>hi</p>");
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        fs::write(&path, "a much longer previous version").unwrap();

        write_page(&path, "new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // a file where a directory is needed
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let err = write_page(&blocker.join("page.html"), "x").unwrap_err();
        assert!(matches!(err, BuildError::Write { .. }));
    }

    #[test]
    fn test_clean_removes_only_generated_pages() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path();
        fs::create_dir_all(out.join("components")).unwrap();
        fs::create_dir_all(out.join("assets")).unwrap();
        fs::write(out.join("index.html"), "").unwrap();
        fs::write(out.join("components/card.html"), "").unwrap();
        fs::write(out.join("app.css"), "").unwrap();
        fs::write(out.join("assets/keep.html"), "").unwrap();

        assert_eq!(clean_output(out).unwrap(), 2);
        assert!(!out.join("index.html").exists());
        assert!(!out.join("components/card.html").exists());
        assert!(out.join("app.css").exists());
        assert!(out.join("assets/keep.html").exists());
    }

    #[test]
    fn test_clean_missing_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(clean_output(&dir.path().join("nope")).unwrap(), 0);
    }
}
