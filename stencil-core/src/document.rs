//! Splitting a source file into its front matter and template body.
//!
//! A header is a YAML block fenced by `---` lines at the very start of the
//! file. Everything after the line that closes the header is the body, kept
//! byte for byte.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{BuildError, Result};

const FENCE: &str = "---";

/// The parsed form of a source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateDocument {
    pub metadata: Map<String, Value>,
    pub body: String,
}

impl TemplateDocument {
    /// Read and parse the file at `path`.
    ///
    /// A missing or unreadable file is a [`BuildError::Read`]. A file that is
    /// present but empty is a valid document with no metadata and no body.
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| BuildError::read(path, e))?;

        Self::parse_str(path, &text)
    }

    /// Parse already loaded text. `path` is only used for error reporting.
    pub fn parse_str<P: AsRef<Path>>(path: P, text: &str) -> Result<Self> {
        if text.is_empty() {
            return Ok(Self::default());
        }

        match split_front_matter(text) {
            Some((header, body)) => Ok(Self {
                metadata: parse_metadata(path.as_ref(), header)?,
                body: body.to_string(),
            }),
            None => Ok(Self {
                metadata: Map::new(),
                body: text.to_string(),
            }),
        }
    }
}

/// Returns `(header, body)` when `text` opens with a closed `---` block.
/// The header has at least one line, so `---` straight after the opening
/// fence does not close it.
fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix(FENCE)?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if offset > 0 && line.trim_end_matches(['\n', '\r']) == FENCE {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }

    None
}

fn parse_metadata(path: &Path, header: &str) -> Result<Map<String, Value>> {
    if header.trim().is_empty() {
        return Ok(Map::new());
    }

    let value: Value = serde_yaml::from_str(header).map_err(|e| BuildError::FrontMatter {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(BuildError::FrontMatter {
            path: path.to_path_buf(),
            reason: format!("expected key/value pairs, found `{other}`"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(text: &str) -> TemplateDocument {
        TemplateDocument::parse_str("test.hbs", text).unwrap()
    }

    #[test]
    fn test_empty_text_is_empty_document() {
        let doc = parse("");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, "");
    }

    #[test]
    fn test_no_header_keeps_whole_text() {
        let doc = parse("  <p>{{title}}</p>\n\n");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, "  <p>{{title}}</p>\n\n");
    }

    #[test]
    fn test_header_becomes_metadata() {
        let doc = parse("---\nname: World\ntags:\n  - a\n  - b\n---\nHello {{name}}");
        assert_eq!(doc.metadata.get("name"), Some(&json!("World")));
        assert_eq!(doc.metadata.get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(doc.body, "Hello {{name}}");
    }

    #[test]
    fn test_body_whitespace_is_preserved() {
        let doc = parse("---\ntitle: x\n---\n\n  indented\n\n");
        assert_eq!(doc.body, "\n  indented\n\n");
        assert!(!doc.body.contains("title"));
    }

    #[test]
    fn test_crlf_header() {
        let doc = parse("---\r\ncount: 3\r\n---\r\nbody\r\n");
        assert_eq!(doc.metadata.get("count"), Some(&json!(3)));
        assert_eq!(doc.body, "body\r\n");
    }

    #[test]
    fn test_back_to_back_fences_are_body() {
        let doc = parse("---\n---\nbody");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, "---\n---\nbody");
    }

    #[test]
    fn test_blank_header() {
        let doc = parse("---\n\n---\nbody");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn test_unclosed_header_is_body() {
        let doc = parse("---\nname: World\nno closing fence");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, "---\nname: World\nno closing fence");
    }

    #[test]
    fn test_fence_must_start_the_file() {
        let doc = parse("\n---\nname: World\n---\nbody");
        assert!(doc.metadata.is_empty());
        assert!(doc.body.starts_with("\n---"));
    }

    #[test]
    fn test_scalar_header_is_rejected() {
        let err = TemplateDocument::parse_str("bad.hbs", "---\njust a string\n---\nbody").unwrap_err();
        assert!(matches!(err, BuildError::FrontMatter { .. }));
    }

    #[test]
    fn test_malformed_yaml_is_rejected() {
        let err = TemplateDocument::parse_str("bad.hbs", "---\nkey: [unclosed\n---\nbody").unwrap_err();
        assert!(matches!(err, BuildError::FrontMatter { .. }));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateDocument::parse(dir.path().join("missing.hbs")).unwrap_err();
        match err {
            BuildError::Read { path, .. } => assert!(path.ends_with("missing.hbs")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_present_but_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.hbs");
        std::fs::write(&path, "").unwrap();

        assert_eq!(TemplateDocument::parse(&path).unwrap(), TemplateDocument::default());
    }
}
