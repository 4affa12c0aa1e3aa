//! Named, reusable template fragments ("components").
//!
//! The registry is rebuilt from scratch on every pass so that a renamed or
//! deleted component can never stay addressable. Fragments are kept as the
//! file's full raw text, front matter included.

use std::collections::BTreeMap;

use crate::error::{BuildError, Result};
use crate::scanner::SourceFile;

#[derive(Debug, Default, Clone)]
pub struct FragmentRegistry {
    fragments: BTreeMap<String, String>,
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole registry with the given component files.
    ///
    /// Every file is read before anything is replaced: if one read fails the
    /// registry keeps its previous content and the error is returned. When two
    /// files share a name the later one wins.
    pub fn reset(&mut self, components: &[SourceFile]) -> Result<()> {
        let mut fragments = BTreeMap::new();

        for component in components {
            let raw = std::fs::read_to_string(&component.path)
                .map_err(|e| BuildError::read(&component.path, e))?;
            fragments.insert(component.name.clone(), raw);
        }

        self.fragments = fragments;
        Ok(())
    }

    /// Register a single fragment from text. Mostly useful for tests and
    /// embedding callers.
    pub fn insert(&mut self, name: impl Into<String>, raw: impl Into<String>) {
        self.fragments.insert(name.into(), raw.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fragments.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fragments.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}
