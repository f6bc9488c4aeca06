use std::{
    collections::{BTreeMap, HashMap},
    hash::BuildHasher,
    io::ErrorKind,
    path::PathBuf,
};

use crate::error::LoadError;

/// Supplies the source text of templates named by `{% extends "..." %}`.
pub trait Loader {
    /// Returns the source of the template at `path`.
    ///
    /// # Errors
    /// - [`LoadError::NotFound`] if nothing exists at `path`.
    /// - [`LoadError::Io`] if the source exists but cannot be read.
    fn load(&self, path: &str) -> Result<String, LoadError>;
}

/// Reads templates from files below a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl Default for FileLoader {
    /// Loads relative to a `templates` directory in the working directory.
    fn default() -> Self {
        Self::new("templates")
    }
}

impl Loader for FileLoader {
    fn load(&self, path: &str) -> Result<String, LoadError> {
        let full = self.root.join(path);
        tracing::debug!(path = %full.display(), "loading template from disk");
        std::fs::read_to_string(&full).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LoadError::NotFound {
                path: path.to_string(),
            },
            _ => LoadError::Io {
                path: path.to_string(),
                message: e.to_string(),
            },
        })
    }
}

fn not_found(path: &str) -> LoadError {
    LoadError::NotFound {
        path: path.to_string(),
    }
}

impl Loader for BTreeMap<String, String> {
    fn load(&self, path: &str) -> Result<String, LoadError> {
        self.get(path).cloned().ok_or_else(|| not_found(path))
    }
}

impl<S: BuildHasher> Loader for HashMap<String, String, S> {
    fn load(&self, path: &str) -> Result<String, LoadError> {
        self.get(path).cloned().ok_or_else(|| not_found(path))
    }
}

impl<L: Loader + ?Sized> Loader for &L {
    fn load(&self, path: &str) -> Result<String, LoadError> {
        (**self).load(path)
    }
}
