//! Virtual filesystems assets are read from

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::trace;

use super::AssetError;

/// Byte source for the asset loader. Reads happen on worker threads.
pub trait Vfs: Send + Sync {
    /// Whole contents of `name`; [`AssetError::NotFound`] when absent
    fn read(&self, name: &str) -> Result<Vec<u8>, AssetError>;
}

/// Files under a root directory
#[derive(Debug, Clone)]
pub struct DirectoryVfs {
    root: PathBuf,
}

impl DirectoryVfs {
    /// Filesystem rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Vfs for DirectoryVfs {
    fn read(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        let relative = Path::new(name);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(AssetError::InvalidData(format!("'{name}' escapes the asset root")));
        }
        let path = self.root.join(relative);
        trace!("reading {}", path.display());
        std::fs::read(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => AssetError::NotFound(name.to_owned()),
            _ => AssetError::Io(format!("{}: {err}", path.display())),
        })
    }
}

/// In-memory files, mostly for tests and embedded data
#[derive(Debug, Default)]
pub struct MemoryVfs {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryVfs {
    /// Empty filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder adding one file
    #[must_use]
    pub fn with_file(self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    /// Add or replace a file
    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), bytes.into());
    }

    /// Drop a file
    pub fn remove(&self, name: &str) -> bool {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }
}

impl Vfs for MemoryVfs {
    fn read(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_owned()))
    }
}
