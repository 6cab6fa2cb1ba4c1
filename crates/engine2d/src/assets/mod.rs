//! Asset management system
//!
//! Assets are identified by file name and class. [`AssetLoader::load`]
//! returns an [`AssetHandle`] right away; bytes are read from a [`Vfs`] and
//! parsed on the worker pool, and `AssetLoaded` is raised on the main thread
//! once the handle is ready.

pub mod handle;
pub mod kinds;
pub mod loader;
pub mod vfs;

pub use handle::{Asset, AssetHandle};
pub use kinds::{ImageAsset, SoundAsset, TextAsset};
pub use loader::AssetLoader;
pub use vfs::{DirectoryVfs, MemoryVfs, Vfs};

use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to load asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    Io(String),

    /// `wait` gave up before the asset was ready
    #[error("Timed out waiting for {0}")]
    Timeout(String),
}
