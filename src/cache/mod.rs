pub mod disk;

pub use disk::{DiskStore, INDEX_DOCUMENT};

use bytes::Bytes;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error on {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
}

/// Local copy of mirrored assets.
///
/// Keys are paths relative to the store root. Paths returned by `locate`
/// and `write` are keys too and can be passed straight to `read`.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// True only when a regular file sits at `key`.
    async fn exists(&self, key: &Path) -> bool;

    /// The servable file for `key`: the key itself, or the index document
    /// beneath it when an earlier write landed on a directory.
    async fn locate(&self, key: &Path) -> Option<PathBuf>;

    async fn read(&self, key: &Path) -> Result<Bytes, StoreError>;

    /// Persist `data` at `key`, returning the key actually written.
    async fn write(&self, key: &Path, data: Bytes) -> Result<PathBuf, StoreError>;
}
