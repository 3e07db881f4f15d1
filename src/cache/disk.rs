use crate::cache::{Store, StoreError};
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File a write is redirected to when its key is an existing directory.
pub const INDEX_DOCUMENT: &str = "index.html";

/// Filesystem store mirroring the origin's path hierarchy under `root`.
///
/// Fills go to a temp file in the destination directory and are renamed
/// into place, so readers see either nothing or the whole file. Two
/// concurrent fills of the same key both succeed and the last rename wins.
/// Nothing is ever evicted.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &Path) -> PathBuf {
        self.root.join(key)
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn create_dirs(dir: &Path) -> Result<(), StoreError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder
        .create(dir)
        .await
        .map_err(|source| StoreError::Io { path: dir.to_path_buf(), source })
}

fn persist(dir: &Path, target: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".fill-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait::async_trait]
impl Store for DiskStore {
    async fn exists(&self, key: &Path) -> bool {
        is_file(&self.path_for(key)).await
    }

    async fn locate(&self, key: &Path) -> Option<PathBuf> {
        if self.exists(key).await {
            return Some(key.to_path_buf());
        }
        let index = key.join(INDEX_DOCUMENT);
        if self.exists(&index).await {
            Some(index)
        } else {
            None
        }
    }

    async fn read(&self, key: &Path) -> Result<Bytes, StoreError> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(path)),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    async fn write(&self, key: &Path, data: Bytes) -> Result<PathBuf, StoreError> {
        let mut written = key.to_path_buf();
        let mut target = self.path_for(key);
        if is_dir(&target).await {
            written.push(INDEX_DOCUMENT);
            target.push(INDEX_DOCUMENT);
        }

        let dir = target.parent().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
        create_dirs(&dir).await?;

        let len = data.len();
        let dest = target.clone();
        tokio::task::spawn_blocking(move || persist(&dir, &dest, &data))
            .await
            .map_err(|e| StoreError::Io {
                path: target.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            })?
            .map_err(|source| StoreError::Io { path: target.clone(), source })?;

        tracing::debug!("Stored {} bytes at {}", len, target.display());
        Ok(written)
    }
}
