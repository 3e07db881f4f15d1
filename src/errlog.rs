use std::fmt;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One line of the error log: `[YYYY-MM-DD HH:MM:SS] message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLogEntry {
    pub timestamp: OffsetDateTime,
    pub message: String,
}

impl ErrorLogEntry {
    pub fn new(timestamp: OffsetDateTime, message: impl Into<String>) -> Self {
        Self { timestamp, message: message.into() }
    }

    pub fn now(message: impl Into<String>) -> Self {
        Self::new(OffsetDateTime::now_utc(), message)
    }
}

impl fmt::Display for ErrorLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        let stamp = self
            .timestamp
            .format(&format)
            .unwrap_or_else(|_| self.timestamp.unix_timestamp().to_string());
        // Keep each entry on a single line
        let message = self.message.replace(['\r', '\n'], " ");
        write!(f, "[{}] {}", stamp, message)
    }
}

/// Append-only sink for request failures.
///
/// Appending never fails from the caller's point of view; sinks report their
/// own trouble through `tracing`.
#[async_trait::async_trait]
pub trait ErrorLog: Send + Sync {
    async fn append(&self, entry: ErrorLogEntry);
}

/// Error log backed by a flat file, one entry per line.
pub struct FileErrorLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[async_trait::async_trait]
impl ErrorLog for FileErrorLog {
    async fn append(&self, entry: ErrorLogEntry) {
        let line = format!("{}\n", entry);
        // Whole lines only: one write per entry, appends serialized in-process
        let _guard = self.lock.lock().await;
        if let Err(e) = self.write_line(&line).await {
            tracing::error!("Failed to append to error log {}: {}", self.path.display(), e);
        }
    }
}

/// In-memory error log, handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryErrorLog {
    lines: std::sync::Mutex<Vec<String>>,
}

impl MemoryErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the rendered lines appended so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl ErrorLog for MemoryErrorLog {
    async fn append(&self, entry: ErrorLogEntry) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.to_string());
    }
}
