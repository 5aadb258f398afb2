//! Report outbox
//!
//! Durable, append-only queue of reports that could not be delivered. The
//! on-disk format is JSON Lines: one `{"job_id", "action", "payload"}`
//! record per line, in insertion order. A missing file is an empty outbox;
//! the parent directory is created on the first append.

use async_trait::async_trait;
use fleet_core::domain::report::ReportItem;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Errors raised by outbox persistence
#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("Outbox I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report for job {job_id}: {source}")]
    Serialize {
        job_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable buffer for undelivered reports
///
/// All operations preserve FIFO order.
#[async_trait]
pub trait OutboxService: Send + Sync {
    /// Appends one report as a single atomic record
    async fn append(&self, item: &ReportItem) -> Result<(), OutboxError>;

    /// Removes and returns up to `max_items` of the oldest reports
    /// (all of them when `None`)
    async fn drain(&self, max_items: Option<usize>) -> Result<Vec<ReportItem>, OutboxError>;

    /// Puts reports back at the front, ahead of anything appended meanwhile
    async fn requeue(&self, items: Vec<ReportItem>) -> Result<(), OutboxError>;

    /// Number of reports currently buffered
    async fn len(&self) -> Result<usize, OutboxError>;
}

/// JSON Lines file implementation of [`OutboxService`]
///
/// A mutex serialises appends, drains and requeues within the process so
/// concurrent job completions never interleave partial records. Rewrites go
/// through a temporary file and a rename.
pub struct FileOutbox {
    path: PathBuf,
    tmp_path: PathBuf,
    lock: Mutex<()>,
}

impl FileOutbox {
    /// Creates an outbox backed by `path`; nothing is touched on disk yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "outbox".into());
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        Self {
            path,
            tmp_path,
            lock: Mutex::new(()),
        }
    }

    /// Location of the outbox file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> OutboxError {
        OutboxError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn ensure_parent(&self) -> Result<(), OutboxError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e)),
            _ => Ok(()),
        }
    }

    /// Reads every record; caller must hold the lock
    async fn read_items(&self) -> Result<Vec<ReportItem>, OutboxError> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        // Split on raw bytes: a line that is not valid UTF-8 is skipped, not fatal.
        let mut items = Vec::new();
        for (idx, line) in content.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<ReportItem>(line) {
                Ok(item) => items.push(item),
                Err(e) => warn!(
                    "Skipping corrupt outbox record at {}:{}: {}",
                    self.path.display(),
                    idx + 1,
                    e
                ),
            }
        }

        Ok(items)
    }

    /// Replaces the file content with `items`; caller must hold the lock
    async fn write_items(&self, items: &[ReportItem]) -> Result<(), OutboxError> {
        if items.is_empty() {
            return match fs::remove_file(&self.path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(self.io_error(e)),
            };
        }

        let mut content = String::new();
        for item in items {
            content.push_str(&encode(item)?);
        }

        self.ensure_parent().await?;
        fs::write(&self.tmp_path, content)
            .await
            .map_err(|e| self.io_error(e))?;
        fs::rename(&self.tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }
}

/// Whether `file` is non-empty and does not end in a newline
///
/// That happens when a previous append was cut short; the torn tail must be
/// terminated before the next record so the two don't merge.
async fn has_torn_tail(file: &mut File) -> std::io::Result<bool> {
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1)).await?;
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

/// One record, newline included
fn encode(item: &ReportItem) -> Result<String, OutboxError> {
    let mut line = serde_json::to_string(item).map_err(|source| OutboxError::Serialize {
        job_id: item.job_id.clone(),
        source,
    })?;
    line.push('\n');
    Ok(line)
}

#[async_trait]
impl OutboxService for FileOutbox {
    async fn append(&self, item: &ReportItem) -> Result<(), OutboxError> {
        let mut line = encode(item)?;
        let _guard = self.lock.lock().await;

        self.ensure_parent().await?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        if has_torn_tail(&mut file).await.map_err(|e| self.io_error(e))? {
            warn!(
                "Outbox {} ends in a partial record, terminating it",
                self.path.display()
            );
            line.insert(0, '\n');
        }

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.sync_data().await.map_err(|e| self.io_error(e))?;

        debug!("Buffered {} report for job {}", item.action, item.job_id);
        Ok(())
    }

    async fn drain(&self, max_items: Option<usize>) -> Result<Vec<ReportItem>, OutboxError> {
        let _guard = self.lock.lock().await;

        let mut items = self.read_items().await?;
        let remainder = match max_items {
            Some(max) if max < items.len() => items.split_off(max),
            _ => Vec::new(),
        };

        if !items.is_empty() || !remainder.is_empty() {
            self.write_items(&remainder).await?;
        }

        Ok(items)
    }

    async fn requeue(&self, items: Vec<ReportItem>) -> Result<(), OutboxError> {
        if items.is_empty() {
            return Ok(());
        }

        let _guard = self.lock.lock().await;

        let mut queued = items;
        queued.extend(self.read_items().await?);
        self.write_items(&queued).await
    }

    async fn len(&self) -> Result<usize, OutboxError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_items().await?.len())
    }
}
