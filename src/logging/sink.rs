//! Durable destinations for measurement logs.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Errors raised while persisting a log batch.
#[derive(Debug, Error)]
pub enum LogSinkError {
    /// Filesystem error.
    #[error("log write failed: {0}")]
    Io(#[from] std::io::Error),
    /// The background writer queue is full.
    #[error("log writer queue is full")]
    QueueFull,
    /// The background writer has stopped.
    #[error("log writer has shut down")]
    Disconnected,
}

/// Receives formatted log batches.
pub trait LogSink: Send + Sync {
    /// Persists `text` under a name derived from `filename_hint`,
    /// appending to or replacing any existing content.
    fn persist(&self, filename_hint: &str, text: &str, append: bool) -> Result<(), LogSinkError>;
}

/// Writes each hint to `<directory>/<hint>.txt`.
#[derive(Debug, Clone)]
pub struct FileLogSink {
    directory: PathBuf,
}

impl FileLogSink {
    /// Sink writing under `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Directory log files are written to.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path a hint is written to. Characters that are not portable in
    /// file names become `-`.
    pub fn path_for(&self, filename_hint: &str) -> PathBuf {
        let name: String = filename_hint
            .chars()
            .map(|c| match c {
                ':' | '/' | '\\' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
                c => c,
            })
            .collect();
        self.directory.join(format!("{name}.txt"))
    }
}

impl LogSink for FileLogSink {
    fn persist(&self, filename_hint: &str, text: &str, append: bool) -> Result<(), LogSinkError> {
        fs::create_dir_all(&self.directory)?;
        let path = self.path_for(filename_hint);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)?;
        file.write_all(text.as_bytes())?;
        tracing::debug!(path = %path.display(), bytes = text.len(), append, "Log persisted");
        Ok(())
    }
}

/// One persisted batch, as seen by [`MemoryLogSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedLog {
    /// Name hint passed to the sink.
    pub filename_hint: String,
    /// Text written.
    pub text: String,
    /// Whether the write appended.
    pub append: bool,
}

/// Keeps batches in memory. Can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    records: Mutex<Vec<PersistedLog>>,
    failing: AtomicBool,
}

impl MemoryLogSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write so far, oldest first.
    pub fn records(&self) -> Vec<PersistedLog> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Makes subsequent writes fail with an I/O error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl LogSink for MemoryLogSink {
    fn persist(&self, filename_hint: &str, text: &str, append: bool) -> Result<(), LogSinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "sink unavailable").into());
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PersistedLog {
                filename_hint: filename_hint.to_string(),
                text: text.to_string(),
                append,
            });
        Ok(())
    }
}

struct WriteJob {
    filename_hint: String,
    text: String,
    append: bool,
}

/// Moves log I/O onto a dedicated writer thread.
///
/// `persist` only enqueues; when the queue is full the batch is dropped
/// with a warning rather than stalling the caller. Write errors on the
/// writer thread are logged.
pub struct BackgroundLogSink {
    sender: Mutex<Option<SyncSender<WriteJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundLogSink {
    /// Spawns the writer thread in front of `inner`.
    pub fn spawn(inner: Arc<dyn LogSink>, queue_size: usize) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::sync_channel::<WriteJob>(queue_size.max(1));
        let worker = thread::Builder::new()
            .name("log-writer".into())
            .spawn(move || {
                for job in receiver {
                    if let Err(e) = inner.persist(&job.filename_hint, &job.text, job.append) {
                        tracing::warn!(
                            filename_hint = %job.filename_hint,
                            error = %e,
                            "Background log write failed"
                        );
                    }
                }
                tracing::debug!("Log writer exiting");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Writes everything still queued, then stops the writer thread.
    pub fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = worker {
            if handle.join().is_err() {
                tracing::error!("Log writer thread panicked");
            }
        }
    }
}

impl LogSink for BackgroundLogSink {
    fn persist(&self, filename_hint: &str, text: &str, append: bool) -> Result<(), LogSinkError> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(LogSinkError::Disconnected)?;
        let job = WriteJob {
            filename_hint: filename_hint.to_string(),
            text: text.to_string(),
            append,
        };
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                tracing::warn!(
                    filename_hint = %job.filename_hint,
                    "Log writer busy, batch dropped"
                );
                Err(LogSinkError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(LogSinkError::Disconnected),
        }
    }
}

impl Drop for BackgroundLogSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "thermal-pipeline-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_file_sink_append_and_replace() {
        let dir = temp_dir("file-sink");
        let sink = FileLogSink::new(&dir);

        sink.persist("01-02-2024-FULL", "a\n", true).unwrap();
        sink.persist("01-02-2024-FULL", "b\n", true).unwrap();
        let path = sink.path_for("01-02-2024-FULL");
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");

        sink.persist("01-02-2024-FULL", "c\n", false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "c\n");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_hint_sanitized() {
        let sink = FileLogSink::new("/tmp/logs");
        let path = sink.path_for("Mon 10:11:12/x");
        assert_eq!(path.file_name().unwrap(), "Mon 10-11-12-x.txt");
    }

    #[test]
    fn test_memory_sink_failure_mode() {
        let sink = MemoryLogSink::new();
        sink.persist("a", "x", true).unwrap();
        sink.set_failing(true);
        assert!(matches!(sink.persist("a", "y", true), Err(LogSinkError::Io(_))));
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn test_background_sink_drains_on_shutdown() {
        let memory = Arc::new(MemoryLogSink::new());
        let sink = BackgroundLogSink::spawn(memory.clone(), 16).unwrap();
        for i in 0..5 {
            sink.persist("hint", &format!("line {i}"), true).unwrap();
        }
        sink.shutdown();

        let records = memory.records();
        assert_eq!(records.len(), 5);
        assert_eq!(records[4].text, "line 4");
        assert!(matches!(
            sink.persist("hint", "late", true),
            Err(LogSinkError::Disconnected)
        ));
    }
}
