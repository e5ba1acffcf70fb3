//! Windowed measurement log.
//!
//! Statistics lines accumulate in a single open window. When a sample
//! arrives more than the window length after the window opened, the
//! accumulated lines are flushed to the sink as one batch and the new
//! sample opens the next window.

use super::{LogSink, LogSinkError};
use chrono::{Local, TimeZone};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const FULL_HINT_FORMAT: &str = "%m-%d-%Y-FULL";
const SHORT_HINT_FORMAT: &str = "%m-%d-%Y-%H-%M-%S-SHORT";
const LINE_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %Y";
const EMPTY_SNAPSHOT: &str = "There are no logs recorded.";

/// Open log window.
///
/// Entries are kept in arrival order; output is sorted by timestamp when
/// the window is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogWindow {
    /// Timestamp of the first entry.
    pub start_millis: i64,
    /// Entries in arrival order; equal timestamps are all kept.
    pub entries: Vec<(i64, String)>,
}

/// Outcome of a flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The batch reached the sink.
    Written {
        /// Lines in the batch.
        entries: usize,
    },
    /// The sink rejected the batch; its entries were discarded.
    Failed,
}

/// Batches log lines over a time window and writes them to a sink.
pub struct LogAggregator {
    window_millis: i64,
    window: Mutex<Option<LogWindow>>,
    sink: Arc<dyn LogSink>,
    flushes: AtomicU64,
    failures: AtomicU64,
}

impl LogAggregator {
    /// Aggregator writing windows of length `window` to `sink`.
    pub fn new(window: Duration, sink: Arc<dyn LogSink>) -> Self {
        Self {
            window_millis: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
            window: Mutex::new(None),
            sink,
            flushes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<LogWindow>> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a line. Flushes the open window first when `timestamp_millis`
    /// lies beyond it; the returned outcome describes that flush.
    pub fn record(&self, timestamp_millis: i64, text: impl Into<String>) -> Option<FlushOutcome> {
        let text = text.into();
        let finished = {
            let mut slot = self.lock();
            let expired = slot
                .as_ref()
                .is_some_and(|w| timestamp_millis - w.start_millis > self.window_millis);
            let finished = if expired { slot.take() } else { None };
            slot.get_or_insert_with(|| LogWindow {
                start_millis: timestamp_millis,
                entries: Vec::new(),
            })
            .entries
            .push((timestamp_millis, text));
            finished
        };
        finished.map(|w| self.write_window(w, timestamp_millis))
    }

    /// Flushes the open window if it has been open longer than the window length.
    pub fn flush_if_due(&self, now_millis: i64) -> Option<FlushOutcome> {
        let finished = {
            let mut slot = self.lock();
            let due = slot
                .as_ref()
                .is_some_and(|w| now_millis - w.start_millis > self.window_millis);
            if due {
                slot.take()
            } else {
                None
            }
        };
        finished.map(|w| self.write_window(w, now_millis))
    }

    /// Flushes whatever is open, regardless of age.
    pub fn flush_now(&self, now_millis: i64) -> Option<FlushOutcome> {
        let finished = self.lock().take();
        finished
            .filter(|w| !w.entries.is_empty())
            .map(|w| self.write_window(w, now_millis))
    }

    /// Discards the open window without writing it.
    pub fn reset_log(&self) {
        let discarded = self.lock().take().map_or(0, |w| w.entries.len());
        tracing::info!(discarded, "Log window reset");
    }

    /// Copy of the open window's entries, in arrival order.
    pub fn entries(&self) -> Vec<(i64, String)> {
        self.lock()
            .as_ref()
            .map(|w| w.entries.clone())
            .unwrap_or_default()
    }

    /// Start of the open window, if one is open.
    pub fn window_start(&self) -> Option<i64> {
        self.lock().as_ref().map(|w| w.start_millis)
    }

    /// Writes the open window as a standalone snapshot without clearing it.
    pub fn export_snapshot(&self, now_millis: i64) -> Result<(), LogSinkError> {
        let entries = self.entries();
        let text = if entries.is_empty() {
            EMPTY_SNAPSHOT.to_string()
        } else {
            format_lines(&entries)
        };
        let hint = format_local(now_millis, SHORT_HINT_FORMAT);
        self.sink.persist(&hint, &text, false)?;
        tracing::info!(entries = entries.len(), filename_hint = %hint, "Log snapshot exported");
        Ok(())
    }

    /// Windows written so far.
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Windows the sink rejected.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn write_window(&self, window: LogWindow, now_millis: i64) -> FlushOutcome {
        let hint = format_local(now_millis, FULL_HINT_FORMAT);
        let text = format_lines(&window.entries);
        match self.sink.persist(&hint, &text, true) {
            Ok(()) => {
                self.flushes.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    entries = window.entries.len(),
                    window_start = window.start_millis,
                    filename_hint = %hint,
                    "Log window flushed"
                );
                FlushOutcome::Written {
                    entries: window.entries.len(),
                }
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    entries = window.entries.len(),
                    error = %e,
                    "Log flush failed, window discarded"
                );
                FlushOutcome::Failed
            }
        }
    }
}

fn format_local(millis: i64, pattern: &str) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format(pattern).to_string(),
        None => millis.to_string(),
    }
}

/// One line per entry in timestamp order; equal timestamps keep insertion order.
fn format_lines(entries: &[(i64, String)]) -> String {
    let mut ordered: Vec<&(i64, String)> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.0);
    ordered
        .into_iter()
        .map(|(ts, text)| format!("{}: \t {}\n", format_local(*ts, LINE_TIME_FORMAT), text))
        .collect()
}
