//! Measurement log: windowed aggregation and durable sinks.

mod aggregator;
mod sink;

pub use aggregator::{FlushOutcome, LogAggregator, LogWindow};
pub use sink::{BackgroundLogSink, FileLogSink, LogSink, LogSinkError, MemoryLogSink, PersistedLog};
