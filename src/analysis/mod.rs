//! Region measurement.
//!
//! Extraction validates a region against a frame and copies the samples
//! under it; the statistics engine reduces them in a single pass. Both
//! are pure and safe to call from any thread.

mod extract;
mod statistics;

pub use extract::{extract_region, measure_region, RegionError};
pub use statistics::{compute_stats, RegionStats};
