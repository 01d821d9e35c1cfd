//! File output for solver runs.

/// CSV trace and market-key streams.
pub mod trace;
