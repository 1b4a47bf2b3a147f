//! Constants for the download module (timeouts, concurrency).

/// Default per-request timeout in seconds, applied to connect and to the full request.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default number of concurrent asset downloads.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 32;
