//! HTTP fetching and asset downloads.
//!
//! This module holds everything on the network side of a page load:
//!
//! - [`Fetcher`] - the seam the loader fetches through
//! - [`HttpClient`] - the reqwest implementation, configured with a timeout
//! - [`FetchError`] - network, HTTP status, and IO failures kept distinct
//! - [`RetryPolicy`] - optional exponential backoff for transient failures
//! - [`AssetDownloader`] - bounded fan-out/fan-in of asset downloads

mod client;
pub(crate) mod constants;
mod engine;
mod error;
mod fetcher;
mod retry;

pub use client::HttpClient;
pub use constants::{DEFAULT_CONCURRENCY, REQUEST_TIMEOUT_SECS};
pub use engine::{AssetDownloader, AssetFailure, DownloadJob, DownloadReport, EngineError};
pub use error::FetchError;
pub use fetcher::{ByteStream, Fetcher};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error, run_with_retry,
};
