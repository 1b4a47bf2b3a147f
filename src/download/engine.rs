//! Bounded concurrent asset downloads.
//!
//! [`AssetDownloader`] fans every [`DownloadJob`] out to its own Tokio task,
//! gated by a semaphore, and joins on all of them before returning a
//! [`DownloadReport`]. Individual failures never abort the other downloads;
//! they are collected in the report for the caller to act on.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use page_loader::download::{AssetDownloader, DownloadJob, HttpClient, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = AssetDownloader::new(4, RetryPolicy::default())?;
//! let jobs = vec![DownloadJob::new(
//!     "https://example.com/logo.png".parse()?,
//!     "./example-com_files/example-com-logo.png".into(),
//! )];
//! let report = downloader.download_all(Arc::new(HttpClient::new()), jobs).await?;
//! println!("completed: {}, failed: {}", report.completed(), report.failed());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use super::fetcher::{ByteStream, Fetcher};
use super::retry::{RetryPolicy, run_with_retry};
use super::FetchError;

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// One asset to fetch and the file it is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    /// Absolute URL to download.
    pub url: Url,
    /// Destination file path.
    pub destination: PathBuf,
}

impl DownloadJob {
    /// Creates a download job.
    #[must_use]
    pub fn new(url: Url, destination: PathBuf) -> Self {
        Self { url, destination }
    }
}

/// A download that failed after all attempts.
#[derive(Debug)]
pub struct AssetFailure {
    /// The asset URL.
    pub url: Url,
    /// Where the asset would have been written.
    pub destination: PathBuf,
    /// The final error.
    pub error: FetchError,
}

/// Outcome of a [`AssetDownloader::download_all`] run.
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Paths written successfully, in job order.
    pub saved: Vec<PathBuf>,
    /// Downloads that failed, in job order.
    pub failures: Vec<AssetFailure>,
    /// Number of retry attempts made across all jobs.
    pub retried: u32,
}

impl DownloadReport {
    /// Number of assets written.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.saved.len()
    }

    /// Number of assets that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Total number of jobs processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed()
    }
}

/// Semaphore-bounded pool of asset downloads.
#[derive(Debug)]
pub struct AssetDownloader {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    retry_policy: RetryPolicy,
}

impl AssetDownloader {
    /// Creates a downloader allowing `concurrency` simultaneous downloads.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-32).
    pub fn new(concurrency: usize, retry_policy: RetryPolicy) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry_policy,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Downloads every job and waits for all of them to finish.
    ///
    /// Jobs sharing a destination are collapsed to the last one, so each path
    /// is written by exactly one task.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the semaphore is closed.
    /// Download failures are reported in [`DownloadReport::failures`].
    #[instrument(skip(self, fetcher, jobs), fields(jobs = jobs.len()))]
    pub async fn download_all(
        &self,
        fetcher: Arc<dyn Fetcher>,
        jobs: Vec<DownloadJob>,
    ) -> Result<DownloadReport, EngineError> {
        let jobs = dedupe_by_destination(jobs);
        let mut handles = Vec::with_capacity(jobs.len());

        info!(count = jobs.len(), concurrency = self.concurrency, "downloading assets");

        for job in jobs {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;

            let fetcher = Arc::clone(&fetcher);
            let policy = self.retry_policy.clone();
            let task_job = job.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                download_with_retry(fetcher.as_ref(), &task_job, &policy).await
            });
            handles.push((job, handle));
        }

        let mut report = DownloadReport::default();
        for (job, handle) in handles {
            match handle.await {
                Ok(Ok(attempts)) => {
                    debug!(url = %job.url, path = %job.destination.display(), "asset saved");
                    report.retried += attempts.saturating_sub(1);
                    report.saved.push(job.destination);
                }
                Ok(Err((error, attempts))) => {
                    warn!(url = %job.url, error = %error, attempts, "asset download failed");
                    report.retried += attempts.saturating_sub(1);
                    report.failures.push(AssetFailure {
                        error,
                        url: job.url,
                        destination: job.destination,
                    });
                }
                Err(join_error) => {
                    warn!(url = %job.url, error = %join_error, "asset download task panicked");
                    report.failures.push(AssetFailure {
                        error: FetchError::aborted(job.url.as_str()),
                        url: job.url,
                        destination: job.destination,
                    });
                }
            }
        }

        info!(
            completed = report.completed(),
            failed = report.failed(),
            retried = report.retried,
            "asset downloads finished"
        );
        Ok(report)
    }
}

fn dedupe_by_destination(jobs: Vec<DownloadJob>) -> Vec<DownloadJob> {
    let last_index: HashMap<PathBuf, usize> = jobs
        .iter()
        .enumerate()
        .map(|(index, job)| (job.destination.clone(), index))
        .collect();

    jobs.into_iter()
        .enumerate()
        .filter(|(index, job)| last_index.get(&job.destination) == Some(index))
        .map(|(_, job)| job)
        .collect()
}

async fn download_with_retry(
    fetcher: &dyn Fetcher,
    job: &DownloadJob,
    policy: &RetryPolicy,
) -> Result<u32, (FetchError, u32)> {
    let (bytes, attempts) = run_with_retry(policy, job.url.as_str(), || async {
        let stream = fetcher.fetch_stream(&job.url).await?;
        write_stream(stream, &job.destination).await
    })
    .await?;

    debug!(url = %job.url, bytes, attempts, "asset written");
    Ok(attempts)
}

/// Writes a body stream to `path`, removing the partial file on failure.
pub(crate) async fn write_stream(stream: ByteStream, path: &Path) -> Result<u64, FetchError> {
    let file = File::create(path)
        .await
        .map_err(|e| FetchError::io(path, e))?;

    let result = stream_to_file(file, stream, path).await;
    if result.is_err() {
        debug!(path = %path.display(), "cleaning up partial file after error");
        let _ = tokio::fs::remove_file(path).await;
    }
    result
}

async fn stream_to_file(file: File, mut stream: ByteStream, path: &Path) -> Result<u64, FetchError> {
    let mut writer = BufWriter::new(file);
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| FetchError::io(path, e))?;
    Ok(bytes_written)
}
