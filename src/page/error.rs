//! Error type for page loads.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::download::{AssetFailure, EngineError, FetchError};

/// Errors surfaced by [`crate::page::PageLoader::load`].
#[derive(Debug, Error)]
pub enum LoadError {
    /// The page URL could not be parsed or is not `http`/`https`.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The URL as given.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The output directory is missing, not a directory, or not writable.
    #[error("output directory {path}: {source}")]
    OutputDirectory {
        /// The output directory.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The assets folder could not be created.
    #[error("cannot create assets folder {path}: {source}")]
    AssetsFolder {
        /// The folder that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The rewritten page could not be written.
    #[error("cannot write page {path}: {source}")]
    WritePage {
        /// The page file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A tag-map entry is not a usable selector.
    #[error("invalid resource selector {selector}: {reason}")]
    InvalidSelector {
        /// The offending selector.
        selector: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The document could not be tokenized while looking for references.
    #[error("cannot scan document: {reason}")]
    Scan {
        /// Tokenizer error message.
        reason: String,
    },

    /// The document could not be rewritten.
    #[error("cannot rewrite document: {reason}")]
    Rewrite {
        /// Rewriter error message.
        reason: String,
    },

    /// One or more assets failed to download.
    #[error("{failed} of {total} assets failed to download{}", first_failure(.failures))]
    Assets {
        /// Number of failed assets.
        failed: usize,
        /// Number of assets attempted.
        total: usize,
        /// Each failure, in plan order.
        failures: Vec<AssetFailure>,
    },

    /// The download pool could not be set up or run.
    #[error("download engine error: {0}")]
    Engine(#[from] EngineError),

    /// Fetching the page itself failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

fn first_failure(failures: &[AssetFailure]) -> String {
    failures
        .first()
        .map(|failure| format!(": {}", failure.error))
        .unwrap_or_default()
}

impl LoadError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an output directory error.
    pub fn output_directory(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::OutputDirectory {
            path: path.into(),
            source,
        }
    }

    /// Creates an assets folder error.
    pub fn assets_folder(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::AssetsFolder {
            path: path.into(),
            source,
        }
    }

    /// Creates a page write error.
    pub fn write_page(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::WritePage {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid selector error.
    pub fn invalid_selector(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    /// Creates a scan error.
    pub fn scan(reason: impl Into<String>) -> Self {
        Self::Scan {
            reason: reason.into(),
        }
    }

    /// Creates a rewrite error.
    pub fn rewrite(reason: impl Into<String>) -> Self {
        Self::Rewrite {
            reason: reason.into(),
        }
    }

    /// Creates an aggregated asset failure.
    #[must_use]
    pub fn assets(total: usize, failures: Vec<AssetFailure>) -> Self {
        Self::Assets {
            failed: failures.len(),
            total,
            failures,
        }
    }

    /// Returns the IO error kind for filesystem failures.
    ///
    /// Asset failures report the kind of the first failing asset, if it was a
    /// filesystem failure.
    #[must_use]
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::OutputDirectory { source, .. }
            | Self::AssetsFolder { source, .. }
            | Self::WritePage { source, .. }
            | Self::Fetch(FetchError::Io { source, .. }) => Some(source.kind()),
            Self::Assets { failures, .. } => failures.first().and_then(|failure| {
                match &failure.error {
                    FetchError::Io { source, .. } => Some(source.kind()),
                    _ => None,
                }
            }),
            _ => None,
        }
    }

    /// Returns the underlying fetch error, if this is a page fetch failure.
    #[must_use]
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            Self::Fetch(error) => Some(error),
            _ => None,
        }
    }
}
