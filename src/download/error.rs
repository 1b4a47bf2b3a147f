//! Error types for the download module.
//!
//! Network-level failures and HTTP status failures are distinct variants so
//! callers can report them differently: network errors carry a short error
//! code (`ETIMEDOUT`, `ENOTFOUND`, ...), status errors carry the numeric code.

use std::error::Error as _;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching a page or an asset.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error {code} fetching {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// Short error code name derived from the error chain.
        code: &'static str,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("network error ETIMEDOUT fetching {url}: request timed out")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx HTTP response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The provided URL is malformed or uses an unsupported scheme.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// File system error while writing a downloaded body.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The download task ended without producing a result.
    #[error("download task for {url} was aborted")]
    Aborted {
        /// The URL whose task was aborted.
        url: String,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error, deriving the error code.
    ///
    /// Timeouts are promoted to [`FetchError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::timeout(url);
        }
        Self::Network {
            url: url.into(),
            code: network_error_code(&source),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an aborted-task error.
    pub fn aborted(url: impl Into<String>) -> Self {
        Self::Aborted { url: url.into() }
    }

    /// Returns the network error code for network-level failures.
    #[must_use]
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Network { code, .. } => Some(code),
            Self::Timeout { .. } => Some("ETIMEDOUT"),
            _ => None,
        }
    }

    /// Returns the HTTP status for status failures.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Maps a reqwest error onto a short, stable error code name.
///
/// reqwest does not expose OS error names, so the code is derived from the
/// `io::Error` kind found in the source chain, falling back to the chain text
/// for resolver failures.
fn network_error_code(error: &reqwest::Error) -> &'static str {
    if error.is_timeout() {
        return "ETIMEDOUT";
    }

    let mut chain_text = String::new();
    let mut current: Option<&(dyn std::error::Error + 'static)> = error.source();
    while let Some(cause) = current {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            match io_error.kind() {
                io::ErrorKind::ConnectionRefused => return "ECONNREFUSED",
                io::ErrorKind::ConnectionReset => return "ECONNRESET",
                io::ErrorKind::TimedOut => return "ETIMEDOUT",
                _ => {}
            }
        }
        chain_text.push_str(&cause.to_string().to_lowercase());
        chain_text.push('\n');
        current = cause.source();
    }

    if chain_text.contains("dns error")
        || chain_text.contains("failed to lookup address")
        || chain_text.contains("name or service not known")
        || chain_text.contains("no such host")
    {
        "ENOTFOUND"
    } else if chain_text.contains("connection refused") {
        "ECONNREFUSED"
    } else if error.is_connect() {
        "ECONNECT"
    } else {
        "EREQUEST"
    }
}
