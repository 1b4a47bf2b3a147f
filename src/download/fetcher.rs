//! The HTTP collaborator seam used by the page loader.
//!
//! The loader only talks to a [`Fetcher`], so tests can substitute an
//! in-memory implementation and callers can configure the real
//! [`HttpClient`](super::HttpClient) per invocation.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use url::Url;

use super::FetchError;

/// A stream of body chunks produced by [`Fetcher::fetch_stream`].
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, FetchError>>;

/// Performs GET requests for page bodies and asset byte streams.
///
/// Implementations must report network-level failures and non-2xx statuses
/// as distinct [`FetchError`] variants.
#[async_trait]
pub trait Fetcher: Send + Sync + std::fmt::Debug {
    /// Fetches `url` and returns the decoded response body.
    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError>;

    /// Fetches `url` and returns its body as a stream of byte chunks.
    async fn fetch_stream(&self, url: &Url) -> Result<ByteStream, FetchError>;
}
