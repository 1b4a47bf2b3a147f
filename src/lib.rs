//! Page Loader Library
//!
//! Downloads a single web page, saves its same-origin assets (images,
//! stylesheets, scripts, linked pages) into a sibling `_files` folder, and
//! rewrites the saved page to reference the local copies.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`page`] - naming, scanning, planning, rewriting and the load pipeline
//! - [`download`] - HTTP client, retry policy and bounded asset downloads
//! - [`config`] - settings for a page load
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> Result<(), page_loader::LoadError> {
//! let result = page_loader::load_page("https://example.com/", ".").await?;
//! println!("{}", result.saved_page_path.display());
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod page;
mod user_agent;

// Re-export commonly used types
pub use config::LoaderConfig;
pub use download::{
    AssetDownloader, DEFAULT_CONCURRENCY, FetchError, Fetcher, HttpClient, RetryPolicy,
};
pub use page::{
    CollisionPolicy, LoadError, LoadResult, PageLoader, PageRequest, ResourceTags,
    RewriteStrategy, load_page,
};
