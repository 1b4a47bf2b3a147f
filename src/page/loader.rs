//! The page load pipeline.
//!
//! ```text
//! fetch -> scan -> plan -> rewrite -> assets folder -> page file -> assets
//! ```
//!
//! Every step is fail-fast. Files written before a failing step stay on
//! disk. Asset downloads fan out over a bounded pool and are all awaited
//! before [`PageLoader::load`] returns.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::LoadError;
use super::naming::{file_name_from_url, folder_name_from_url};
use super::planner::{AssetPlan, plan};
use super::scanner::scan;
use crate::config::LoaderConfig;
use crate::download::{AssetDownloader, AssetFailure, DownloadJob, Fetcher, HttpClient, run_with_retry};

/// A page to save and the directory to save it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Absolute `http`/`https` page URL.
    pub url: Url,
    /// Existing, writable output directory.
    pub output_dir: PathBuf,
}

impl PageRequest {
    /// Parses `url` and pairs it with `output_dir`.
    ///
    /// The directory is not checked here; [`PageLoader::load`] checks it
    /// before fetching.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidUrl`] if `url` does not parse or its scheme
    /// is not `http` or `https`.
    pub fn new(url: &str, output_dir: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let parsed = Url::parse(url).map_err(|e| LoadError::invalid_url(url, e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LoadError::invalid_url(
                url,
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }
        Ok(Self {
            url: parsed,
            output_dir: output_dir.into(),
        })
    }
}

/// What a successful load produced.
#[derive(Debug)]
pub struct LoadResult {
    /// Path of the written page file.
    pub saved_page_path: PathBuf,
    /// Path of the assets folder, if in-domain assets were found.
    pub assets_folder_path: Option<PathBuf>,
    /// Number of asset files written.
    pub assets_downloaded: usize,
    /// Assets that failed when failures are not fatal.
    pub asset_failures: Vec<AssetFailure>,
}

/// Saves pages and their in-domain assets.
#[derive(Debug)]
pub struct PageLoader {
    fetcher: Arc<dyn Fetcher>,
    config: LoaderConfig,
    downloader: AssetDownloader,
}

impl PageLoader {
    /// Creates a loader fetching through `fetcher`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Engine`] if the configured concurrency is out of
    /// range.
    pub fn new(fetcher: Arc<dyn Fetcher>, config: LoaderConfig) -> Result<Self, LoadError> {
        let downloader = AssetDownloader::new(config.concurrency, config.retry_policy.clone())?;
        Ok(Self {
            fetcher,
            config,
            downloader,
        })
    }

    /// Returns the loader configuration.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Saves the page at `request.url` into `request.output_dir`.
    ///
    /// # Errors
    ///
    /// - [`LoadError::OutputDirectory`] if the directory is missing
    ///   (`NotFound`) or not a directory
    /// - [`LoadError::Fetch`] if the page cannot be fetched
    /// - [`LoadError::AssetsFolder`] / [`LoadError::WritePage`] if the output
    ///   already exists (`AlreadyExists`) or cannot be created, including
    ///   `PermissionDenied` for a directory the process cannot write to
    /// - [`LoadError::Assets`] if assets failed and failures are fatal
    #[instrument(skip(self, request), fields(url = %request.url, output = %request.output_dir.display()))]
    pub async fn load(&self, request: &PageRequest) -> Result<LoadResult, LoadError> {
        check_output_dir(&request.output_dir).await?;

        let (html, attempts) =
            run_with_retry(&self.config.retry_policy, request.url.as_str(), || {
                self.fetcher.fetch_text(&request.url)
            })
            .await
            .map_err(|(error, _)| LoadError::Fetch(error))?;
        debug!(bytes = html.len(), attempts, "page fetched");

        let references = scan(&html, &request.url, &self.config.tags)?;
        let folder_name = folder_name_from_url(&request.url);
        let plans = plan(&references, &folder_name, self.config.collisions);
        let document = self
            .config
            .rewrite
            .rewriter()
            .rewrite(&html, &references, &plans)?;

        let assets_folder_path = if plans.is_empty() {
            None
        } else {
            let path = request.output_dir.join(&folder_name);
            fs::create_dir(&path)
                .await
                .map_err(|e| LoadError::assets_folder(&path, e))?;
            debug!(path = %path.display(), "assets folder created");
            Some(path)
        };

        let saved_page_path = request.output_dir.join(file_name_from_url(&request.url));
        write_page(&saved_page_path, &document).await?;
        info!(path = %saved_page_path.display(), assets = plans.len(), "page saved");

        let jobs = download_jobs(&request.output_dir, &plans);
        let report = self
            .downloader
            .download_all(Arc::clone(&self.fetcher), jobs)
            .await?;

        if !report.failures.is_empty() {
            if self.config.fail_on_asset_error {
                return Err(LoadError::assets(report.total(), report.failures));
            }
            for failure in &report.failures {
                warn!(url = %failure.url, error = %failure.error, "asset skipped");
            }
        }

        Ok(LoadResult {
            saved_page_path,
            assets_folder_path,
            assets_downloaded: report.completed(),
            asset_failures: report.failures,
        })
    }
}

/// Saves `url` into `output_dir` with the default client and configuration.
///
/// # Errors
///
/// See [`PageLoader::load`].
pub async fn load_page(url: &str, output_dir: impl Into<PathBuf>) -> Result<LoadResult, LoadError> {
    let request = PageRequest::new(url, output_dir)?;
    let loader = PageLoader::new(Arc::new(HttpClient::new()), LoaderConfig::default())?;
    loader.load(&request).await
}

async fn check_output_dir(path: &Path) -> Result<(), LoadError> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| LoadError::output_directory(path, e))?;
    if !metadata.is_dir() {
        return Err(LoadError::output_directory(
            path,
            io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }
    Ok(())
}

async fn write_page(path: &Path, document: &str) -> Result<(), LoadError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| LoadError::write_page(path, e))?;
    file.write_all(document.as_bytes())
        .await
        .map_err(|e| LoadError::write_page(path, e))?;
    file.flush().await.map_err(|e| LoadError::write_page(path, e))
}

fn download_jobs(output_dir: &Path, plans: &[AssetPlan]) -> Vec<DownloadJob> {
    plans
        .iter()
        .map(|plan| {
            DownloadJob::new(
                plan.source_url.clone(),
                output_dir.join(&plan.local_relative_path),
            )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures_util::{StreamExt, stream};
    use tempfile::TempDir;

    use super::*;
    use crate::download::{ByteStream, FetchError};
    use crate::page::RewriteStrategy;

    #[derive(Debug, Default)]
    struct MemoryFetcher {
        bodies: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl MemoryFetcher {
        fn with(mut self, url: &str, body: &[u8]) -> Self {
            self.bodies.insert(url.to_string(), body.to_vec());
            self
        }

        fn body(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.bodies
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| FetchError::http_status(url.as_str(), 404))
        }
    }

    #[async_trait]
    impl Fetcher for MemoryFetcher {
        async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
            Ok(String::from_utf8_lossy(&self.body(url)?).into_owned())
        }

        async fn fetch_stream(&self, url: &Url) -> Result<ByteStream, FetchError> {
            let body = self.body(url)?;
            Ok(stream::iter(vec![Ok(body)]).boxed())
        }
    }

    const HEXLET_PAGE: &str = r#"<html lang="ru">
  <head>
    <meta charset="utf-8">
    <title>Курсы по программированию Хекслет</title>
    <link rel="stylesheet" media="all" href="https://cdn2.hexlet.io/assets/menu.css">
    <link rel="stylesheet" media="all" href="/assets/application.css" />
    <link href="/courses" rel="canonical">
  </head>
  <body>
    <img src="/assets/professions/nodejs.png" alt="Иконка профессии Node.js-программист" />
    <h3>
      <a href="/professions/nodejs">Node.js-программист</a>
    </h3>
    <script src="https://js.stripe.com/v3/"></script>
    <script src="https://ru.hexlet.io/packs/js/runtime.js"></script>
  </body>
</html>
"#;

    fn hexlet_fetcher() -> MemoryFetcher {
        MemoryFetcher::default()
            .with("https://ru.hexlet.io/courses", HEXLET_PAGE.as_bytes())
            .with("https://ru.hexlet.io/assets/application.css", b"body{}")
            .with("https://ru.hexlet.io/assets/professions/nodejs.png", b"\x89PNG")
            .with("https://ru.hexlet.io/packs/js/runtime.js", b"console.log(1)")
    }

    fn loader(fetcher: MemoryFetcher, config: LoaderConfig) -> (Arc<MemoryFetcher>, PageLoader) {
        let fetcher = Arc::new(fetcher);
        let loader = PageLoader::new(Arc::clone(&fetcher) as Arc<dyn Fetcher>, config).unwrap();
        (fetcher, loader)
    }

    #[test]
    fn test_page_request_rejects_non_http_schemes() {
        assert!(PageRequest::new("https://x.test/", "/tmp").is_ok());
        assert!(matches!(
            PageRequest::new("ftp://x.test/", "/tmp"),
            Err(LoadError::InvalidUrl { .. })
        ));
        assert!(matches!(
            PageRequest::new("not a url", "/tmp"),
            Err(LoadError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_loader_rejects_invalid_concurrency() {
        let result = PageLoader::new(
            Arc::new(MemoryFetcher::default()),
            LoaderConfig::default().with_concurrency(0),
        );
        assert!(matches!(result, Err(LoadError::Engine(_))));
    }

    #[tokio::test]
    async fn test_page_without_assets_is_saved_verbatim() {
        let temp = TempDir::new().unwrap();
        let body = "<!DOCTYPE html>\n<html><head><title>DuckDuckGo</title></head>\n<body><a href=\"/about\">About</a></body></html>\n";
        let (_, loader) = loader(
            MemoryFetcher::default().with("https://duckduckgo.com/", body.as_bytes()),
            LoaderConfig::default(),
        );
        let request = PageRequest::new("https://duckduckgo.com", temp.path()).unwrap();

        let result = loader.load(&request).await.unwrap();

        assert_eq!(result.saved_page_path, temp.path().join("duckduckgo-com.html"));
        assert_eq!(std::fs::read_to_string(&result.saved_page_path).unwrap(), body);
        assert!(result.assets_folder_path.is_none());
        assert!(!temp.path().join("duckduckgo-com_files").exists());
        assert_eq!(result.assets_downloaded, 0);
    }

    #[tokio::test]
    async fn test_page_with_assets_is_rewritten_and_assets_saved() {
        let temp = TempDir::new().unwrap();
        let (fetcher, loader) = loader(hexlet_fetcher(), LoaderConfig::default());
        let request = PageRequest::new("https://ru.hexlet.io/courses", temp.path()).unwrap();

        let result = loader.load(&request).await.unwrap();

        let folder = temp.path().join("ru-hexlet-io-courses_files");
        assert_eq!(result.saved_page_path, temp.path().join("ru-hexlet-io-courses.html"));
        assert_eq!(result.assets_folder_path.as_deref(), Some(folder.as_path()));
        assert_eq!(result.assets_downloaded, 4);

        let mut names: Vec<_> = std::fs::read_dir(&folder)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "ru-hexlet-io-assets-application.css",
                "ru-hexlet-io-assets-professions-nodejs.png",
                "ru-hexlet-io-courses.html",
                "ru-hexlet-io-packs-js-runtime.js",
            ]
        );
        assert_eq!(
            std::fs::read(folder.join("ru-hexlet-io-assets-professions-nodejs.png")).unwrap(),
            b"\x89PNG"
        );
        assert_eq!(
            std::fs::read_to_string(folder.join("ru-hexlet-io-courses.html")).unwrap(),
            HEXLET_PAGE
        );

        let saved = std::fs::read_to_string(&result.saved_page_path).unwrap();
        for path in [
            "ru-hexlet-io-courses_files/ru-hexlet-io-assets-application.css",
            "ru-hexlet-io-courses_files/ru-hexlet-io-assets-professions-nodejs.png",
            "ru-hexlet-io-courses_files/ru-hexlet-io-courses.html",
            "ru-hexlet-io-courses_files/ru-hexlet-io-packs-js-runtime.js",
        ] {
            assert!(saved.contains(path), "missing {path}");
        }
        assert!(saved.contains("https://cdn2.hexlet.io/assets/menu.css"));
        assert!(saved.contains("https://js.stripe.com/v3/"));
        assert!(saved.contains(r#"<a href="/professions/nodejs">"#));

        let requests = fetcher.requests.lock().unwrap();
        assert!(!requests.iter().any(|url| url.contains("stripe") || url.contains("cdn2")));
    }

    #[tokio::test]
    async fn test_literal_rewrite_matches_expected_document() {
        let temp = TempDir::new().unwrap();
        let (_, loader) = loader(
            hexlet_fetcher(),
            LoaderConfig::default().with_rewrite(RewriteStrategy::Literal),
        );
        let request = PageRequest::new("https://ru.hexlet.io/courses", temp.path()).unwrap();

        let result = loader.load(&request).await.unwrap();

        let expected = HEXLET_PAGE
            .replacen(
                "/assets/professions/nodejs.png",
                "ru-hexlet-io-courses_files/ru-hexlet-io-assets-professions-nodejs.png",
                1,
            )
            .replacen(
                "/assets/application.css",
                "ru-hexlet-io-courses_files/ru-hexlet-io-assets-application.css",
                1,
            )
            .replacen(
                r#"href="/courses""#,
                r#"href="ru-hexlet-io-courses_files/ru-hexlet-io-courses.html""#,
                1,
            )
            .replacen(
                "https://ru.hexlet.io/packs/js/runtime.js",
                "ru-hexlet-io-courses_files/ru-hexlet-io-packs-js-runtime.js",
                1,
            );
        assert_eq!(std::fs::read_to_string(&result.saved_page_path).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_missing_output_directory_fails_before_fetching() {
        let temp = TempDir::new().unwrap();
        let (fetcher, loader) = loader(hexlet_fetcher(), LoaderConfig::default());
        let request =
            PageRequest::new("https://ru.hexlet.io/courses", temp.path().join("missing")).unwrap();

        let err = loader.load(&request).await.unwrap_err();

        assert!(matches!(err, LoadError::OutputDirectory { .. }));
        assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
        assert!(fetcher.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_output_path_that_is_a_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        let (_, loader) = loader(hexlet_fetcher(), LoaderConfig::default());
        let request = PageRequest::new("https://ru.hexlet.io/courses", &file).unwrap();

        let err = loader.load(&request).await.unwrap_err();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::NotADirectory));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_only_mode_bits_follow_actual_writability() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("locked");
        std::fs::create_dir(&dir).unwrap();
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o555)).unwrap();
        // Privileged users can still write here despite the mode bits.
        let writable = std::fs::write(dir.join(".touch"), b"").is_ok();
        if writable {
            std::fs::remove_file(dir.join(".touch")).unwrap();
        }
        let (_, loader) = loader(hexlet_fetcher(), LoaderConfig::default());
        let request = PageRequest::new("https://ru.hexlet.io/courses", &dir).unwrap();

        let result = loader.load(&request).await;

        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();
        if writable {
            let saved = result.unwrap();
            assert!(saved.saved_page_path.exists());
        } else {
            let err = result.unwrap_err();
            assert!(matches!(err, LoadError::AssetsFolder { .. }), "{err}");
            assert_eq!(err.io_kind(), Some(io::ErrorKind::PermissionDenied));
        }
    }

    #[tokio::test]
    async fn test_second_load_with_assets_fails_on_existing_folder() {
        let temp = TempDir::new().unwrap();
        let (_, loader) = loader(hexlet_fetcher(), LoaderConfig::default());
        let request = PageRequest::new("https://ru.hexlet.io/courses", temp.path()).unwrap();

        loader.load(&request).await.unwrap();
        let err = loader.load(&request).await.unwrap_err();

        assert!(matches!(err, LoadError::AssetsFolder { .. }));
        assert_eq!(err.io_kind(), Some(io::ErrorKind::AlreadyExists));
    }

    #[tokio::test]
    async fn test_second_load_without_assets_fails_on_existing_page() {
        let temp = TempDir::new().unwrap();
        let (_, loader) = loader(
            MemoryFetcher::default().with("https://duckduckgo.com/", b"<p>hi</p>"),
            LoaderConfig::default(),
        );
        let request = PageRequest::new("https://duckduckgo.com/", temp.path()).unwrap();

        loader.load(&request).await.unwrap();
        let err = loader.load(&request).await.unwrap_err();

        assert!(matches!(err, LoadError::WritePage { .. }));
        assert_eq!(err.io_kind(), Some(io::ErrorKind::AlreadyExists));
    }

    #[tokio::test]
    async fn test_page_fetch_failure_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let (_, loader) = loader(MemoryFetcher::default(), LoaderConfig::default());
        let request = PageRequest::new("https://x.test/gone", temp.path()).unwrap();

        let err = loader.load(&request).await.unwrap_err();

        assert_eq!(err.fetch_error().and_then(FetchError::status), Some(404));
        assert!(err.to_string().contains("404"));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_asset_failures_are_aggregated() {
        let temp = TempDir::new().unwrap();
        let page = r#"<html><body><img src="/ok.png"><img src="/missing.png"></body></html>"#;
        let fetcher = MemoryFetcher::default()
            .with("https://x.test/", page.as_bytes())
            .with("https://x.test/ok.png", b"ok");
        let (_, loader) = loader(fetcher, LoaderConfig::default());
        let request = PageRequest::new("https://x.test/", temp.path()).unwrap();

        let err = loader.load(&request).await.unwrap_err();

        match err {
            LoadError::Assets { failed, total, failures } => {
                assert_eq!((failed, total), (1, 2));
                assert_eq!(failures[0].url.as_str(), "https://x.test/missing.png");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(temp.path().join("x-test.html").exists());
        assert!(temp.path().join("x-test_files/x-test-ok.png").exists());
    }

    #[tokio::test]
    async fn test_asset_failures_can_be_tolerated() {
        let temp = TempDir::new().unwrap();
        let page = r#"<html><body><img src="/ok.png"><img src="/missing.png"></body></html>"#;
        let fetcher = MemoryFetcher::default()
            .with("https://x.test/", page.as_bytes())
            .with("https://x.test/ok.png", b"ok");
        let (_, loader) = loader(fetcher, LoaderConfig::default().with_fail_on_asset_error(false));
        let request = PageRequest::new("https://x.test/", temp.path()).unwrap();

        let result = loader.load(&request).await.unwrap();

        assert_eq!(result.assets_downloaded, 1);
        assert_eq!(result.asset_failures.len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_asset_is_downloaded_once() {
        let temp = TempDir::new().unwrap();
        let page = r#"<html><body><img src="/a.png"><img src="https://x.test/a.png"></body></html>"#;
        let fetcher = MemoryFetcher::default()
            .with("https://x.test/", page.as_bytes())
            .with("https://x.test/a.png", b"png");
        let (fetcher, loader) = loader(fetcher, LoaderConfig::default());
        let request = PageRequest::new("https://x.test/", temp.path()).unwrap();

        let result = loader.load(&request).await.unwrap();

        assert_eq!(result.assets_downloaded, 1);
        let asset_requests = fetcher
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.ends_with("a.png"))
            .count();
        assert_eq!(asset_requests, 1);
    }
}
