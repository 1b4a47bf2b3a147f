//! Deterministic local names for remote URLs.
//!
//! A name is built from `host + path`, with every character outside
//! `[A-Za-z0-9]` replaced by `-`. File names keep the path's extension (or get
//! `.html`), folder names get `_files`:
//!
//! | URL | File | Folder |
//! |-----|------|--------|
//! | `https://ru.hexlet.io/courses` | `ru-hexlet-io-courses.html` | `ru-hexlet-io-courses_files` |
//! | `https://ru.hexlet.io/assets/app.css` | `ru-hexlet-io-assets-app.css` | `ru-hexlet-io-assets-app_files` |
//! | `https://duckduckgo.com/` | `duckduckgo-com.html` | `duckduckgo-com_files` |
//!
//! The mapping is not injective: `/a/b` and `/a-b` produce the same name.

use url::Url;

/// Extension appended to file names whose path has none.
pub const DEFAULT_EXTENSION: &str = ".html";

/// Suffix appended to folder names.
pub const FOLDER_SUFFIX: &str = "_files";

/// Longest suffix (without the dot) still treated as an extension.
const MAX_EXTENSION_LEN: usize = 10;

/// Which kind of name to derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// A file name ending in an extension.
    File,
    /// A folder name ending in `_files`.
    Folder,
}

/// Maps `url` to a filesystem-safe local name.
///
/// Query string and fragment are ignored. A non-default port is part of the
/// host portion, and trailing slashes in the path are dropped.
#[must_use]
pub fn name_from_url(url: &Url, kind: NameKind) -> String {
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };

    let path = url.path().trim_end_matches('/');
    let (stem, extension) = split_extension(path);
    let base = sanitize(&format!("{host}{stem}"));

    match kind {
        NameKind::File => format!("{base}{}", extension.unwrap_or(DEFAULT_EXTENSION)),
        NameKind::Folder => format!("{base}{FOLDER_SUFFIX}"),
    }
}

/// Maps `url` to a file name; shorthand for [`NameKind::File`].
#[must_use]
pub fn file_name_from_url(url: &Url) -> String {
    name_from_url(url, NameKind::File)
}

/// Maps `url` to an assets folder name; shorthand for [`NameKind::Folder`].
#[must_use]
pub fn folder_name_from_url(url: &Url) -> String {
    name_from_url(url, NameKind::Folder)
}

/// Splits `path` into the part before the extension and the extension with its dot.
fn split_extension(path: &str) -> (&str, Option<&str>) {
    let segment_start = path.rfind('/').map_or(0, |index| index + 1);
    let segment = &path[segment_start..];

    let Some(dot) = segment.rfind('.') else {
        return (path, None);
    };
    let extension = &segment[dot + 1..];
    let valid = dot > 0
        && (1..=MAX_EXTENSION_LEN).contains(&extension.len())
        && extension.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid {
        return (path, None);
    }

    let split_at = segment_start + dot;
    (&path[..split_at], Some(&path[split_at..]))
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
