//! Discovery of in-domain resource references in an HTML document.
//!
//! Which attribute to inspect per tag is data ([`ResourceTags`]), not code.
//! Results are ordered by tag-map entry first, then by document order within
//! each entry.
//!
//! Elements are enumerated with the same streaming tokenizer the structural
//! rewriter uses, so a reference's `position` names the same element in both
//! stages.

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;

use html_escape::decode_html_entities;
use lol_html::html_content::Element;
use lol_html::{ElementContentHandlers, HandlerResult, HtmlRewriter, Selector, Settings};
use tracing::debug;
use url::Url;

use super::error::LoadError;

/// Ordered tag → attribute map describing where resources are referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTags {
    entries: Vec<(String, String)>,
}

impl Default for ResourceTags {
    /// `img[src]`, `link[href]`, `script[src]`.
    fn default() -> Self {
        Self {
            entries: vec![
                ("img".to_string(), "src".to_string()),
                ("link".to_string(), "href".to_string()),
                ("script".to_string(), "src".to_string()),
            ],
        }
    }
}

impl ResourceTags {
    /// Builds a map from `(tag, attribute)` pairs, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidSelector`] if a tag or attribute name is
    /// empty or contains characters other than ASCII alphanumerics and `-`.
    pub fn new<I, T, A>(entries: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (T, A)>,
        T: Into<String>,
        A: Into<String>,
    {
        let mut tags = Self {
            entries: Vec::new(),
        };
        for (tag, attribute) in entries {
            tags.push(tag, attribute)?;
        }
        Ok(tags)
    }

    /// Appends an entry. Duplicate entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidSelector`] for names that are not plain
    /// element or attribute names.
    pub fn push(
        &mut self,
        tag: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Result<(), LoadError> {
        let tag = tag.into().to_ascii_lowercase();
        let attribute = attribute.into().to_ascii_lowercase();
        if !is_plain_name(&tag) || !is_plain_name(&attribute) {
            return Err(LoadError::invalid_selector(
                format!("{tag}[{attribute}]"),
                "tag and attribute names must be ASCII alphanumerics or '-'",
            ));
        }
        if !self.entries.iter().any(|(t, a)| *t == tag && *a == attribute) {
            self.entries.push((tag, attribute));
        }
        Ok(())
    }

    /// Iterates `(tag, attribute)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(tag, attribute)| (tag.as_str(), attribute.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// One in-domain resource reference found in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    /// Element name, lowercase.
    pub tag: String,
    /// Attribute holding the reference.
    pub attribute: String,
    /// The attribute value as written (may be relative).
    pub raw_value: String,
    /// Absolute URL after resolving `raw_value` against the page URL.
    pub resolved_url: Url,
    /// Zero-based index among all `tag[attribute]` elements in document order.
    pub position: usize,
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} {}=\"{}\"> -> {}",
            self.tag, self.attribute, self.raw_value, self.resolved_url
        )
    }
}

/// Parses the `tag[attribute]` selector for one tag-map entry.
pub(super) fn element_selector(tag: &str, attribute: &str) -> Result<Selector, LoadError> {
    let css = format!("{tag}[{attribute}]");
    css.parse()
        .map_err(|e| LoadError::invalid_selector(&css, format!("{e}")))
}

/// Returns the in-domain resource references of `html`.
///
/// Values are entity-decoded and resolved against `page_url`; absolute
/// `http(s)` values are used as-is. Only references whose origin (scheme,
/// host, port) equals the page's origin are returned. Empty and
/// fragment-only values are skipped. `raw_value` keeps the attribute text as
/// written in the source.
///
/// # Errors
///
/// Returns [`LoadError::InvalidSelector`] if a tag-map entry does not form a
/// valid selector, or [`LoadError::Scan`] if the document cannot be
/// tokenized.
pub fn scan(
    html: &str,
    page_url: &Url,
    tags: &ResourceTags,
) -> Result<Vec<ResourceReference>, LoadError> {
    let found: Vec<RefCell<Vec<String>>> = tags.iter().map(|_| RefCell::default()).collect();

    let mut handlers = Vec::with_capacity(tags.len());
    for ((tag, attribute), values) in tags.iter().zip(&found) {
        handlers.push((
            Cow::Owned(element_selector(tag, attribute)?),
            ElementContentHandlers::default().element(collect_attribute(attribute, values)),
        ));
    }

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |_: &[u8]| {},
    );
    rewriter
        .write(html.as_bytes())
        .map_err(|e| LoadError::scan(e.to_string()))?;
    rewriter.end().map_err(|e| LoadError::scan(e.to_string()))?;

    let origin = page_url.origin();
    let mut references = Vec::new();
    for ((tag, attribute), values) in tags.iter().zip(found) {
        for (position, raw_value) in values.into_inner().into_iter().enumerate() {
            let decoded = decode_html_entities(&raw_value).into_owned();
            let trimmed = decoded.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Ok(resolved_url) = page_url.join(trimmed) else {
                debug!(tag, attribute, value = %raw_value, "unresolvable reference skipped");
                continue;
            };
            if resolved_url.origin() != origin {
                debug!(url = %resolved_url, "cross-domain reference left untouched");
                continue;
            }

            references.push(ResourceReference {
                tag: tag.to_string(),
                attribute: attribute.to_string(),
                raw_value,
                resolved_url,
                position,
            });
        }
    }

    debug!(count = references.len(), "in-domain references found");
    Ok(references)
}

/// Records the attribute value of every matching element, in document order.
fn collect_attribute<'h>(
    attribute: &'h str,
    values: &'h RefCell<Vec<String>>,
) -> impl FnMut(&mut Element<'_, '_>) -> HandlerResult + 'h {
    move |element| {
        values
            .borrow_mut()
            .push(element.get_attribute(attribute).unwrap_or_default());
        Ok(())
    }
}
