//! Substitution of resource references with local paths.
//!
//! Two strategies sit behind [`DocumentRewriter`]:
//!
//! - [`StructuralRewriter`] edits the attribute of the exact element a
//!   reference came from, identified by `(tag, attribute, position)`, with a
//!   streaming HTML rewriter. Text content and other attributes are never
//!   touched.
//! - [`LiteralRewriter`] replaces the first occurrence of each raw value in
//!   the current working copy, in reference order. Identical text elsewhere in
//!   the document can be altered too.

use std::borrow::Cow;
use std::cell::Cell;
use std::collections::HashMap;

use lol_html::html_content::Element;
use lol_html::{ElementContentHandlers, HandlerResult, HtmlRewriter, Settings};
use tracing::{debug, warn};

use super::error::LoadError;
use super::planner::AssetPlan;
use super::scanner::{ResourceReference, element_selector};

/// Rewrites a document so that references point at planned local paths.
///
/// `references` and `plans` are parallel: `plans[i]` belongs to
/// `references[i]`.
pub trait DocumentRewriter: Send + Sync {
    /// Returns the rewritten document.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Rewrite`] if the inputs are inconsistent or the
    /// document cannot be processed.
    fn rewrite(
        &self,
        html: &str,
        references: &[ResourceReference],
        plans: &[AssetPlan],
    ) -> Result<String, LoadError>;
}

/// Which rewriter a load uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RewriteStrategy {
    /// Attribute-aware rewriting keyed by element position.
    #[default]
    Structural,
    /// First-match string replacement.
    Literal,
}

impl RewriteStrategy {
    /// Builds the rewriter for this strategy.
    #[must_use]
    pub fn rewriter(self) -> Box<dyn DocumentRewriter> {
        match self {
            Self::Structural => Box::new(StructuralRewriter),
            Self::Literal => Box::new(LiteralRewriter),
        }
    }
}

fn check_parallel(references: &[ResourceReference], plans: &[AssetPlan]) -> Result<(), LoadError> {
    if references.len() == plans.len() {
        Ok(())
    } else {
        Err(LoadError::rewrite(format!(
            "{} references but {} plans",
            references.len(),
            plans.len()
        )))
    }
}

/// First-match literal string replacement.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralRewriter;

impl DocumentRewriter for LiteralRewriter {
    fn rewrite(
        &self,
        html: &str,
        references: &[ResourceReference],
        plans: &[AssetPlan],
    ) -> Result<String, LoadError> {
        check_parallel(references, plans)?;

        let mut document = html.to_string();
        for (reference, plan) in references.iter().zip(plans) {
            if !document.contains(&reference.raw_value) {
                debug!(value = %reference.raw_value, "raw value no longer present");
                continue;
            }
            document = document.replacen(&reference.raw_value, &plan.html_replacement, 1);
        }
        Ok(document)
    }
}

/// Attribute rewriting on the element each reference was found on.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralRewriter;

/// Planned edits per `(tag, attribute)`: position → (raw value, replacement).
type Replacements = HashMap<(String, String), HashMap<usize, (String, String)>>;

impl DocumentRewriter for StructuralRewriter {
    fn rewrite(
        &self,
        html: &str,
        references: &[ResourceReference],
        plans: &[AssetPlan],
    ) -> Result<String, LoadError> {
        check_parallel(references, plans)?;
        if references.is_empty() {
            return Ok(html.to_string());
        }

        let mut replacements = Replacements::new();
        for (reference, plan) in references.iter().zip(plans) {
            replacements
                .entry((reference.tag.clone(), reference.attribute.clone()))
                .or_default()
                .insert(
                    reference.position,
                    (reference.raw_value.clone(), plan.html_replacement.clone()),
                );
        }

        let applied = Cell::new(0usize);
        let mut handlers = Vec::with_capacity(replacements.len());
        for ((tag, attribute), by_position) in replacements {
            handlers.push((
                Cow::Owned(element_selector(&tag, &attribute)?),
                ElementContentHandlers::default().element(replace_attribute(
                    attribute,
                    by_position,
                    &applied,
                )),
            ));
        }

        let mut output = Vec::with_capacity(html.len());
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: handlers,
                ..Settings::default()
            },
            |chunk: &[u8]| output.extend_from_slice(chunk),
        );
        rewriter
            .write(html.as_bytes())
            .map_err(|e| LoadError::rewrite(e.to_string()))?;
        rewriter
            .end()
            .map_err(|e| LoadError::rewrite(e.to_string()))?;

        if applied.get() == references.len() {
            debug!(applied = applied.get(), "attributes rewritten");
        } else {
            warn!(
                applied = applied.get(),
                planned = references.len(),
                "some references were not found at their recorded position and keep their remote value"
            );
        }
        String::from_utf8(output).map_err(|e| LoadError::rewrite(e.to_string()))
    }
}

/// Handler for one `tag[attribute]` selector; counts matches in document
/// order and rewrites the ones that have a planned replacement, provided the
/// element still carries the value the reference was read from.
fn replace_attribute<'h>(
    attribute: String,
    by_position: HashMap<usize, (String, String)>,
    applied: &'h Cell<usize>,
) -> impl FnMut(&mut Element<'_, '_>) -> HandlerResult + 'h {
    let mut position = 0usize;
    move |element| {
        if let Some((raw_value, replacement)) = by_position.get(&position) {
            if element.get_attribute(&attribute).as_deref() == Some(raw_value.as_str()) {
                element.set_attribute(&attribute, replacement)?;
                applied.set(applied.get() + 1);
            }
        }
        position += 1;
        Ok(())
    }
}
