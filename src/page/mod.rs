//! Saving a page with its in-domain assets.
//!
//! The pipeline is split into small stages that can be used on their own:
//!
//! - [`naming`] - deterministic local names for URLs
//! - [`scan`] - in-domain resource references in a document
//! - [`plan`] - where each asset goes and what replaces its reference
//! - [`DocumentRewriter`] - substitution of references with local paths
//! - [`PageLoader`] - the orchestrator tying them together

mod error;
mod loader;
pub mod naming;
mod planner;
mod rewriter;
mod scanner;

pub use error::LoadError;
pub use loader::{LoadResult, PageLoader, PageRequest, load_page};
pub use naming::{NameKind, file_name_from_url, folder_name_from_url, name_from_url};
pub use planner::{AssetPlan, CollisionPolicy, plan};
pub use rewriter::{
    DocumentRewriter, LiteralRewriter, RewriteStrategy, StructuralRewriter,
};
pub use scanner::{ResourceReference, ResourceTags, scan};
