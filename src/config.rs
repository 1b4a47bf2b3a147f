//! Configuration for a page load.

use crate::download::{DEFAULT_CONCURRENCY, RetryPolicy};
use crate::page::{CollisionPolicy, ResourceTags, RewriteStrategy};

/// Settings that shape how [`crate::page::PageLoader`] saves a page.
///
/// ```
/// use page_loader::config::LoaderConfig;
/// use page_loader::page::RewriteStrategy;
///
/// let config = LoaderConfig::default()
///     .with_concurrency(4)
///     .with_rewrite(RewriteStrategy::Literal);
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Maximum simultaneous asset downloads (1-32).
    pub concurrency: usize,
    /// Retry policy for the page and every asset.
    pub retry_policy: RetryPolicy,
    /// Tag → attribute map the scanner inspects.
    pub tags: ResourceTags,
    /// How references are substituted in the saved document.
    pub rewrite: RewriteStrategy,
    /// How colliding asset names are resolved.
    pub collisions: CollisionPolicy,
    /// Whether any failed asset download fails the whole load.
    pub fail_on_asset_error: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry_policy: RetryPolicy::default(),
            tags: ResourceTags::default(),
            rewrite: RewriteStrategy::default(),
            collisions: CollisionPolicy::default(),
            fail_on_asset_error: true,
        }
    }
}

impl LoaderConfig {
    /// Sets the asset download concurrency.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Replaces the resource tag map.
    #[must_use]
    pub fn with_tags(mut self, tags: ResourceTags) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the rewrite strategy.
    #[must_use]
    pub fn with_rewrite(mut self, rewrite: RewriteStrategy) -> Self {
        self.rewrite = rewrite;
        self
    }

    /// Sets the collision policy.
    #[must_use]
    pub fn with_collisions(mut self, collisions: CollisionPolicy) -> Self {
        self.collisions = collisions;
        self
    }

    /// Sets whether asset failures fail the load.
    #[must_use]
    pub fn with_fail_on_asset_error(mut self, fail: bool) -> Self {
        self.fail_on_asset_error = fail;
        self
    }
}
