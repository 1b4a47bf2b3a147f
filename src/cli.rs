//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use page_loader::config::LoaderConfig;
use page_loader::download::{DEFAULT_CONCURRENCY, REQUEST_TIMEOUT_SECS, RetryPolicy};
use page_loader::page::{CollisionPolicy, LoadError, ResourceTags, RewriteStrategy};

/// Download a web page together with its local assets.
///
/// Saves the page under a name derived from its URL, downloads same-origin
/// images, stylesheets, scripts and linked pages into a sibling `_files`
/// folder, and points the saved page at the local copies.
#[derive(Parser, Debug)]
#[command(name = "page-loader")]
#[command(author, version, about)]
pub struct Args {
    /// Page URL (http or https)
    pub url: String,

    /// Output directory (must exist)
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Per-request timeout in seconds (1-600)
    #[arg(short, long, value_name = "SECS", default_value_t = REQUEST_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout: u64,

    /// Retries for transient failures (0-10)
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub retries: u8,

    /// Maximum concurrent asset downloads (1-32)
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub concurrency: u8,

    /// How references are rewritten in the saved page
    #[arg(long, value_enum, default_value_t = RewriteArg::Structural)]
    pub rewrite: RewriteArg,

    /// What to do when two assets map to the same file name
    #[arg(long = "on-collision", value_enum, default_value_t = CollisionArg::Suffix)]
    pub on_collision: CollisionArg,

    /// Extra resource attribute to follow, e.g. `source=srcset` (repeatable)
    #[arg(long = "tag", value_name = "TAG=ATTR", value_parser = parse_tag_attribute)]
    pub tags: Vec<(String, String)>,

    /// Log failed asset downloads instead of failing
    #[arg(long)]
    pub keep_going: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// `--rewrite` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RewriteArg {
    /// Rewrite the attribute of the element each reference came from
    Structural,
    /// Replace the first textual match of each reference
    Literal,
}

impl From<RewriteArg> for RewriteStrategy {
    fn from(arg: RewriteArg) -> Self {
        match arg {
            RewriteArg::Structural => Self::Structural,
            RewriteArg::Literal => Self::Literal,
        }
    }
}

/// `--on-collision` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CollisionArg {
    /// Add a numeric suffix to later assets
    Suffix,
    /// Let the last asset written win
    Overwrite,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(arg: CollisionArg) -> Self {
        match arg {
            CollisionArg::Suffix => Self::Suffix,
            CollisionArg::Overwrite => Self::Overwrite,
        }
    }
}

impl Args {
    /// Default log level implied by `--quiet` and `-v`.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }

    /// Builds the loader configuration from the parsed flags.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidSelector`] if a `--tag` entry is not a
    /// plain element/attribute pair.
    pub fn loader_config(&self) -> Result<LoaderConfig, LoadError> {
        let mut tags = ResourceTags::default();
        for (tag, attribute) in &self.tags {
            tags.push(tag.as_str(), attribute.as_str())?;
        }

        Ok(LoaderConfig::default()
            .with_concurrency(usize::from(self.concurrency))
            .with_retry_policy(RetryPolicy::with_max_attempts(u32::from(self.retries) + 1))
            .with_tags(tags)
            .with_rewrite(self.rewrite.into())
            .with_collisions(self.on_collision.into())
            .with_fail_on_asset_error(!self.keep_going))
    }
}

fn parse_tag_attribute(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((tag, attribute)) if !tag.trim().is_empty() && !attribute.trim().is_empty() => {
            Ok((tag.trim().to_string(), attribute.trim().to_string()))
        }
        _ => Err(format!("expected TAG=ATTR, got '{value}'")),
    }
}
