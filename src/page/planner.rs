//! Turns resource references into download plans.
//!
//! Every plan points into the sibling assets folder by relative path, so the
//! saved document never contains an absolute filesystem path.

use std::collections::HashMap;
use std::path::PathBuf;

use url::Url;

use super::naming::file_name_from_url;
use super::scanner::ResourceReference;

/// How to handle two distinct asset URLs that map to the same local name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Give later URLs a numeric suffix: `name-2.ext`, `name-3.ext`, ...
    #[default]
    Suffix,
    /// Keep the mapped name; the last download written to a path wins.
    Overwrite,
}

/// Where one referenced asset comes from and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPlan {
    /// Absolute URL to download from.
    pub source_url: Url,
    /// Path of the asset relative to the output directory.
    pub local_relative_path: PathBuf,
    /// Text that replaces the reference in the saved document.
    pub html_replacement: String,
}

/// Builds one plan per reference, in reference order.
///
/// References to the same URL share a plan target. With
/// [`CollisionPolicy::Suffix`], a URL whose mapped name is already taken by a
/// different URL gets the first free `-N` suffix.
#[must_use]
pub fn plan(
    references: &[ResourceReference],
    folder_name: &str,
    collisions: CollisionPolicy,
) -> Vec<AssetPlan> {
    let mut assigned: HashMap<Url, String> = HashMap::new();
    let mut taken: HashMap<String, Url> = HashMap::new();

    references
        .iter()
        .map(|reference| {
            let url = &reference.resolved_url;
            let file_name = match assigned.get(url) {
                Some(name) => name.clone(),
                None => {
                    let mapped = file_name_from_url(url);
                    let name = match collisions {
                        CollisionPolicy::Overwrite => mapped,
                        CollisionPolicy::Suffix => first_free_name(&mapped, url, &taken),
                    };
                    assigned.insert(url.clone(), name.clone());
                    taken.entry(name.clone()).or_insert_with(|| url.clone());
                    name
                }
            };

            AssetPlan {
                source_url: url.clone(),
                local_relative_path: PathBuf::from(folder_name).join(&file_name),
                html_replacement: format!("{folder_name}/{file_name}"),
            }
        })
        .collect()
}

fn first_free_name(mapped: &str, url: &Url, taken: &HashMap<String, Url>) -> String {
    if taken.get(mapped).is_none_or(|owner| owner == url) {
        return mapped.to_string();
    }

    let (stem, extension) = mapped
        .rfind('.')
        .map_or((mapped, ""), |dot| mapped.split_at(dot));
    (2..)
        .map(|n| format!("{stem}-{n}{extension}"))
        .find(|candidate| !taken.contains_key(candidate))
        .unwrap_or_else(|| mapped.to_string())
}
