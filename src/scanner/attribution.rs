//! Maps a file to the resource that owns it.
//!
//! Resource trees either nest resources under an explicit `resources`
//! directory or group them in `[category]` directories. The checks run in
//! that order so category-level files are not attributed to an arbitrary leaf.

use std::path::{Component, Path};

use crate::models::UNKNOWN_RESOURCE;

/// Directory name whose child is always a resource.
pub const RESOURCE_CONTAINER: &str = "resources";

/// Resource name for a path relative to the scan root.
pub fn resource_name(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let chosen = pick_segment(&parts);
    let cleaned = chosen
        .map(|s| s.trim().trim_matches(|c: char| c == '[' || c == ']').trim())
        .unwrap_or_default();

    if cleaned.is_empty() {
        UNKNOWN_RESOURCE.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Resource name for an absolute path under `root`.
pub fn resource_for(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => resource_name(relative),
        Err(_) => UNKNOWN_RESOURCE.to_string(),
    }
}

fn pick_segment(parts: &[String]) -> Option<&str> {
    if let Some(idx) = parts.iter().position(|p| p == RESOURCE_CONTAINER) {
        if let Some(next) = parts.get(idx + 1) {
            return Some(next.as_str());
        }
    }

    let first = parts.first()?;
    if is_category(first) {
        Some(parts.get(1).unwrap_or(first).as_str())
    } else {
        Some(first.as_str())
    }
}

fn is_category(segment: &str) -> bool {
    segment.starts_with('[') && segment.ends_with(']')
}
