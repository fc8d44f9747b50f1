use std::path::{Path, PathBuf};

use ignore::{DirEntry, WalkBuilder};

use crate::config::ScanSettings;

/// Yields candidate files under a root.
///
/// Directories whose name contains a skip token are pruned without being
/// descended into; symbolic links are never followed.
pub struct FileWalker {
    extensions: Vec<String>,
    skip_dirs: Vec<String>,
}

impl FileWalker {
    pub fn new(settings: &ScanSettings) -> Self {
        Self {
            extensions: settings.extensions.clone(),
            skip_dirs: settings.skip_dirs.clone(),
        }
    }

    /// Lazily walk `root` in file-name order.
    pub fn walk(&self, root: &Path) -> impl Iterator<Item = PathBuf> {
        let skip_dirs = self.skip_dirs.clone();
        let extensions = self.extensions.clone();

        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| !is_pruned(entry, &skip_dirs));

        builder.build().filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Walk error: {}", e);
                    return None;
                }
            };
            let is_file = entry.file_type().is_some_and(|t| t.is_file());
            if is_file && has_extension(entry.path(), &extensions) {
                Some(entry.into_path())
            } else {
                None
            }
        })
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        has_extension(path, &self.extensions)
    }

    pub fn is_skipped_dir(&self, name: &str) -> bool {
        dir_name_matches(name, &self.skip_dirs)
    }
}

fn is_pruned(entry: &DirEntry, skip_dirs: &[String]) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
    is_dir && dir_name_matches(&entry.file_name().to_string_lossy(), skip_dirs)
}

fn dir_name_matches(name: &str, skip_dirs: &[String]) -> bool {
    let lower = name.to_lowercase();
    skip_dirs.iter().any(|token| lower.contains(token.as_str()))
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .is_some_and(|name| extensions.iter().any(|ext| name.ends_with(ext.as_str())))
}
