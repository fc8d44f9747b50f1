use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::Result;

/// Timestamped directory holding the original bytes of every rewritten file.
///
/// Files are stored flat under their basename; a later file with the same
/// basename becomes `{stem}_{n}{ext}`.
pub struct BackupStore {
    dir: PathBuf,
    taken: HashSet<PathBuf>,
}

impl BackupStore {
    /// Create `{root}/{YYYYMMDD_HHMMSS}`.
    pub fn create(root: &Path, started: DateTime<Local>) -> Result<Self> {
        let dir = root.join(started.format("%Y%m%d_%H%M%S").to_string());
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            taken: HashSet::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `original` for `source` and return where it went.
    pub fn store(&mut self, source: &Path, original: &[u8]) -> Result<PathBuf> {
        let target = self.free_name(source);
        fs::write(&target, original)?;
        self.taken.insert(target.clone());
        Ok(target)
    }

    fn free_name(&self, source: &Path) -> PathBuf {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let candidate = self.dir.join(&name);
        if !self.is_taken(&candidate) {
            return candidate;
        }

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        (1..)
            .map(|n| self.dir.join(format!("{}_{}{}", stem, n, ext)))
            .find(|p| !self.is_taken(p))
            .unwrap_or(candidate)
    }

    fn is_taken(&self, path: &Path) -> bool {
        self.taken.contains(path) || path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_directory_is_timestamped() {
        let dir = TempDir::new().unwrap();
        let store = BackupStore::create(dir.path(), started()).unwrap();
        assert_eq!(store.dir(), dir.path().join("20240309_140507"));
        assert!(store.dir().is_dir());
    }

    #[test]
    fn test_store_keeps_bytes() {
        let dir = TempDir::new().unwrap();
        let mut store = BackupStore::create(dir.path(), started()).unwrap();

        let original = b"local url = 'x'\n\xff";
        let path = store.store(Path::new("/srv/res/shop/config.lua"), original).unwrap();

        assert_eq!(path.file_name().unwrap(), "config.lua");
        assert_eq!(fs::read(path).unwrap(), original);
    }

    #[test]
    fn test_collisions_get_numeric_suffix() {
        let dir = TempDir::new().unwrap();
        let mut store = BackupStore::create(dir.path(), started()).unwrap();

        let a = store.store(Path::new("/srv/a/config.lua"), b"a").unwrap();
        let b = store.store(Path::new("/srv/b/config.lua"), b"b").unwrap();
        let c = store.store(Path::new("/srv/c/config.lua"), b"c").unwrap();
        let d = store.store(Path::new("/srv/d/.env"), b"d").unwrap();
        let e = store.store(Path::new("/srv/e/.env"), b"e").unwrap();

        assert_eq!(a.file_name().unwrap(), "config.lua");
        assert_eq!(b.file_name().unwrap(), "config_1.lua");
        assert_eq!(c.file_name().unwrap(), "config_2.lua");
        assert_eq!(d.file_name().unwrap(), ".env");
        assert_eq!(e.file_name().unwrap(), ".env_1");
        assert_eq!(fs::read(b).unwrap(), b"b");
    }

    #[test]
    fn test_existing_files_from_same_second_are_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let mut first = BackupStore::create(dir.path(), started()).unwrap();
        first.store(Path::new("/srv/a/config.lua"), b"first").unwrap();

        let mut second = BackupStore::create(dir.path(), started()).unwrap();
        let path = second.store(Path::new("/srv/a/config.lua"), b"second").unwrap();

        assert_eq!(path.file_name().unwrap(), "config_1.lua");
        assert_eq!(fs::read(first.dir().join("config.lua")).unwrap(), b"first");
    }
}
