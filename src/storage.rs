//! Physical storage for matters.
//!
//! Every space keeps its tree under its own directory:
//! ```text
//! {matter_path}/
//! └── {space_uuid}/
//!     └── root/
//!         ├── docs/
//!         │   └── a.txt
//!         └── b.bin
//! ```
//! Disk state is derived from the matter rows. Removal here is best-effort
//! and runs only after the row deletion has committed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::matter::Matter;
use crate::Result;

/// Filesystem operations the store needs.
pub trait Filesystem: Send + Sync {
    /// Whether the path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Remove a file. Returns `false` if it did not exist.
    fn remove_file(&self, path: &Path) -> io::Result<bool>;

    /// Remove a directory if it holds nothing but empty directories.
    ///
    /// Returns the number of directories removed.
    fn remove_empty_dir(&self, path: &Path) -> io::Result<usize>;

    /// Move a file or directory, creating the destination's parents.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// [`Filesystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove_file(&self, path: &Path) -> io::Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn remove_empty_dir(&self, path: &Path) -> io::Result<usize> {
        if !path.is_dir() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut has_content = false;
        for entry in fs::read_dir(path)? {
            let child = entry?.path();
            if child.is_dir() {
                removed += self.remove_empty_dir(&child)?;
                if child.exists() {
                    has_content = true;
                }
            } else {
                has_content = true;
            }
        }

        if !has_content {
            fs::remove_dir(path)?;
            removed += 1;
        }
        Ok(removed)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(from, to)
    }
}

/// Maps matters onto their on-disk location.
#[derive(Clone)]
pub struct MatterStorage {
    base_path: PathBuf,
    fs: Arc<dyn Filesystem>,
}

impl MatterStorage {
    /// Create storage rooted at `base_path`, creating the directory if needed.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            fs: Arc::new(LocalFilesystem),
        })
    }

    /// Replace the filesystem implementation.
    pub fn with_filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding a space's tree.
    pub fn space_root(&self, space_uuid: &str) -> PathBuf {
        self.base_path.join(space_uuid).join("root")
    }

    /// Absolute location of a matter.
    pub fn absolute_path(&self, matter: &Matter) -> PathBuf {
        self.path_for(&matter.space_uuid, &matter.path)
    }

    /// Absolute location of a materialized path inside a space.
    pub fn path_for(&self, space_uuid: &str, matter_path: &str) -> PathBuf {
        let mut path = self.space_root(space_uuid);
        for segment in matter_path.split('/').filter(|s| !s.is_empty() && *s != "..") {
            path.push(segment);
        }
        path
    }

    /// Whether the matter's backing entry exists.
    pub fn exists(&self, matter: &Matter) -> bool {
        self.fs.exists(&self.absolute_path(matter))
    }

    /// Unlink a file's backing blob.
    ///
    /// Failures are logged and swallowed; the row deletion is authoritative.
    pub fn unlink(&self, matter: &Matter) -> bool {
        let path = self.absolute_path(matter);
        match self.fs.remove_file(&path) {
            Ok(true) => true,
            Ok(false) => {
                debug!(matter = %matter.uuid, "backing file already absent: {:?}", path);
                false
            }
            Err(e) => {
                error!(matter = %matter.uuid, "failed to delete file {:?}: {}", path, e);
                false
            }
        }
    }

    /// Remove a directory's now-empty backing directory, if present.
    pub fn remove_dir(&self, matter: &Matter) -> usize {
        let path = self.absolute_path(matter);
        if !self.fs.exists(&path) {
            return 0;
        }
        match self.fs.remove_empty_dir(&path) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(matter = %matter.uuid, "failed to remove directory {:?}: {}", path, e);
                0
            }
        }
    }

    /// Move a backing entry after a relocation. Missing sources are ignored.
    pub fn relocate(&self, space_uuid: &str, old_path: &str, new_path: &str) -> bool {
        let from = self.path_for(space_uuid, old_path);
        if !self.fs.exists(&from) {
            return false;
        }
        let to = self.path_for(space_uuid, new_path);
        match self.fs.rename(&from, &to) {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to move {:?} to {:?}: {}", from, to, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for MatterStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatterStorage")
            .field("base_path", &self.base_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_storage() -> (TempDir, MatterStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = MatterStorage::new(temp_dir.path()).unwrap();
        (temp_dir, storage)
    }

    fn file_matter(path: &str) -> Matter {
        let mut m = Matter::root("space", "user");
        m.uuid = "m1".into();
        m.dir = false;
        m.path = path.into();
        m
    }

    #[test]
    fn test_new_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let storage_path = temp_dir.path().join("storage");
        assert!(!storage_path.exists());

        let storage = MatterStorage::new(&storage_path).unwrap();

        assert!(storage_path.exists());
        assert_eq!(storage.base_path(), storage_path);
    }

    #[test]
    fn test_absolute_path() {
        let (_temp_dir, storage) = setup_storage();
        let matter = file_matter("/docs/a.txt");

        assert_eq!(
            storage.absolute_path(&matter),
            storage
                .base_path()
                .join("space")
                .join("root")
                .join("docs")
                .join("a.txt")
        );
    }

    #[test]
    fn test_absolute_path_ignores_parent_segments() {
        let (_temp_dir, storage) = setup_storage();
        let matter = file_matter("/../../etc/passwd");

        assert!(storage
            .absolute_path(&matter)
            .starts_with(storage.space_root("space")));
    }

    #[test]
    fn test_unlink() {
        let (_temp_dir, storage) = setup_storage();
        let matter = file_matter("/a.txt");
        let path = storage.absolute_path(&matter);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"data").unwrap();
        assert!(storage.exists(&matter));

        assert!(storage.unlink(&matter));
        assert!(!storage.exists(&matter));
        assert!(!storage.unlink(&matter));
    }

    #[test]
    fn test_remove_dir_keeps_non_empty() {
        let (_temp_dir, storage) = setup_storage();
        let mut dir = file_matter("/docs");
        dir.dir = true;
        let dir_path = storage.absolute_path(&dir);
        fs::create_dir_all(dir_path.join("empty").join("deeper")).unwrap();
        fs::write(dir_path.join("keep.txt"), b"x").unwrap();

        assert_eq!(storage.remove_dir(&dir), 2);
        assert!(dir_path.exists());
        assert!(!dir_path.join("empty").exists());

        fs::remove_file(dir_path.join("keep.txt")).unwrap();
        assert_eq!(storage.remove_dir(&dir), 1);
        assert!(!dir_path.exists());
    }

    #[test]
    fn test_relocate() {
        let (_temp_dir, storage) = setup_storage();
        let from = storage.path_for("space", "/a.txt");
        fs::create_dir_all(from.parent().unwrap()).unwrap();
        fs::write(&from, b"x").unwrap();

        assert!(storage.relocate("space", "/a.txt", "/sub/b.txt"));
        assert!(!from.exists());
        assert!(storage.path_for("space", "/sub/b.txt").exists());
        assert!(!storage.relocate("space", "/missing", "/other"));
    }

    struct FailingFs;

    impl Filesystem for FailingFs {
        fn exists(&self, _: &Path) -> bool {
            true
        }
        fn remove_file(&self, _: &Path) -> io::Result<bool> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
        fn remove_empty_dir(&self, _: &Path) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
        fn rename(&self, _: &Path, _: &Path) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[test]
    fn test_failures_are_swallowed() {
        let (_temp_dir, storage) = setup_storage();
        let storage = storage.with_filesystem(Arc::new(FailingFs));
        let matter = file_matter("/a.txt");

        assert!(!storage.unlink(&matter));
        assert_eq!(storage.remove_dir(&matter), 0);
        assert!(!storage.relocate("space", "/a", "/b"));
    }
}
