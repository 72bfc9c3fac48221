use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::store::{join_path, normalize_path, FileStore, StoreEntry, StoreError};

/// Store over a directory on local disk.
///
/// Virtual paths are resolved strictly under the root; a path that would
/// escape the root does not resolve to anything.
pub struct PhysicalFileStore {
    root: PathBuf,
}

impl PhysicalFileStore {
    /// Open a store rooted at `root`. The directory must already exist.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let meta = fs::metadata(&root)
            .map_err(|e| map_not_found(e, &root.display().to_string()))?;
        if !meta.is_dir() {
            return Err(StoreError::NotAContainer(root.display().to_string()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<(String, PathBuf), StoreError> {
        let virtual_path =
            normalize_path(path).ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let mut disk = self.root.clone();
        for segment in virtual_path.split('/').filter(|s| !s.is_empty()) {
            disk.push(segment);
        }
        Ok((virtual_path, disk))
    }

    fn to_entry(virtual_path: &str, meta: &fs::Metadata) -> StoreEntry {
        let name = virtual_path
            .rsplit('/')
            .next()
            .unwrap_or(virtual_path)
            .to_string();
        StoreEntry {
            name,
            path: virtual_path.to_string(),
            is_container: meta.is_dir(),
        }
    }
}

impl FileStore for PhysicalFileStore {
    fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok((_, disk)) => disk.exists(),
            Err(_) => false,
        }
    }

    fn entry(&self, path: &str) -> Result<Option<StoreEntry>, StoreError> {
        let (virtual_path, disk) = match self.resolve(path) {
            Ok(resolved) => resolved,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        match fs::metadata(&disk) {
            Ok(meta) => Ok(Some(Self::to_entry(&virtual_path, &meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn list_children(&self, path: &str) -> Result<Vec<StoreEntry>, StoreError> {
        let (virtual_path, disk) = self.resolve(path)?;
        let meta = fs::metadata(&disk).map_err(|e| map_not_found(e, &virtual_path))?;
        if !meta.is_dir() {
            return Err(StoreError::NotAContainer(virtual_path));
        }

        let mut result = Vec::new();
        for entry in fs::read_dir(&disk)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("skipping dir entry under {:?}: {}", virtual_path, e);
                    continue;
                }
            };
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(e) => {
                    warn!("skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().to_string();
            result.push(StoreEntry {
                path: join_path(&virtual_path, &name),
                name,
                is_container: file_type.is_dir(),
            });
        }
        Ok(result)
    }

    fn has_children(&self, path: &str) -> Result<bool, StoreError> {
        let (virtual_path, disk) = self.resolve(path)?;
        let meta = fs::metadata(&disk).map_err(|e| map_not_found(e, &virtual_path))?;
        if !meta.is_dir() {
            return Ok(false);
        }
        // Reading a single entry is enough to answer.
        Ok(fs::read_dir(&disk)?.next().is_some())
    }
}

fn map_not_found(e: io::Error, path: &str) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(path.to_string())
    } else {
        StoreError::Io(e)
    }
}
