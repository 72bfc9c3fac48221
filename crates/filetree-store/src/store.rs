use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single child record as reported by a store.
///
/// `path` is the store's identifier for the entry; callers treat it as
/// opaque and feed it back into later store calls unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub name: String,
    pub path: String,
    pub is_container: bool,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no entry at {0:?}")]
    NotFound(String),
    #[error("{0:?} is not a container")]
    NotAContainer(String),
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only hierarchical store capability.
///
/// Paths are `/`-separated virtual paths; the empty string is the logical
/// root. Implementations never mutate the backing store.
pub trait FileStore: Send + Sync {
    /// Whether any entry (container or leaf) exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// The entry at `path`, or `None` when nothing resolves there.
    fn entry(&self, path: &str) -> Result<Option<StoreEntry>, StoreError>;

    /// Immediate children of the container at `path`, non-recursive.
    /// No ordering is guaranteed; callers impose their own.
    fn list_children(&self, path: &str) -> Result<Vec<StoreEntry>, StoreError>;

    /// Cheap probe: does the container at `path` have at least one child?
    /// Must not enumerate more than it needs to answer. Leaf entries
    /// answer `false`.
    fn has_children(&self, path: &str) -> Result<bool, StoreError>;
}

/// Join a virtual parent path and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Normalize a virtual path to its canonical form: `/`-separated segments
/// with no leading, trailing, or repeated separators. `""` and `"/"` both
/// normalize to the root (`""`). Returns `None` when a segment is `..`
/// (escapes are never valid store paths).
pub fn normalize_path(path: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}
