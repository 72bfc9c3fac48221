use std::collections::BTreeMap;

use crate::store::{join_path, normalize_path, FileStore, StoreEntry, StoreError};

#[derive(Debug, Clone)]
enum Node {
    Container(BTreeMap<String, Node>),
    Leaf,
}

/// In-memory store over a nested map. Used by tests and demos; the
/// builder creates intermediate containers on demand.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    root: BTreeMap<String, Node>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leaf entry, creating intermediate containers.
    pub fn with_file(mut self, path: &str) -> Self {
        self.insert(path, Node::Leaf);
        self
    }

    /// Add an (empty) container entry, creating intermediate containers.
    pub fn with_container(mut self, path: &str) -> Self {
        self.insert(path, Node::Container(BTreeMap::new()));
        self
    }

    fn insert(&mut self, path: &str, node: Node) {
        let path = normalize_path(path).expect("valid path in builder");
        let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
        let mut current = &mut self.root;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                current.insert(segment.to_string(), node);
                return;
            }
            let next = current
                .entry(segment.to_string())
                .or_insert_with(|| Node::Container(BTreeMap::new()));
            current = match next {
                Node::Container(map) => map,
                Node::Leaf => panic!("{:?} is a leaf, cannot nest under it", segment),
            };
        }
    }

    /// `Ok(None)` means the path does not resolve; the root resolves to a
    /// virtual container over the top-level map.
    fn find(&self, path: &str) -> Option<Option<&Node>> {
        let path = normalize_path(path)?;
        if path.is_empty() {
            return Some(None);
        }
        let mut current = &self.root;
        let mut segments = path.split('/').peekable();
        while let Some(segment) = segments.next() {
            let node = current.get(segment)?;
            if segments.peek().is_none() {
                return Some(Some(node));
            }
            current = match node {
                Node::Container(map) => map,
                Node::Leaf => return None,
            };
        }
        None
    }

    fn children_of(&self, path: &str) -> Result<&BTreeMap<String, Node>, StoreError> {
        match self.find(path) {
            None => Err(StoreError::NotFound(path.to_string())),
            Some(None) => Ok(&self.root),
            Some(Some(Node::Container(map))) => Ok(map),
            Some(Some(Node::Leaf)) => Err(StoreError::NotAContainer(path.to_string())),
        }
    }
}

impl FileStore for MemoryFileStore {
    fn exists(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    fn entry(&self, path: &str) -> Result<Option<StoreEntry>, StoreError> {
        let normalized = match normalize_path(path) {
            Some(p) => p,
            None => return Ok(None),
        };
        let node = match self.find(&normalized) {
            Some(n) => n,
            None => return Ok(None),
        };
        let name = normalized.rsplit('/').next().unwrap_or("").to_string();
        let is_container = !matches!(node, Some(Node::Leaf));
        Ok(Some(StoreEntry {
            name,
            path: normalized,
            is_container,
        }))
    }

    fn list_children(&self, path: &str) -> Result<Vec<StoreEntry>, StoreError> {
        let normalized =
            normalize_path(path).ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let children = self.children_of(&normalized)?;
        Ok(children
            .iter()
            .map(|(name, node)| StoreEntry {
                name: name.clone(),
                path: join_path(&normalized, name),
                is_container: matches!(node, Node::Container(_)),
            })
            .collect())
    }

    fn has_children(&self, path: &str) -> Result<bool, StoreError> {
        match self.find(path) {
            None => Err(StoreError::NotFound(path.to_string())),
            Some(None) => Ok(!self.root.is_empty()),
            Some(Some(Node::Container(map))) => Ok(!map.is_empty()),
            Some(Some(Node::Leaf)) => Ok(false),
        }
    }
}
