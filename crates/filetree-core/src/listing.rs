use std::sync::Arc;
use std::time::Instant;

use filetree_store::store::normalize_path;
use filetree_store::{FileStore, StoreEntry, StoreError};

use crate::cancel::CancelToken;
use crate::error::TreeError;
use crate::instrument::{ListingObserver, NoopObserver, Outcome, TreeOp};
use crate::protocol::{Page, TreeItem};

pub const ICON_FOLDER: &str = "icon-folder";
pub const ICON_DOCUMENT: &str = "icon-document";

/// Upper bound on `take` unless configured otherwise.
pub const DEFAULT_MAX_TAKE: u64 = 1000;

/// Paginated tree listing over a [`FileStore`].
///
/// A pure read projection: nothing here mutates the store, and every
/// request builds its page fresh from the store's current state.
pub struct TreeService {
    store: Box<dyn FileStore>,
    max_take: u64,
    observer: Arc<dyn ListingObserver>,
}

impl TreeService {
    pub fn new(store: Box<dyn FileStore>) -> Self {
        Self {
            store,
            max_take: DEFAULT_MAX_TAKE,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_max_take(mut self, max_take: u64) -> Self {
        self.max_take = max_take.max(1);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ListingObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// One page of the logical root's children.
    pub fn root(
        &self,
        skip: u64,
        take: u64,
        cancel: &CancelToken,
    ) -> Result<Page<TreeItem>, TreeError> {
        self.run(TreeOp::Root, "", |s| s.children_inner("", skip, take, cancel))
    }

    /// One page of the immediate children of the container at `path`.
    ///
    /// Ordering is fixed: containers first, then case-insensitive by name.
    /// `total` is the full child count; `items` is the `skip`/`take`
    /// window over that ordered sequence.
    pub fn children(
        &self,
        path: &str,
        skip: u64,
        take: u64,
        cancel: &CancelToken,
    ) -> Result<Page<TreeItem>, TreeError> {
        self.run(TreeOp::Children, path, |s| {
            s.children_inner(path, skip, take, cancel)
        })
    }

    /// Descriptors for explicitly named paths. Paths that do not resolve
    /// are omitted from the result.
    pub fn items(
        &self,
        paths: &[String],
        cancel: &CancelToken,
    ) -> Result<Vec<TreeItem>, TreeError> {
        self.run(TreeOp::Items, "", |s| s.items_inner(paths, cancel))
    }

    fn run<T>(
        &self,
        op: TreeOp,
        path: &str,
        f: impl FnOnce(&Self) -> Result<T, TreeError>,
    ) -> Result<T, TreeError> {
        let started = Instant::now();
        let result = f(self);
        let outcome = match &result {
            Ok(_) => Outcome::Ok,
            Err(e) => outcome_of(e),
        };
        self.observer.observe(op, path, outcome, started.elapsed());
        result
    }

    fn children_inner(
        &self,
        path: &str,
        skip: u64,
        take: u64,
        cancel: &CancelToken,
    ) -> Result<Page<TreeItem>, TreeError> {
        let path = validate_path(path)?;
        let take = self.window_take(take)?;
        cancel.check()?;

        let mut entries = self.store.list_children(&path)?;
        sort_entries(&mut entries);
        let total = entries.len() as u64;

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let mut items = Vec::new();
        for entry in entries.into_iter().skip(skip).take(take) {
            cancel.check()?;
            items.push(self.to_item(entry)?);
        }

        Ok(Page { total, items })
    }

    fn items_inner(
        &self,
        paths: &[String],
        cancel: &CancelToken,
    ) -> Result<Vec<TreeItem>, TreeError> {
        let mut items = Vec::with_capacity(paths.len());
        for raw in paths {
            cancel.check()?;
            let path = validate_path(raw)?;
            match self.store.entry(&path)? {
                Some(entry) => items.push(self.to_item(entry)?),
                None => continue,
            }
        }
        Ok(items)
    }

    fn to_item(&self, entry: StoreEntry) -> Result<TreeItem, TreeError> {
        let has_children = if entry.is_container {
            match self.store.has_children(&entry.path) {
                Ok(b) => b,
                // the entry vanished between listing and probing
                Err(StoreError::NotFound(_)) | Err(StoreError::NotAContainer(_)) => false,
                Err(e) => return Err(e.into()),
            }
        } else {
            false
        };
        let icon = if entry.is_container {
            ICON_FOLDER
        } else {
            ICON_DOCUMENT
        };
        Ok(TreeItem {
            name: entry.name,
            path: entry.path,
            has_children,
            icon: Some(icon.to_string()),
        })
    }

    fn window_take(&self, take: u64) -> Result<usize, TreeError> {
        if take == 0 {
            return Err(TreeError::InvalidArgument(
                "take must be at least 1".to_string(),
            ));
        }
        let clamped = take.min(self.max_take);
        Ok(usize::try_from(clamped).unwrap_or(usize::MAX))
    }
}

fn validate_path(path: &str) -> Result<String, TreeError> {
    normalize_path(path).ok_or_else(|| {
        TreeError::InvalidArgument(format!("path {:?} escapes the tree root", path))
    })
}

/// Containers first, then case-insensitive by name; exact name breaks
/// case-insensitive ties so the order is independent of store order.
fn sort_entries(entries: &mut [StoreEntry]) {
    entries.sort_by(|a, b| {
        b.is_container
            .cmp(&a.is_container)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
}

fn outcome_of(err: &TreeError) -> Outcome {
    match err {
        TreeError::NotFound(_) => Outcome::NotFound,
        TreeError::InvalidArgument(_) => Outcome::InvalidArgument,
        TreeError::Unavailable(_) => Outcome::Unavailable,
        TreeError::Cancelled => Outcome::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use filetree_store::MemoryFileStore;

    use super::*;

    fn flat_store() -> TreeService {
        let store = MemoryFileStore::new()
            .with_file("a.txt")
            .with_file("b.txt")
            .with_file("c.txt");
        TreeService::new(Box::new(store))
    }

    fn names(page: &Page<TreeItem>) -> Vec<&str> {
        page.items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn test_paging_scenario() {
        let service = flat_store();
        let cancel = CancelToken::new();

        let page = service.children("", 0, 2, &cancel).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(names(&page), vec!["a.txt", "b.txt"]);

        let page = service.children("", 2, 2, &cancel).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(names(&page), vec!["c.txt"]);

        let page = service.children("", 3, 2, &cancel).unwrap();
        assert_eq!(page.total, 3);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_window_length_property() {
        let service = flat_store();
        let cancel = CancelToken::new();
        let total: u64 = 3;

        for skip in 0..=total + 2 {
            for take in 1..=total + 1 {
                let page = service.children("", skip, take, &cancel).unwrap();
                assert_eq!(page.total, total);
                let expected = take.min(total.saturating_sub(skip));
                assert_eq!(page.items.len() as u64, expected, "skip={skip} take={take}");
            }
        }
    }

    #[test]
    fn test_ordering_containers_first_case_insensitive() {
        let store = MemoryFileStore::new()
            .with_file("zeta.txt")
            .with_file("Beta.txt")
            .with_container("gamma")
            .with_container("Alpha");
        let service = TreeService::new(Box::new(store));
        let page = service
            .children("", 0, 100, &CancelToken::new())
            .unwrap();
        assert_eq!(names(&page), vec!["Alpha", "gamma", "Beta.txt", "zeta.txt"]);
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let service = flat_store();
        let err = service
            .children("/missing", 0, 100, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, TreeError::NotFound(_)));
    }

    #[test]
    fn test_leaf_path_is_not_found() {
        let service = flat_store();
        let err = service
            .children("a.txt", 0, 100, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, TreeError::NotFound(_)));
    }

    #[test]
    fn test_zero_take_rejected() {
        let service = flat_store();
        let err = service.children("", 0, 0, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, TreeError::InvalidArgument(_)));
    }

    #[test]
    fn test_escaping_path_rejected() {
        let service = flat_store();
        let err = service
            .children("../secrets", 0, 100, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidArgument(_)));
    }

    #[test]
    fn test_oversized_take_clamped() {
        let service = flat_store().with_max_take(2);
        let page = service.children("", 0, 100, &CancelToken::new()).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
    }

    #[test]
    fn test_has_children_and_icons() {
        let store = MemoryFileStore::new()
            .with_file("docs/readme.md")
            .with_container("media")
            .with_file("index.html");
        let service = TreeService::new(Box::new(store));
        let page = service.children("", 0, 100, &CancelToken::new()).unwrap();

        let by_name = |n: &str| page.items.iter().find(|i| i.name == n).unwrap();
        let docs = by_name("docs");
        assert!(docs.has_children);
        assert_eq!(docs.icon.as_deref(), Some(ICON_FOLDER));

        let media = by_name("media");
        assert!(!media.has_children);
        assert_eq!(media.icon.as_deref(), Some(ICON_FOLDER));

        let index = by_name("index.html");
        assert!(!index.has_children);
        assert_eq!(index.icon.as_deref(), Some(ICON_DOCUMENT));
    }

    #[test]
    fn test_root_matches_children_of_empty_path() {
        let service = flat_store();
        let cancel = CancelToken::new();
        assert_eq!(
            service.root(1, 2, &cancel).unwrap(),
            service.children("", 1, 2, &cancel).unwrap()
        );
    }

    #[test]
    fn test_items_omits_unknown_paths() {
        let service = flat_store();
        let paths = vec![
            "a.txt".to_string(),
            "missing.txt".to_string(),
            "c.txt".to_string(),
        ];
        let items = service.items(&paths, &CancelToken::new()).unwrap();
        let got: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(got, vec!["a.txt", "c.txt"]);
    }

    #[test]
    fn test_items_rejects_escaping_path() {
        let service = flat_store();
        let err = service
            .items(&["../x".to_string()], &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidArgument(_)));
    }

    #[test]
    fn test_idempotent_against_unchanged_store() {
        let service = flat_store();
        let cancel = CancelToken::new();
        let first = service.children("", 0, 2, &cancel).unwrap();
        let second = service.children("", 0, 2, &cancel).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cancelled_token_aborts() {
        let service = flat_store();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = service.children("", 0, 2, &cancel).unwrap_err();
        assert!(matches!(err, TreeError::Cancelled));
    }

    struct BrokenStore;

    impl FileStore for BrokenStore {
        fn exists(&self, _path: &str) -> bool {
            false
        }
        fn entry(&self, _path: &str) -> Result<Option<StoreEntry>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk on fire")))
        }
        fn list_children(&self, _path: &str) -> Result<Vec<StoreEntry>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk on fire")))
        }
        fn has_children(&self, _path: &str) -> Result<bool, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk on fire")))
        }
    }

    #[test]
    fn test_store_failure_is_unavailable() {
        let service = TreeService::new(Box::new(BrokenStore));
        let err = service.children("", 0, 10, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, TreeError::Unavailable(_)));
    }

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<(TreeOp, String, Outcome, Duration)>>,
    }

    impl ListingObserver for RecordingObserver {
        fn observe(&self, op: TreeOp, path: &str, outcome: Outcome, elapsed: Duration) {
            self.seen
                .lock()
                .unwrap()
                .push((op, path.to_string(), outcome, elapsed));
        }
    }

    #[test]
    fn test_observer_sees_one_event_per_request() {
        let observer = Arc::new(RecordingObserver::default());
        let service = flat_store().with_observer(observer.clone());
        let cancel = CancelToken::new();

        service.children("", 0, 2, &cancel).unwrap();
        service.children("missing", 0, 2, &cancel).unwrap_err();
        service.root(0, 1, &cancel).unwrap();

        let seen = observer.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!((seen[0].0, seen[0].2), (TreeOp::Children, Outcome::Ok));
        assert_eq!((seen[1].0, seen[1].2), (TreeOp::Children, Outcome::NotFound));
        assert_eq!((seen[2].0, seen[2].2), (TreeOp::Root, Outcome::Ok));
    }
}
