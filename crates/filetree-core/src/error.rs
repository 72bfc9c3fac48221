use thiserror::Error;

use filetree_store::StoreError;

use crate::protocol::ErrorKind;

/// Outcome taxonomy for tree requests. Every failure surfaces as one of
/// these; a request never returns a partial page.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("path not found: {0:?}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("store unavailable: {0}")]
    Unavailable(#[source] std::io::Error),
    #[error("request cancelled")]
    Cancelled,
}

impl TreeError {
    /// Wire-level kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TreeError::NotFound(_) => ErrorKind::NotFound,
            TreeError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            TreeError::Unavailable(_) => ErrorKind::Unavailable,
            TreeError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<StoreError> for TreeError {
    fn from(err: StoreError) -> Self {
        match err {
            // A leaf target gets the same answer as a missing one.
            StoreError::NotFound(path) | StoreError::NotAContainer(path) => {
                TreeError::NotFound(path)
            }
            StoreError::Io(e) => TreeError::Unavailable(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let err: TreeError = StoreError::NotFound("x".to_string()).into();
        assert!(matches!(err, TreeError::NotFound(_)));

        let err: TreeError = StoreError::NotAContainer("x".to_string()).into();
        assert!(matches!(err, TreeError::NotFound(_)));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: TreeError = StoreError::Io(io).into();
        assert!(matches!(err, TreeError::Unavailable(_)));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
