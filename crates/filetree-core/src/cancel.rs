use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::TreeError;

/// Cloneable cancellation flag. The server cancels a connection's token
/// when the peer goes away; the service checks it between store calls so
/// an abandoned request stops enumerating promptly.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Err(Cancelled) once the token has been cancelled.
    pub fn check(&self) -> Result<(), TreeError> {
        if self.is_cancelled() {
            Err(TreeError::Cancelled)
        } else {
            Ok(())
        }
    }
}
