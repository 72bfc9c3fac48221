use std::time::Duration;

use tracing::debug;

/// Which tree operation a timing observation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeOp {
    Root,
    Children,
    Items,
}

impl TreeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeOp::Root => "root",
            TreeOp::Children => "children",
            TreeOp::Items => "items",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    NotFound,
    InvalidArgument,
    Unavailable,
    Cancelled,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::NotFound => "not_found",
            Outcome::InvalidArgument => "invalid_argument",
            Outcome::Unavailable => "unavailable",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// Per-request timing hook. The service invokes it exactly once per
/// completed request with the measured duration; there is no begin/end
/// pairing to keep in sync and no state shared between requests.
pub trait ListingObserver: Send + Sync {
    fn observe(&self, op: TreeOp, path: &str, outcome: Outcome, elapsed: Duration);
}

/// Observer that drops every observation.
pub struct NoopObserver;

impl ListingObserver for NoopObserver {
    fn observe(&self, _op: TreeOp, _path: &str, _outcome: Outcome, _elapsed: Duration) {}
}

/// Observer that emits one debug event per request.
pub struct LogObserver;

impl ListingObserver for LogObserver {
    fn observe(&self, op: TreeOp, path: &str, outcome: Outcome, elapsed: Duration) {
        debug!(
            op = op.as_str(),
            path,
            outcome = outcome.as_str(),
            elapsed_us = elapsed.as_micros() as u64,
            "tree request",
        );
    }
}
