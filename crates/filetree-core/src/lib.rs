pub mod cancel;
pub mod config;
pub mod error;
pub mod handler;
pub mod instrument;
pub mod listing;
pub mod protocol;

pub use cancel::CancelToken;
pub use error::TreeError;
pub use listing::TreeService;
