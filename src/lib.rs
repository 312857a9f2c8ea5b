//! Typed API errors with fixed HTTP status lines and application codes,
//! rendered as JSON error bodies.

pub mod config;
pub mod error;
pub mod extractors;
pub mod localize;
pub mod middleware;
pub mod state;
pub mod types;

pub use config::ErrorResponseConfig;
pub use error::{ApiError, Cause, Record};
pub use localize::{Localize, LocalizeError, MessageCatalog};
pub use middleware::localize_errors;
pub use state::ErrorLayerState;
pub use types::{ApiErrorKind, ApiErrorResponse, StatusLine};
