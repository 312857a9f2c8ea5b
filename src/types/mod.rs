pub mod api_error;

#[allow(unused_imports)]
pub use api_error::{ApiErrorKind, ApiErrorResponse, StatusLine};
