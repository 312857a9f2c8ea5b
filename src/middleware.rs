use std::{backtrace::Backtrace, sync::Arc};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, header::CONTENT_LENGTH, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::{ApiError, Record, debug_record, public_record},
    localize::{Localize, LocalizeError},
    state::ErrorLayerState,
    types::ApiErrorResponse,
};

/// Response extension left by `ApiError::into_response`. Holds what the
/// error layer needs to re-render the body once a localizer is reachable.
/// The backtrace stays unformatted until a debug record is asked for.
#[derive(Debug, Clone)]
pub struct PendingLocalization {
    message_key: String,
    body: ApiErrorResponse,
    extra: Record,
    cause: Option<String>,
    trace: Arc<Backtrace>,
}

impl PendingLocalization {
    pub(crate) fn from_error(err: &ApiError) -> Self {
        Self {
            message_key: err.message_key().to_string(),
            body: err.response_body(err.message_key().to_string()),
            extra: err.extra().clone(),
            cause: err.cause_message(),
            trace: Arc::clone(err.trace_handle()),
        }
    }

    pub fn message_key(&self) -> &str {
        &self.message_key
    }

    pub fn localized_record<L>(&self, localizer: &L) -> Result<Record, LocalizeError>
    where
        L: Localize + ?Sized,
    {
        let mut body = self.body.clone();
        body.error = localizer.localize(&self.message_key)?;
        Ok(public_record(body, &self.extra))
    }

    pub fn raw_record(&self) -> Record {
        public_record(self.body.clone(), &self.extra)
    }

    pub fn debug_record(&self) -> Record {
        debug_record(self.raw_record(), self.cause.clone(), &self.trace)
    }
}

/// Rewrites the body of `ApiError` responses with localized text, or with
/// the debug record when the config asks for it. Status, headers and other
/// extensions set next to the error are kept. Other responses pass through.
pub async fn localize_errors(
    State(state): State<ErrorLayerState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let Some(pending) = response.extensions_mut().remove::<PendingLocalization>() else {
        return response;
    };

    if state.config.expose_debug {
        return with_json_body(response, &pending.debug_record());
    }

    match pending.localized_record(state.localizer.as_ref()) {
        Ok(record) => with_json_body(response, &record),
        Err(err) => {
            tracing::error!(
                error = %err,
                message_key = %pending.message_key,
                "failed to localize api error"
            );
            if state.config.fallback_to_key {
                return with_json_body(response, &pending.raw_record());
            }

            let (mut parts, _) = response.into_parts();
            let mut replacement = ApiError::from(err).into_response();
            replacement.extensions_mut().remove::<PendingLocalization>();
            parts.status = replacement.status();
            parts.headers.remove(CONTENT_LENGTH);
            parts.headers.extend(replacement.headers().clone());
            Response::from_parts(parts, replacement.into_body())
        }
    }
}

fn with_json_body(mut response: Response, record: &Record) -> Response {
    match serde_json::to_vec(record) {
        Ok(bytes) => {
            let headers = response.headers_mut();
            headers.remove(CONTENT_LENGTH);
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            *response.body_mut() = Body::from(bytes);
            response
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to encode api error body");
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::localize::RawKey;

    #[test]
    fn pending_shares_the_unformatted_trace() {
        let err = ApiError::not_found("quizNotFound");
        let pending = PendingLocalization::from_error(&err);

        assert!(Arc::ptr_eq(&pending.trace, err.trace_handle()));
    }

    #[test]
    fn pending_debug_record_matches_the_error() {
        let err = ApiError::email_verification_send()
            .with_cause(std::io::Error::other("smtp down"))
            .with_field("email", "a@example.com");
        let pending = PendingLocalization::from_error(&err);

        let from_pending = pending.debug_record();
        let from_error = err.to_debug_record();
        assert_eq!(from_pending, from_error);
        assert_eq!(from_pending["cause"], json!("smtp down"));
    }

    #[test]
    fn pending_records_keep_reserved_keys() {
        let err = ApiError::not_found("quizNotFound")
            .with_field("errorcode", 1)
            .with_field("trace", "x");
        let pending = PendingLocalization::from_error(&err);

        let localized = pending.localized_record(&RawKey).unwrap();
        assert_eq!(localized["errorcode"], json!(404));
        assert!(!localized.contains_key("trace"));

        let raw = pending.raw_record();
        assert_eq!(raw["errorcode"], json!(404));
        assert!(!raw.contains_key("trace"));
    }
}
