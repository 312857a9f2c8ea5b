use std::{backtrace::Backtrace, borrow::Cow, sync::Arc};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};

use crate::{
    localize::{Localize, LocalizeError},
    middleware::PendingLocalization,
    types::{ApiErrorKind, ApiErrorResponse, StatusLine},
};

/// Lower-level error wrapped by an [`ApiError`].
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Serialized error body: reserved keys plus any extra fields.
pub type Record = Map<String, Value>;

/// Keys that always carry computed values in serialized records.
pub const RESERVED_KEYS: [&str; 6] = ["status", "error", "errorcode", "header", "cause", "trace"];

/// Typed API failure.
///
/// Every error has a [`kind`](Self::kind) that fixes its status line and
/// application code, a message key resolved to text only when the public
/// body is rendered, an optional cause, and extra fields merged into both
/// serialized forms.
#[derive(Debug, thiserror::Error)]
#[error("{message_key}")]
pub struct ApiError {
    kind: ApiErrorKind,
    message_key: Cow<'static, str>,
    #[source]
    cause: Option<Cause>,
    extra: Record,
    trace: Arc<Backtrace>,
}

impl ApiError {
    fn new(kind: ApiErrorKind, message_key: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message_key: message_key.into(),
            cause: None,
            extra: Map::new(),
            trace: Arc::new(Backtrace::force_capture()),
        }
    }

    fn with_default_key(kind: ApiErrorKind) -> Self {
        Self::new(kind, kind.default_message_key().unwrap_or("generalError"))
    }

    pub fn invalid_parameter(message_key: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ApiErrorKind::InvalidParameter, message_key)
    }

    pub fn duplicated_entry_in_database(message_key: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ApiErrorKind::DuplicatedEntryInDatabase, message_key)
    }

    pub fn invalid_database_operation() -> Self {
        Self::with_default_key(ApiErrorKind::InvalidDatabaseOperation)
    }

    pub fn not_found(message_key: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ApiErrorKind::NotFound, message_key)
    }

    pub fn forbidden_access() -> Self {
        Self::with_default_key(ApiErrorKind::ForbiddenAccess)
    }

    pub fn forbidden_access_with_key(message_key: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ApiErrorKind::ForbiddenAccess, message_key)
    }

    pub fn precondition_failed() -> Self {
        Self::with_default_key(ApiErrorKind::PreconditionFailed)
    }

    pub fn precondition_failed_with_key(message_key: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ApiErrorKind::PreconditionFailed, message_key)
    }

    pub fn invalid_filesystem_operation() -> Self {
        Self::with_default_key(ApiErrorKind::InvalidFilesystemOperation)
    }

    pub fn invalid_filesystem_operation_with_key(
        message_key: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::new(ApiErrorKind::InvalidFilesystemOperation, message_key)
    }

    /// Catch-all for faults nobody anticipated.
    pub fn internal_server_error() -> Self {
        Self::with_default_key(ApiErrorKind::InternalServerError)
    }

    pub fn invalid_credentials() -> Self {
        Self::with_default_key(ApiErrorKind::InvalidCredentials)
    }

    pub fn not_allowed_to_submit() -> Self {
        Self::with_default_key(ApiErrorKind::NotAllowedToSubmit)
    }

    pub fn not_allowed_to_submit_with_key(message_key: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ApiErrorKind::NotAllowedToSubmit, message_key)
    }

    pub fn email_not_verified() -> Self {
        Self::with_default_key(ApiErrorKind::EmailNotVerified)
    }

    pub fn email_verification_send() -> Self {
        Self::with_default_key(ApiErrorKind::EmailVerificationSend)
    }

    pub fn problem_deployment_failed() -> Self {
        Self::with_default_key(ApiErrorKind::ProblemDeploymentFailed)
    }

    pub fn with_cause(mut self, cause: impl Into<Cause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_field(key, value);
        self
    }

    /// Adds an extra field to both serialized forms. A later call with the
    /// same key replaces the earlier value.
    pub fn add_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extra.insert(key.into(), value.into());
    }

    pub fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    pub fn message_key(&self) -> &str {
        &self.message_key
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }

    pub fn status_line(&self) -> StatusLine {
        self.kind.status_line()
    }

    /// Transport status taken from the numeric part of the status line.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_line().status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn cause_message(&self) -> Option<String> {
        self.cause.as_ref().map(ToString::to_string)
    }

    pub fn extra(&self) -> &Record {
        &self.extra
    }

    pub fn trace(&self) -> String {
        self.trace.to_string()
    }

    /// Shared handle to the unformatted construction backtrace.
    pub(crate) fn trace_handle(&self) -> &Arc<Backtrace> {
        &self.trace
    }

    /// Full record for logs and other non-public sinks, including the cause
    /// message and the construction backtrace.
    pub fn to_debug_record(&self) -> Record {
        debug_record(self.raw_public_record(), self.cause_message(), &self.trace)
    }

    /// Record safe to send to API clients. The message key is resolved
    /// through `localizer`; cause and trace are never included.
    pub fn to_public_record<L>(&self, localizer: &L) -> Result<Record, LocalizeError>
    where
        L: Localize + ?Sized,
    {
        let error = localizer.localize(&self.message_key)?;
        Ok(public_record(self.response_body(error), &self.extra))
    }

    pub fn response_body(&self, error: String) -> ApiErrorResponse {
        ApiErrorResponse::new(error, self.code(), self.status_line())
    }

    /// Public record with the message key left unresolved.
    pub(crate) fn raw_public_record(&self) -> Record {
        public_record(self.response_body(self.message_key.to_string()), &self.extra)
    }

    fn log(&self, status: StatusCode) {
        let cause = self.cause_message();
        if status.is_server_error() {
            tracing::error!(
                errorcode = self.code(),
                status = status.as_u16(),
                message_key = %self.message_key,
                cause = cause.as_deref(),
                "api error"
            );
        } else {
            tracing::warn!(
                errorcode = self.code(),
                status = status.as_u16(),
                message_key = %self.message_key,
                cause = cause.as_deref(),
                "api error"
            );
        }
        tracing::debug!(trace = %self.trace, "api error trace");
    }
}

/// Reserved public fields on top of `extra`. `cause` and `trace` are
/// dropped so an extra field can never smuggle them into a public body.
pub(crate) fn public_record(body: ApiErrorResponse, extra: &Record) -> Record {
    let mut record = extra.clone();
    record.remove("cause");
    record.remove("trace");
    record.insert("status".to_string(), Value::String(body.status));
    record.insert("error".to_string(), Value::String(body.error));
    record.insert("errorcode".to_string(), Value::from(body.errorcode));
    record.insert("header".to_string(), Value::String(body.header));
    record
}

/// Adds `cause` and `trace` on top of a public record. Formatting the
/// backtrace is the expensive part, so callers hold it unformatted until here.
pub(crate) fn debug_record(
    mut record: Record,
    cause: Option<String>,
    trace: &Backtrace,
) -> Record {
    record.insert("cause".to_string(), cause.map_or(Value::Null, Value::String));
    record.insert("trace".to_string(), Value::String(trace.to_string()));
    record
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_parameter("invalidJson").with_cause(err)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::invalid_filesystem_operation().with_cause(err)
    }
}

impl From<LocalizeError> for ApiError {
    fn from(err: LocalizeError) -> Self {
        Self::internal_server_error().with_cause(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        self.log(status);

        let pending = PendingLocalization::from_error(&self);
        let body = self.raw_public_record();

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(pending);
        response
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::localize::RawKey;

    fn constructors() -> Vec<ApiError> {
        vec![
            ApiError::invalid_parameter("parameterInvalid"),
            ApiError::duplicated_entry_in_database("aliasInUse"),
            ApiError::invalid_database_operation(),
            ApiError::not_found("quizNotFound"),
            ApiError::forbidden_access(),
            ApiError::precondition_failed(),
            ApiError::invalid_filesystem_operation(),
            ApiError::internal_server_error(),
            ApiError::invalid_credentials(),
            ApiError::not_allowed_to_submit(),
            ApiError::email_not_verified(),
            ApiError::email_verification_send(),
            ApiError::problem_deployment_failed(),
        ]
    }

    #[test]
    fn every_kind_has_its_documented_defaults() {
        let expected = [
            ("parameterInvalid", "HTTP/1.1 400 BAD REQUEST", 400),
            ("aliasInUse", "HTTP/1.1 400 BAD REQUEST", 400),
            ("generalError", "HTTP/1.1 400 BAD REQUEST", 400),
            ("quizNotFound", "HTTP/1.1 404 NOT FOUND", 404),
            ("userNotAllowed", "HTTP/1.1 403 FORBIDDEN", 403),
            ("userNotAllowed", "HTTP/1.1 412 PRECONDITION FAILED", 412),
            ("generalError", "HTTP/1.1 500 INTERNAL SERVER ERROR", 500),
            ("generalError", "HTTP/1.1 500 INTERNAL SERVER ERROR", 500),
            ("usernameOrPassIsWrong", "HTTP/1.1 403 FORBIDDEN", 101),
            ("unableToSubmit", "HTTP/1.1 401 FORBIDDEN", 501),
            ("emailNotVerified", "HTTP/1.1 403 FORBIDDEN", 600),
            ("errorWhileSendingMail", "HTTP/1.1 500 INTERNAL SERVER ERROR", 601),
            ("unableToDeployProblem", "HTTP/1.1 412 PRECONDITION FAILED", 412),
        ];

        for ((err, kind), (key, line, code)) in constructors()
            .into_iter()
            .zip(ApiErrorKind::ALL)
            .zip(expected)
        {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.message_key(), key, "{kind:?}");
            assert_eq!(err.status_line().to_string(), line, "{kind:?}");
            assert_eq!(err.code(), code, "{kind:?}");
        }
    }

    #[test]
    fn not_found_debug_record() {
        let record = ApiError::not_found("quizNotFound").to_debug_record();

        assert_eq!(record["status"], json!("error"));
        assert_eq!(record["error"], json!("quizNotFound"));
        assert_eq!(record["errorcode"], json!(404));
        assert_eq!(record["header"], json!("HTTP/1.1 404 NOT FOUND"));
        assert_eq!(record["cause"], Value::Null);
        assert!(!record["trace"].as_str().unwrap().is_empty());
        assert_eq!(record.len(), RESERVED_KEYS.len());
    }

    #[test]
    fn invalid_credentials_keeps_divergent_code() {
        let err = ApiError::invalid_credentials();
        assert_eq!(err.code(), 101);
        assert_eq!(err.status_line().to_string(), "HTTP/1.1 403 FORBIDDEN");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn not_allowed_to_submit_transports_401() {
        let err = ApiError::not_allowed_to_submit();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.status_line().reason(), "FORBIDDEN");
    }

    #[test]
    fn overridable_keys() {
        assert_eq!(
            ApiError::forbidden_access_with_key("contestNotStarted").message_key(),
            "contestNotStarted"
        );
        assert_eq!(
            ApiError::precondition_failed_with_key("contestEnded").message_key(),
            "contestEnded"
        );
        assert_eq!(
            ApiError::invalid_filesystem_operation_with_key("unableToWriteFile").message_key(),
            "unableToWriteFile"
        );
        assert_eq!(
            ApiError::not_allowed_to_submit_with_key("submissionGap").message_key(),
            "submissionGap"
        );
    }

    #[test]
    fn extra_fields_appear_in_debug_record() {
        let mut err = ApiError::invalid_parameter("parameterEmpty");
        err.add_field("x", 1);
        err.add_field("parameter", "alias");

        let record = err.to_debug_record();
        assert_eq!(record["x"], json!(1));
        assert_eq!(record["parameter"], json!("alias"));
    }

    #[test]
    fn last_write_wins_for_extra_fields() {
        let err = ApiError::not_found("problemNotFound")
            .with_field("retry", 1)
            .with_field("retry", 2);

        let record = err.to_debug_record();
        assert_eq!(record["retry"], json!(2));
        assert_eq!(err.extra().len(), 1);
    }

    #[test]
    fn reserved_keys_win_over_extra_fields() {
        let mut err = ApiError::not_found("quizNotFound")
            .with_cause(ApiError::invalid_database_operation());
        for key in RESERVED_KEYS {
            err.add_field(key, "spoofed");
        }

        let debug = err.to_debug_record();
        assert_eq!(debug["status"], json!("error"));
        assert_eq!(debug["error"], json!("quizNotFound"));
        assert_eq!(debug["errorcode"], json!(404));
        assert_eq!(debug["header"], json!("HTTP/1.1 404 NOT FOUND"));
        assert_eq!(debug["cause"], json!("generalError"));
        assert_ne!(debug["trace"], json!("spoofed"));

        let public = err.to_public_record(&RawKey).unwrap();
        assert_eq!(public["status"], json!("error"));
        assert_eq!(public["error"], json!("quizNotFound"));
        assert_eq!(public["errorcode"], json!(404));
        assert_eq!(public["header"], json!("HTTP/1.1 404 NOT FOUND"));
        assert!(!public.contains_key("cause"));
        assert!(!public.contains_key("trace"));
    }

    #[test]
    fn public_record_is_localized_and_hides_internals() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing testplan");
        let err = ApiError::from(io).with_field("problem", "sumas");

        let mut messages = HashMap::new();
        messages.insert("generalError".to_string(), "Something went wrong".to_string());

        let record = err.to_public_record(&messages).unwrap();
        assert_eq!(record["error"], json!("Something went wrong"));
        assert_eq!(record["errorcode"], json!(500));
        assert_eq!(record["problem"], json!("sumas"));
        assert!(!record.contains_key("cause"));
        assert!(!record.contains_key("trace"));
    }

    #[test]
    fn public_record_propagates_localization_failure() {
        let err = ApiError::email_not_verified();
        let messages: HashMap<String, String> = HashMap::new();

        assert!(matches!(
            err.to_public_record(&messages),
            Err(LocalizeError::MissingKey(key)) if key == "emailNotVerified"
        ));
    }

    #[test]
    fn cause_message_and_source_chain() {
        let io = std::io::Error::other("disk full");
        let err = ApiError::email_verification_send().with_cause(io);

        assert_eq!(err.to_debug_record()["cause"], json!("disk full"));
        assert_eq!(err.cause_message().as_deref(), Some("disk full"));

        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("disk full"));
    }

    #[test]
    fn source_walks_nested_api_errors() {
        let db = std::io::Error::other("connection reset");
        let inner = ApiError::invalid_database_operation().with_cause(db);
        let outer = ApiError::internal_server_error().with_cause(inner);

        let first = std::error::Error::source(&outer).expect("outer source");
        assert_eq!(first.to_string(), "generalError");
        let second = first.source().expect("inner source");
        assert_eq!(second.to_string(), "connection reset");

        assert!(std::error::Error::source(&ApiError::forbidden_access()).is_none());
    }

    #[test]
    fn display_is_the_message_key() {
        assert_eq!(ApiError::invalid_credentials().to_string(), "usernameOrPassIsWrong");
    }

    #[test]
    fn json_errors_become_invalid_parameter() {
        let parse_err = serde_json::from_str::<Value>("{").unwrap_err();
        let err = ApiError::from(parse_err);

        assert_eq!(err.kind(), ApiErrorKind::InvalidParameter);
        assert_eq!(err.message_key(), "invalidJson");
        assert!(err.cause().is_some());
    }
}
