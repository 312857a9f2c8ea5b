use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use specta::Type;

/// The closed set of failure categories an API handler can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Type)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    InvalidParameter,
    DuplicatedEntryInDatabase,
    InvalidDatabaseOperation,
    NotFound,
    ForbiddenAccess,
    PreconditionFailed,
    InvalidFilesystemOperation,
    InternalServerError,
    InvalidCredentials,
    NotAllowedToSubmit,
    EmailNotVerified,
    EmailVerificationSend,
    ProblemDeploymentFailed,
}

impl ApiErrorKind {
    pub const ALL: [Self; 13] = [
        Self::InvalidParameter,
        Self::DuplicatedEntryInDatabase,
        Self::InvalidDatabaseOperation,
        Self::NotFound,
        Self::ForbiddenAccess,
        Self::PreconditionFailed,
        Self::InvalidFilesystemOperation,
        Self::InternalServerError,
        Self::InvalidCredentials,
        Self::NotAllowedToSubmit,
        Self::EmailNotVerified,
        Self::EmailVerificationSend,
        Self::ProblemDeploymentFailed,
    ];

    pub const fn status_line(self) -> StatusLine {
        match self {
            Self::InvalidParameter
            | Self::DuplicatedEntryInDatabase
            | Self::InvalidDatabaseOperation => StatusLine::BAD_REQUEST,
            Self::NotFound => StatusLine::NOT_FOUND,
            Self::ForbiddenAccess | Self::InvalidCredentials | Self::EmailNotVerified => {
                StatusLine::FORBIDDEN
            }
            Self::PreconditionFailed | Self::ProblemDeploymentFailed => {
                StatusLine::PRECONDITION_FAILED
            }
            Self::InvalidFilesystemOperation
            | Self::InternalServerError
            | Self::EmailVerificationSend => StatusLine::INTERNAL_SERVER_ERROR,
            Self::NotAllowedToSubmit => StatusLine::SUBMISSION_FORBIDDEN,
        }
    }

    /// Application error code. Usually the HTTP status, except for the
    /// login, submission and email verification failures.
    pub const fn code(self) -> u16 {
        match self {
            Self::InvalidCredentials => 101,
            Self::NotAllowedToSubmit => 501,
            Self::EmailNotVerified => 600,
            Self::EmailVerificationSend => 601,
            other => other.status_line().status(),
        }
    }

    /// Message key used when the caller does not supply one. `None` for the
    /// kinds that always take a caller-supplied key.
    pub const fn default_message_key(self) -> Option<&'static str> {
        match self {
            Self::InvalidParameter | Self::DuplicatedEntryInDatabase | Self::NotFound => None,
            Self::InvalidDatabaseOperation
            | Self::InvalidFilesystemOperation
            | Self::InternalServerError => Some("generalError"),
            Self::ForbiddenAccess | Self::PreconditionFailed => Some("userNotAllowed"),
            Self::InvalidCredentials => Some("usernameOrPassIsWrong"),
            Self::NotAllowedToSubmit => Some("unableToSubmit"),
            Self::EmailNotVerified => Some("emailNotVerified"),
            Self::EmailVerificationSend => Some("errorWhileSendingMail"),
            Self::ProblemDeploymentFailed => Some("unableToDeployProblem"),
        }
    }
}

/// Literal HTTP/1.1 status line attached to an error, e.g.
/// `HTTP/1.1 404 NOT FOUND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusLine {
    status: u16,
    reason: &'static str,
}

impl StatusLine {
    pub const BAD_REQUEST: Self = Self::new(400, "BAD REQUEST");
    pub const FORBIDDEN: Self = Self::new(403, "FORBIDDEN");
    pub const NOT_FOUND: Self = Self::new(404, "NOT FOUND");
    pub const PRECONDITION_FAILED: Self = Self::new(412, "PRECONDITION FAILED");
    pub const INTERNAL_SERVER_ERROR: Self = Self::new(500, "INTERNAL SERVER ERROR");
    // 401 with the FORBIDDEN label is what submission clients have always received.
    pub const SUBMISSION_FORBIDDEN: Self = Self::new(401, "FORBIDDEN");

    pub const fn new(status: u16, reason: &'static str) -> Self {
        Self { status, reason }
    }

    pub const fn status(&self) -> u16 {
        self.status
    }

    pub const fn reason(&self) -> &'static str {
        self.reason
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/1.1 {} {}", self.status, self.reason)
    }
}

impl Serialize for StatusLine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Fixed part of the public error body. Extra fields are merged next to
/// these at serialization time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct ApiErrorResponse {
    pub status: String,
    pub error: String,
    pub errorcode: u16,
    pub header: String,
}

impl ApiErrorResponse {
    pub fn new(error: String, errorcode: u16, header: StatusLine) -> Self {
        Self {
            status: "error".to_string(),
            error,
            errorcode,
            header: header.to_string(),
        }
    }
}
