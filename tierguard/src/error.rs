use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use std::fmt::{self, Display};

/// As long as the struct member is private, we force people to use the `new`
/// method and log the error. We box `ErrorDetails` per the
/// `clippy::result_large_err` lint.
#[derive(Debug, PartialEq)]
pub struct Error(Box<ErrorDetails>);

impl Error {
    pub fn new(details: ErrorDetails) -> Self {
        details.log();
        Error(Box::new(details))
    }

    pub fn new_without_logging(details: ErrorDetails) -> Self {
        Error(Box::new(details))
    }

    pub fn status_code(&self) -> StatusCode {
        self.0.status_code()
    }

    pub fn get_details(&self) -> &ErrorDetails {
        &self.0
    }

    /// True when the failure is a connectivity/timeout problem with the
    /// usage store, i.e. eligible for the engine's fail-open policy.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(*self.0, ErrorDetails::StoreUnavailable { .. })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for Error {}

impl From<ErrorDetails> for Error {
    fn from(details: ErrorDetails) -> Self {
        Error::new(details)
    }
}

#[derive(Debug, PartialEq)]
pub enum ErrorDetails {
    /// Malformed or missing configuration. Detected at startup; aborts
    /// initialization rather than failing open at request time.
    Config { message: String },
    /// The usage store is unreachable or timed out. The engine treats this
    /// as degraded-mode operation, never as a business denial.
    StoreUnavailable { message: String },
    /// Invariant breach (e.g. a malformed reply from the store script).
    InternalError { message: String },
}

impl ErrorDetails {
    pub fn level(&self) -> tracing::Level {
        match self {
            ErrorDetails::Config { .. } => tracing::Level::ERROR,
            ErrorDetails::StoreUnavailable { .. } => tracing::Level::WARN,
            ErrorDetails::InternalError { .. } => tracing::Level::ERROR,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorDetails::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ErrorDetails::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log the error at the level returned by `level()`.
    pub fn log(&self) {
        match self.level() {
            tracing::Level::ERROR => tracing::error!("{self}"),
            tracing::Level::WARN => tracing::warn!("{self}"),
            tracing::Level::INFO => tracing::info!("{self}"),
            tracing::Level::DEBUG => tracing::debug!("{self}"),
            tracing::Level::TRACE => tracing::trace!("{self}"),
        }
    }
}

impl Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDetails::Config { message } => write!(f, "Configuration error: {message}"),
            ErrorDetails::StoreUnavailable { message } => {
                write!(f, "Usage store unavailable: {message}")
            }
            ErrorDetails::InternalError { message } => write!(f, "Internal error: {message}"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = json!({"error": self.to_string()});
        (self.status_code(), Json(body)).into_response()
    }
}
