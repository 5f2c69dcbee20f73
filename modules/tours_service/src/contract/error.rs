//! Operational error type for the tours service
//!
//! `AppError` is the only error whose message production mode shows to a
//! caller verbatim. Every constructor marks the error operational and records
//! the caller's source location, so the trace points at the failure site.

use serde::Serialize;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::Location;

/// Top-level `status` string of a response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    /// Client-side problem (4xx)
    Fail,
    /// Anything else
    Error,
}

impl ResponseStatus {
    /// Derive the status string from an HTTP status code's leading digit
    pub fn from_status_code(status_code: u16) -> Self {
        if status_code / 100 == 4 {
            Self::Fail
        } else {
            Self::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail => "fail",
            Self::Error => "error",
        }
    }
}

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed client input (400)
    InputValidation,
    /// Lookup yielded no record (404)
    NotFound,
    /// Uniqueness violation (400)
    Conflict,
    /// Several field violations joined into one message (400)
    AggregateValidation,
    /// Anything unrecognized (500)
    InternalDefect,
}

impl ErrorKind {
    fn from_status_code(status_code: u16) -> Self {
        match status_code {
            404 => Self::NotFound,
            400..=499 => Self::InputValidation,
            _ => Self::InternalDefect,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::InputValidation => "InputValidationError",
            Self::NotFound => "NotFoundError",
            Self::Conflict => "ConflictError",
            Self::AggregateValidation => "AggregateValidationError",
            Self::InternalDefect => "InternalDefect",
        }
    }
}

/// Anticipated failure that is safe to describe to the caller
#[derive(Debug)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    status_code: u16,
    status: ResponseStatus,
    location: &'static Location<'static>,
    backtrace: Backtrace,
}

impl AppError {
    /// Create an operational error; the kind follows from the status code
    #[track_caller]
    pub fn new(message: impl Into<String>, status_code: u16) -> Self {
        Self::with_kind(ErrorKind::from_status_code(status_code), message, status_code)
    }

    #[track_caller]
    pub fn with_kind(kind: ErrorKind, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code,
            status: ResponseStatus::from_status_code(status_code),
            location: Location::caller(),
            backtrace: Backtrace::capture(),
        }
    }

    #[track_caller]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::InputValidation, message, 400)
    }

    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::NotFound, message, 404)
    }

    #[track_caller]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Conflict, message, 400)
    }

    /// Join per-field messages into `Invalid input data. a. b`
    #[track_caller]
    pub fn aggregate_validation<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = messages
            .into_iter()
            .map(|m| m.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(". ");
        Self::with_kind(
            ErrorKind::AggregateValidation,
            format!("Invalid input data. {}", joined),
            400,
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// Always true: these constructors are the operational path
    pub fn is_operational(&self) -> bool {
        true
    }

    /// Source location of the constructor's caller
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Diagnostic trace starting at the call site
    pub fn trace(&self) -> String {
        let mut trace = format!(
            "{}: {}\n    at {}",
            self.kind.name(),
            self.message,
            self.location
        );
        if self.backtrace.status() == BacktraceStatus::Captured {
            trace.push('\n');
            trace.push_str(&self.backtrace.to_string());
        }
        trace
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_leading_digit() {
        assert_eq!(ResponseStatus::from_status_code(400), ResponseStatus::Fail);
        assert_eq!(ResponseStatus::from_status_code(404), ResponseStatus::Fail);
        assert_eq!(ResponseStatus::from_status_code(499), ResponseStatus::Fail);
        assert_eq!(ResponseStatus::from_status_code(500), ResponseStatus::Error);
        assert_eq!(ResponseStatus::from_status_code(302), ResponseStatus::Error);
    }

    #[test]
    fn constructed_errors_are_operational() {
        let err = AppError::new("Tour is sold out", 409);
        assert!(err.is_operational());
        assert_eq!(err.status(), ResponseStatus::Fail);
        assert_eq!(err.kind(), ErrorKind::InputValidation);

        let err = AppError::new("Mail relay refused the message", 500);
        assert!(err.is_operational());
        assert_eq!(err.status(), ResponseStatus::Error);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError::not_found("No tour found with that ID");
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "No tour found with that ID");
    }

    #[test]
    fn trace_points_at_call_site() {
        let line = line!() + 1;
        let err = AppError::invalid_input("bad");
        assert_eq!(err.location().file(), file!());
        assert_eq!(err.location().line(), line);
        assert!(err.trace().starts_with("InputValidationError: bad\n    at "));
        assert!(err.trace().contains(file!()));
    }

    #[test]
    fn aggregate_joins_messages() {
        let err = AppError::aggregate_validation(["Name is required", "Price must be positive"]);
        assert_eq!(
            err.message(),
            "Invalid input data. Name is required. Price must be positive"
        );
        assert_eq!(err.status_code(), 400);
    }
}
