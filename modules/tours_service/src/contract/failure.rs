//! Everything a handler can fail with
//!
//! A `Failure` is what reaches the global responder. Only the `App` variant
//! carries a status code; the others are normalized by the responder.

use super::error::{AppError, ResponseStatus};
use super::storage::StorageError;
use serde_json::{json, Value};

#[derive(Debug)]
pub enum Failure {
    /// Constructed through `AppError`, always operational
    App(AppError),
    /// Raw storage driver failure, not yet translated
    Storage(StorageError),
    /// Programming defect or third-party failure
    Defect(anyhow::Error),
}

impl Failure {
    pub fn name(&self) -> &str {
        match self {
            Self::App(err) => err.kind().name(),
            Self::Storage(err) => err.name(),
            Self::Defect(_) => "Error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::App(err) => err.message().to_string(),
            Self::Storage(err) => err.to_string(),
            Self::Defect(err) => err.to_string(),
        }
    }

    /// Status code if the failure carries one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::App(err) => Some(err.status_code()),
            Self::Storage(_) | Self::Defect(_) => None,
        }
    }

    /// Status string if the failure carries one
    pub fn status(&self) -> Option<ResponseStatus> {
        match self {
            Self::App(err) => Some(err.status()),
            Self::Storage(_) | Self::Defect(_) => None,
        }
    }

    pub fn is_operational(&self) -> bool {
        match self {
            Self::App(err) => err.is_operational(),
            Self::Storage(_) | Self::Defect(_) => false,
        }
    }

    pub fn trace(&self) -> String {
        match self {
            Self::App(err) => err.trace(),
            Self::Storage(err) => format!("{}: {}", err.name(), err),
            Self::Defect(err) => format!("{}: {:?}", self.name(), err),
        }
    }

    /// Full error object with the given normalized status fields
    pub fn describe(&self, status_code: u16, status: ResponseStatus) -> Value {
        let mut object = match self {
            Self::App(err) => json!({ "name": err.kind().name() }),
            Self::Storage(err) => err.describe(),
            Self::Defect(err) => json!({
                "name": self.name(),
                "causes": err.chain().skip(1).map(|c| c.to_string()).collect::<Vec<_>>(),
            }),
        };
        if let Value::Object(map) = &mut object {
            map.insert("message".to_string(), Value::String(self.message()));
            map.insert("statusCode".to_string(), json!(status_code));
            map.insert("status".to_string(), json!(status.as_str()));
            map.insert("isOperational".to_string(), json!(self.is_operational()));
        }
        object
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}

impl From<AppError> for Failure {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl From<StorageError> for Failure {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<AppError>() {
            Ok(app) => return Self::App(app),
            Err(err) => err,
        };
        match err.downcast::<StorageError>() {
            Ok(storage) => Self::Storage(storage),
            Err(err) => Self::Defect(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn anyhow_wrapping_app_error_is_reclassified() {
        let failure = Failure::from(anyhow::Error::new(AppError::not_found("gone")));
        assert!(failure.is_operational());
        assert_eq!(failure.status_code(), Some(404));
    }

    #[test]
    fn anyhow_wrapping_storage_error_stays_untranslated() {
        let err = StorageError::Connection {
            message: "connection refused".to_string(),
        };
        let failure = Failure::from(anyhow::Error::new(err));
        assert!(matches!(failure, Failure::Storage(_)));
        assert!(!failure.is_operational());
        assert_eq!(failure.status_code(), None);
    }

    #[test]
    fn unknown_errors_are_defects() {
        let result: anyhow::Result<()> = Err(anyhow::anyhow!("index out of range"))
            .context("rendering tour card");
        let failure = Failure::from(result.unwrap_err());
        assert!(matches!(failure, Failure::Defect(_)));
        assert_eq!(failure.name(), "Error");
        let described = failure.describe(500, ResponseStatus::Error);
        assert_eq!(described["causes"][0], "index out of range");
        assert_eq!(described["isOperational"], false);
    }
}
