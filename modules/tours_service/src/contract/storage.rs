//! Storage driver failure shapes
//!
//! These mirror what a document-store driver reports. They are
//! non-operational until the global responder recognizes and translates them.

use indexmap::IndexMap;
use serde_json::{json, Value};

/// Driver code for a unique index violation
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// One per-field violation inside a validation failure
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    /// Human-readable violation message
    pub message: String,
    /// Validator that rejected the field (`required`, `minimum`, ...)
    pub kind: String,
}

impl FieldViolation {
    pub fn new(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
        }
    }
}

/// Failures reported by the document store
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// A value could not be cast to the type the store expects
    #[error("Cast to {kind} failed for value \"{value}\" at path \"{path}\"")]
    Cast {
        path: String,
        value: String,
        kind: String,
    },

    /// Server-side rejection identified by a numeric code
    #[error("{errmsg}")]
    Server { code: i32, errmsg: String },

    /// One or more fields failed schema validation
    #[error("Validation failed: {}", summarize(.errors))]
    Validation {
        errors: IndexMap<String, FieldViolation>,
    },

    /// The store is unreachable or could not be opened
    #[error("{message}")]
    Connection { message: String },
}

fn summarize(errors: &IndexMap<String, FieldViolation>) -> String {
    errors
        .iter()
        .map(|(field, violation)| format!("{}: {}", field, violation.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl StorageError {
    /// Unique index violation in the driver's message format
    pub fn duplicate_key(collection: &str, field: &str, value: &Value) -> Self {
        Self::Server {
            code: DUPLICATE_KEY_CODE,
            errmsg: format!(
                "E11000 duplicate key error collection: natours.{} index: {}_1 dup key: {{ {}: {} }}",
                collection, field, field, value
            ),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cast { .. } => "CastError",
            Self::Server { .. } => "MongoServerError",
            Self::Validation { .. } => "ValidationError",
            Self::Connection { .. } => "ConnectionError",
        }
    }

    /// Raw driver fields, as they appear in development responses
    pub fn describe(&self) -> Value {
        match self {
            Self::Cast { path, value, kind } => json!({
                "name": self.name(),
                "path": path,
                "value": value,
                "kind": kind,
            }),
            Self::Server { code, errmsg } => json!({
                "name": self.name(),
                "code": code,
                "errmsg": errmsg,
            }),
            Self::Validation { errors } => {
                let errors: serde_json::Map<String, Value> = errors
                    .iter()
                    .map(|(field, v)| {
                        (
                            field.clone(),
                            json!({ "message": v.message, "kind": v.kind, "path": field }),
                        )
                    })
                    .collect();
                json!({ "name": self.name(), "errors": errors })
            }
            Self::Connection { .. } => json!({ "name": self.name() }),
        }
    }
}
