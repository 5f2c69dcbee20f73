//! Response envelope shared by every endpoint

use crate::contract::{Document, ResponseStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// JSON body of every response, successful or not
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status: ResponseStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Time the request was stamped, list responses only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<String>,

    /// Number of documents in `data`, list responses only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Full error object, development only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    /// Diagnostic trace, development only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ResponseEnvelope {
    fn bare(status: ResponseStatus) -> Self {
        Self {
            status,
            message: None,
            requested_at: None,
            results: None,
            data: None,
            error: None,
            stack: None,
        }
    }

    /// `{status: "success", data: {key: document}}`
    pub fn document(key: &str, document: Document) -> Self {
        let mut data = Map::new();
        data.insert(key.to_string(), Value::Object(document));
        Self {
            data: Some(Value::Object(data)),
            ..Self::bare(ResponseStatus::Success)
        }
    }

    /// List body with result count and request timestamp
    pub fn list(key: &str, documents: Vec<Document>, requested_at: DateTime<Utc>) -> Self {
        let results = documents.len();
        let mut data = Map::new();
        data.insert(
            key.to_string(),
            Value::Array(documents.into_iter().map(Value::Object).collect()),
        );
        Self {
            requested_at: Some(requested_at.to_rfc3339()),
            results: Some(results),
            data: Some(Value::Object(data)),
            ..Self::bare(ResponseStatus::Success)
        }
    }

    /// `{status, message}`, what production shows for operational errors
    pub fn failure(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::bare(status)
        }
    }

    pub fn with_error(mut self, error: Value, stack: String) -> Self {
        self.error = Some(error);
        self.stack = Some(stack);
        self
    }
}
