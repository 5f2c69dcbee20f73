//! Per-collection rules: filterable fields, unique fields, schemas, defaults

use crate::contract::{Collection, Document};
use crate::domain::query::FilterPolicy;
use serde_json::{json, Value};

const TOUR_POLICY: FilterPolicy = FilterPolicy {
    exact_fields: &[
        "name",
        "difficulty",
        "duration",
        "maxGroupSize",
        "price",
        "ratingsAverage",
        "ratingsQuantity",
        "secretTour",
    ],
    range_fields: &["duration", "price", "ratingsAverage", "maxGroupSize"],
};

const USER_POLICY: FilterPolicy = FilterPolicy {
    exact_fields: &["name", "email", "role", "active"],
    range_fields: &[],
};

const REVIEW_POLICY: FilterPolicy = FilterPolicy {
    exact_fields: &["tour", "user", "rating"],
    range_fields: &["rating"],
};

impl Collection {
    pub fn filter_policy(&self) -> &'static FilterPolicy {
        match self {
            Self::Tours => &TOUR_POLICY,
            Self::Users => &USER_POLICY,
            Self::Reviews => &REVIEW_POLICY,
        }
    }

    /// Fields backed by a unique index
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Tours => &["name"],
            Self::Users => &["email"],
            Self::Reviews => &[],
        }
    }

    /// Values filled in on insert when the caller omits them
    pub fn defaults(&self) -> Document {
        let defaults = match self {
            Self::Tours => json!({ "ratingsAverage": 4.5, "ratingsQuantity": 0, "secretTour": false }),
            Self::Users => json!({ "role": "user", "active": true, "photo": "default.jpg" }),
            Self::Reviews => json!({}),
        };
        match defaults {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    /// JSON Schema every stored document must satisfy
    pub fn schema(&self) -> Value {
        match self {
            Self::Tours => json!({
                "type": "object",
                "required": ["name", "duration", "maxGroupSize", "difficulty", "price", "summary", "imageCover"],
                "properties": {
                    "name": { "type": "string", "minLength": 10, "maxLength": 40 },
                    "duration": { "type": "number", "minimum": 1 },
                    "maxGroupSize": { "type": "integer", "minimum": 1 },
                    "difficulty": { "type": "string", "enum": ["easy", "medium", "difficult"] },
                    "ratingsAverage": { "type": "number", "minimum": 1, "maximum": 5 },
                    "ratingsQuantity": { "type": "integer", "minimum": 0 },
                    "price": { "type": "number", "minimum": 0 },
                    "priceDiscount": { "type": "number", "minimum": 0 },
                    "summary": { "type": "string" },
                    "description": { "type": "string" },
                    "imageCover": { "type": "string" },
                    "images": { "type": "array", "items": { "type": "string" } },
                    "startDates": { "type": "array", "items": { "type": "string" } },
                    "secretTour": { "type": "boolean" }
                }
            }),
            Self::Users => json!({
                "type": "object",
                "required": ["name", "email"],
                "properties": {
                    "name": { "type": "string", "minLength": 1 },
                    "email": { "type": "string", "pattern": "^[^@\\s]+@[^@\\s]+\\.[^@\\s]+$" },
                    "photo": { "type": "string" },
                    "role": { "type": "string", "enum": ["user", "guide", "lead-guide", "admin"] },
                    "active": { "type": "boolean" }
                }
            }),
            Self::Reviews => json!({
                "type": "object",
                "required": ["review", "rating", "tour", "user"],
                "properties": {
                    "review": { "type": "string", "minLength": 1 },
                    "rating": { "type": "number", "minimum": 1, "maximum": 5 },
                    "tour": { "type": "string" },
                    "user": { "type": "string" }
                }
            }),
        }
    }

    /// Declared JSON type of a field, if the schema names one
    pub fn field_type(&self, field: &str) -> Option<String> {
        self.schema()
            .get("properties")
            .and_then(|p| p.get(field))
            .and_then(|f| f.get("type"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}
