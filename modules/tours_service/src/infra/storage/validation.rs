//! JSON Schema validation of stored documents

use crate::contract::{Collection, Document, FieldViolation, StorageError};
use indexmap::IndexMap;
use jsonschema::error::ValidationErrorKind;
use jsonschema::Validator;
use serde_json::Value;

/// Compiled schema for one collection
pub struct SchemaValidator {
    collection: Collection,
    validator: Validator,
}

impl SchemaValidator {
    pub fn compile(collection: Collection) -> Result<Self, StorageError> {
        let validator =
            Validator::new(&collection.schema()).map_err(|e| StorageError::Connection {
                message: format!("Invalid schema for collection {}: {}", collection, e),
            })?;
        Ok(Self {
            collection,
            validator,
        })
    }

    /// Collect every violation, first one per field wins
    pub fn validate(&self, document: &Document) -> Result<(), StorageError> {
        let instance = Value::Object(document.clone());
        let mut errors: IndexMap<String, FieldViolation> = IndexMap::new();

        for error in self.validator.iter_errors(&instance) {
            let (field, violation) = match &error.kind {
                ValidationErrorKind::Required { property } => {
                    let field = property.as_str().unwrap_or_default().to_string();
                    let message = format!("Path `{}` is required.", field);
                    (field, FieldViolation::new(message, "required"))
                }
                kind => (
                    field_of(&error.instance_path.to_string()),
                    FieldViolation::new(error.to_string(), kind_name(kind)),
                ),
            };
            errors.entry(field).or_insert(violation);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            tracing::debug!(
                collection = %self.collection,
                fields = errors.len(),
                "document failed validation"
            );
            Err(StorageError::Validation { errors })
        }
    }
}

/// `/images/0` -> `images`
fn field_of(instance_path: &str) -> String {
    instance_path
        .trim_start_matches('/')
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("document")
        .to_string()
}

fn kind_name(kind: &ValidationErrorKind) -> &'static str {
    match kind {
        ValidationErrorKind::Minimum { .. } => "min",
        ValidationErrorKind::Maximum { .. } => "max",
        ValidationErrorKind::MinLength { .. } => "minlength",
        ValidationErrorKind::MaxLength { .. } => "maxlength",
        ValidationErrorKind::Enum { .. } => "enum",
        ValidationErrorKind::Pattern { .. } => "regexp",
        ValidationErrorKind::Type { .. } => "type",
        _ => "user defined",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test documents are objects"),
        }
    }

    #[test]
    fn valid_review_passes() {
        let validator = SchemaValidator::compile(Collection::Reviews).unwrap();
        let review = doc(json!({ "review": "Great!", "rating": 5, "tour": "t", "user": "u" }));
        assert!(validator.validate(&review).is_ok());
    }

    #[test]
    fn every_violated_field_is_reported() {
        let validator = SchemaValidator::compile(Collection::Reviews).unwrap();
        let review = doc(json!({ "review": "Bad", "rating": 9 }));
        match validator.validate(&review) {
            Err(StorageError::Validation { errors }) => {
                assert_eq!(errors.len(), 3);
                assert_eq!(errors["tour"].message, "Path `tour` is required.");
                assert_eq!(errors["tour"].kind, "required");
                assert_eq!(errors["rating"].kind, "max");
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn nested_paths_report_top_level_field() {
        assert_eq!(field_of("/images/0"), "images");
        assert_eq!(field_of("/price"), "price");
        assert_eq!(field_of(""), "document");
    }
}
