//! Evaluation of a `QuerySpec` over in-memory documents

use crate::contract::{Collection, Document, StorageError, ID_FIELD};
use crate::domain::query::{Condition, Projection, QuerySpec, Range, SortDirection, SortKey};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Ordering of values of different types: null < number < string < object < array < bool
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order used for sorting
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Comparison for filtering; values of different types never match
fn comparable(a: &Value, b: &Value) -> Option<Ordering> {
    if type_rank(a) == type_rank(b) && matches!(a, Value::Number(_) | Value::String(_) | Value::Bool(_)) {
        Some(compare_values(a, b))
    } else if a == b {
        Some(Ordering::Equal)
    } else {
        None
    }
}

fn equals(field: &Value, expected: &Value) -> bool {
    match field {
        Value::Array(items) if !expected.is_array() => {
            items.iter().any(|item| comparable(item, expected) == Some(Ordering::Equal))
        }
        _ => comparable(field, expected) == Some(Ordering::Equal),
    }
}

fn within(field: &Value, range: &Range) -> bool {
    range.bounds().iter().all(|(op, bound)| match bound {
        None => true,
        Some(bound) => match comparable(field, bound) {
            Some(ordering) => match *op {
                "gte" => ordering != Ordering::Less,
                "gt" => ordering == Ordering::Greater,
                "lte" => ordering != Ordering::Greater,
                "lt" => ordering == Ordering::Less,
                _ => false,
            },
            None => false,
        },
    })
}

pub fn matches(document: &Document, filter: &BTreeMap<String, Condition>) -> bool {
    filter.iter().all(|(field, condition)| {
        let Some(value) = document.get(field) else {
            return false;
        };
        match condition {
            Condition::Eq(expected) => equals(value, expected),
            Condition::In(options) => options.iter().any(|o| equals(value, o)),
            Condition::Range(range) => within(value, range),
        }
    })
}

/// Stable multi-key sort; missing fields sort as null
pub fn sort_documents(documents: &mut [Document], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    documents.sort_by(|a, b| {
        for key in keys {
            let left = a.get(&key.field).unwrap_or(&Value::Null);
            let right = b.get(&key.field).unwrap_or(&Value::Null);
            let ordering = match key.direction {
                SortDirection::Ascending => compare_values(left, right),
                SortDirection::Descending => compare_values(right, left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Inclusion keeps `_id` as well
pub fn project(document: Document, projection: &Projection) -> Document {
    match projection {
        Projection::All => document,
        Projection::Include(fields) => document
            .into_iter()
            .filter(|(key, _)| key == ID_FIELD || fields.iter().any(|f| f == key))
            .collect(),
        Projection::Exclude(fields) => document
            .into_iter()
            .filter(|(key, _)| !fields.iter().any(|f| f == key))
            .collect(),
    }
}

/// Cast filter values to the types the schema declares
pub fn cast_filter(
    collection: Collection,
    spec: &QuerySpec,
) -> Result<BTreeMap<String, Condition>, StorageError> {
    let mut filter = BTreeMap::new();
    for (field, condition) in spec.filter() {
        let declared = collection.field_type(field);
        let cast = |value: &Value| cast_value(field, declared.as_deref(), value);
        let condition = match condition {
            Condition::Eq(v) => Condition::Eq(cast(v)?),
            Condition::In(vs) => Condition::In(vs.iter().map(&cast).collect::<Result<_, _>>()?),
            Condition::Range(range) => {
                let mut casted = Range::default();
                for (slot, bound) in [
                    (&mut casted.gte, &range.gte),
                    (&mut casted.gt, &range.gt),
                    (&mut casted.lte, &range.lte),
                    (&mut casted.lt, &range.lt),
                ] {
                    if let Some(value) = bound {
                        *slot = Some(cast(value)?);
                    }
                }
                Condition::Range(casted)
            }
        };
        filter.insert(field.clone(), condition);
    }
    Ok(filter)
}

fn cast_value(field: &str, declared: Option<&str>, value: &Value) -> Result<Value, StorageError> {
    let cast_error = |kind: &str| StorageError::Cast {
        path: field.to_string(),
        value: match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
        kind: kind.to_string(),
    };
    match (declared, value) {
        (Some("number") | Some("integer"), Value::Number(_)) => Ok(value.clone()),
        (Some("number") | Some("integer"), _) => Err(cast_error("Number")),
        (Some("boolean"), Value::Bool(_)) => Ok(value.clone()),
        (Some("boolean"), _) => Err(cast_error("Boolean")),
        (Some("string"), Value::Number(n)) => Ok(Value::String(n.to_string())),
        (Some("string"), Value::Bool(b)) => Ok(Value::String(b.to_string())),
        _ => Ok(value.clone()),
    }
}
