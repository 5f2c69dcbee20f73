//! In-memory document store
//!
//! Behaves like a document database driver: UUID identifiers, schema
//! validation, unique indexes, and failures reported in driver shapes.

use super::matcher;
use super::validation::SchemaValidator;
use crate::contract::{
    Collection, Document, StorageError, CREATED_AT_FIELD, ID_FIELD, VERSION_FIELD,
};
use crate::domain::query::QuerySpec;
use crate::domain::repository::DocumentStore;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
    validators: HashMap<Collection, SchemaValidator>,
}

impl InMemoryDocumentStore {
    /// Compile every collection schema up front
    pub fn new() -> Result<Self, StorageError> {
        let mut validators = HashMap::new();
        for collection in Collection::ALL {
            validators.insert(collection, SchemaValidator::compile(collection)?);
        }
        Ok(Self {
            collections: RwLock::new(HashMap::new()),
            validators,
        })
    }

    /// Number of stored documents in a collection
    pub fn count(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .get(&collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Insert keeping a caller-supplied UUID `_id`, as seed imports need
    pub fn import(&self, collection: Collection, document: Document) -> Result<Document, StorageError> {
        let id = document
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);
        self.insert_with_id(collection, document, id)
    }

    fn validate(&self, collection: Collection, document: &Document) -> Result<(), StorageError> {
        match self.validators.get(&collection) {
            Some(validator) => validator.validate(document),
            None => Err(StorageError::Connection {
                message: format!("No schema registered for collection {}", collection),
            }),
        }
    }

    fn insert_with_id(
        &self,
        collection: Collection,
        document: Document,
        id: Uuid,
    ) -> Result<Document, StorageError> {
        let mut stored = collection.defaults();
        stored.extend(strip_managed_fields(document));
        self.validate(collection, &stored)?;

        let mut collections = self.collections.write();
        let documents = collections.entry(collection).or_default();
        if documents
            .iter()
            .any(|d| d.get(ID_FIELD).and_then(Value::as_str) == Some(id.to_string().as_str()))
        {
            return Err(StorageError::duplicate_key(
                collection.name(),
                ID_FIELD,
                &Value::String(id.to_string()),
            ));
        }
        check_unique(collection, documents, &stored, None)?;

        stored.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        stored.insert(
            CREATED_AT_FIELD.to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)),
        );
        stored.insert(VERSION_FIELD.to_string(), Value::from(0));
        documents.push(stored.clone());
        Ok(stored)
    }
}

fn strip_managed_fields(mut document: Document) -> Document {
    for field in [ID_FIELD, CREATED_AT_FIELD, VERSION_FIELD] {
        document.remove(field);
    }
    document
}

fn parse_id(id: &str) -> Result<String, StorageError> {
    Uuid::parse_str(id)
        .map(|uuid| uuid.to_string())
        .map_err(|_| StorageError::Cast {
            path: ID_FIELD.to_string(),
            value: id.to_string(),
            kind: "ObjectId".to_string(),
        })
}

fn has_id(document: &Document, id: &str) -> bool {
    document.get(ID_FIELD).and_then(Value::as_str) == Some(id)
}

/// Unique index check, skipping the document being replaced
fn check_unique(
    collection: Collection,
    documents: &[Document],
    candidate: &Document,
    replacing: Option<&str>,
) -> Result<(), StorageError> {
    for field in collection.unique_fields() {
        let Some(value) = candidate.get(*field) else {
            continue;
        };
        let taken = documents
            .iter()
            .filter(|d| replacing.map_or(true, |id| !has_id(d, id)))
            .any(|d| d.get(*field) == Some(value));
        if taken {
            return Err(StorageError::duplicate_key(collection.name(), field, value));
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(
        &self,
        collection: Collection,
        spec: &QuerySpec,
    ) -> Result<Vec<Document>, StorageError> {
        let filter = matcher::cast_filter(collection, spec)?;
        let mut found: Vec<Document> = self
            .collections
            .read()
            .get(&collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|d| matcher::matches(d, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        matcher::sort_documents(&mut found, spec.sort_keys());

        let page: Vec<Document> = match spec.pagination() {
            Some(p) => {
                let skip = usize::try_from(p.skip).unwrap_or(usize::MAX);
                let limit = usize::try_from(p.limit).unwrap_or(usize::MAX);
                found.into_iter().skip(skip).take(limit).collect()
            }
            None => found,
        };

        Ok(page
            .into_iter()
            .map(|d| matcher::project(d, spec.projection()))
            .collect())
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, StorageError> {
        let id = parse_id(id)?;
        Ok(self
            .collections
            .read()
            .get(&collection)
            .and_then(|documents| documents.iter().find(|d| has_id(d, &id)).cloned()))
    }

    async fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<Document, StorageError> {
        self.insert_with_id(collection, document, Uuid::new_v4())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        changes: Document,
    ) -> Result<Option<Document>, StorageError> {
        let id = parse_id(id)?;
        let mut collections = self.collections.write();
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(None);
        };
        let Some(index) = documents.iter().position(|d| has_id(d, &id)) else {
            return Ok(None);
        };

        let mut updated = documents[index].clone();
        updated.extend(strip_managed_fields(changes));
        self.validate(collection, &updated)?;
        check_unique(collection, documents, &updated, Some(&id))?;

        documents[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, StorageError> {
        let id = parse_id(id)?;
        let mut collections = self.collections.write();
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(None);
        };
        Ok(documents
            .iter()
            .position(|d| has_id(d, &id))
            .map(|index| documents.remove(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::{QueryParams, QueryTranslator};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test documents are objects"),
        }
    }

    fn tour(name: &str, price: u32, duration: u32) -> Document {
        doc(json!({
            "name": name,
            "duration": duration,
            "maxGroupSize": 10,
            "difficulty": "easy",
            "price": price,
            "summary": "Breathtaking hike",
            "imageCover": "tour-1-cover.jpg"
        }))
    }

    #[tokio::test]
    async fn insert_adds_managed_fields_and_defaults() {
        let store = InMemoryDocumentStore::new().unwrap();
        let stored = store
            .insert(Collection::Tours, tour("The Forest Hiker", 397, 5))
            .await
            .unwrap();
        assert!(Uuid::parse_str(stored[ID_FIELD].as_str().unwrap()).is_ok());
        assert!(stored.contains_key(CREATED_AT_FIELD));
        assert_eq!(stored[VERSION_FIELD], json!(0));
        assert_eq!(stored["ratingsAverage"], json!(4.5));
    }

    #[tokio::test]
    async fn duplicate_unique_field_is_rejected() {
        let store = InMemoryDocumentStore::new().unwrap();
        store.insert(Collection::Tours, tour("The Forest Hiker", 397, 5)).await.unwrap();
        let err = store
            .insert(Collection::Tours, tour("The Forest Hiker", 100, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Server { code: 11000, .. }));
        assert_eq!(store.count(Collection::Tours), 1);
    }

    #[tokio::test]
    async fn malformed_id_is_a_cast_error() {
        let store = InMemoryDocumentStore::new().unwrap();
        let err = store.find_by_id(Collection::Tours, "abc").await.unwrap_err();
        assert_eq!(
            err,
            StorageError::Cast {
                path: "_id".to_string(),
                value: "abc".to_string(),
                kind: "ObjectId".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn update_revalidates_and_keeps_own_unique_value() {
        let store = InMemoryDocumentStore::new().unwrap();
        let stored = store.insert(Collection::Tours, tour("The Forest Hiker", 397, 5)).await.unwrap();
        let id = stored[ID_FIELD].as_str().unwrap().to_string();

        let updated = store
            .update(Collection::Tours, &id, doc(json!({ "name": "The Forest Hiker", "price": 450 })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["price"], json!(450));

        let err = store
            .update(Collection::Tours, &id, doc(json!({ "price": -1 })))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation { .. }));
    }

    #[tokio::test]
    async fn find_applies_filter_sort_page_and_projection() {
        let store = InMemoryDocumentStore::new().unwrap();
        for (name, price, duration) in [
            ("The Forest Hiker", 397, 5),
            ("The Sea Explorer", 497, 7),
            ("The Snow Adventurer", 997, 4),
            ("The City Wanderer", 1197, 9),
        ] {
            store.insert(Collection::Tours, tour(name, price, duration)).await.unwrap();
        }

        let params = QueryParams::from_pairs([
            ("minPrice", "400"),
            ("sort", "-price"),
            ("fields", "name,price"),
            ("limit", "2"),
        ]);
        let found = QueryTranslator::new(&params)
            .filter(Collection::Tours.filter_policy())
            .sort()
            .limit_fields()
            .paginate()
            .execute(&store, Collection::Tours)
            .await
            .unwrap();

        let names: Vec<_> = found.iter().map(|d| d["name"].clone()).collect();
        assert_eq!(names, vec![json!("The City Wanderer"), json!("The Snow Adventurer")]);
        assert!(found.iter().all(|d| d.len() == 3));
    }

    #[tokio::test]
    async fn delete_returns_removed_document() {
        let store = InMemoryDocumentStore::new().unwrap();
        let stored = store.insert(Collection::Tours, tour("The Forest Hiker", 397, 5)).await.unwrap();
        let id = stored[ID_FIELD].as_str().unwrap().to_string();
        assert!(store.delete(Collection::Tours, &id).await.unwrap().is_some());
        assert!(store.delete(Collection::Tours, &id).await.unwrap().is_none());
    }
}
