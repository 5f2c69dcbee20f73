//! Domain service - CRUD orchestration over the document store

use crate::contract::{AppError, Collection, Document, Failure};
use crate::domain::query::{QueryParams, QueryTranslator};
use crate::domain::repository::DocumentStore;
use serde_json::Value;
use std::sync::Arc;

/// Domain service shared by every collection's handlers
pub struct Service {
    store: Arc<dyn DocumentStore>,
}

impl Service {
    /// Create a new service instance
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Translate the query parameters and run one read
    pub async fn list(
        &self,
        collection: Collection,
        params: &QueryParams,
    ) -> Result<Vec<Document>, Failure> {
        let documents = QueryTranslator::new(params)
            .filter(collection.filter_policy())
            .sort()
            .limit_fields()
            .paginate()
            .execute(self.store(), collection)
            .await?;
        Ok(documents)
    }

    pub async fn get(&self, collection: Collection, id: &str) -> Result<Document, Failure> {
        match self.store.find_by_id(collection, id).await? {
            Some(document) => Ok(document),
            None => Err(not_found(collection).into()),
        }
    }

    pub async fn create(&self, collection: Collection, body: Value) -> Result<Document, Failure> {
        let document = into_document(body)?;
        let created = self.store.insert(collection, document).await?;
        tracing::debug!(collection = %collection, "document created");
        Ok(created)
    }

    pub async fn update(
        &self,
        collection: Collection,
        id: &str,
        body: Value,
    ) -> Result<Document, Failure> {
        let changes = into_document(body)?;
        match self.store.update(collection, id, changes).await? {
            Some(document) => Ok(document),
            None => Err(not_found(collection).into()),
        }
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> Result<(), Failure> {
        match self.store.delete(collection, id).await? {
            Some(_) => Ok(()),
            None => Err(not_found(collection).into()),
        }
    }
}

#[track_caller]
fn not_found(collection: Collection) -> AppError {
    AppError::not_found(format!("No {} found with that ID", collection.singular()))
}

#[track_caller]
fn into_document(body: Value) -> Result<Document, AppError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::invalid_input("Request body must be a JSON object")),
    }
}
