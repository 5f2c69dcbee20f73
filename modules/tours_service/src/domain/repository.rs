//! Repository trait for document access
//!
//! Implementations live in infra/storage. Failures are reported in the
//! driver's own shapes; translating them is the REST layer's job.

use crate::contract::{Collection, Document, StorageError};
use crate::domain::query::QuerySpec;
use async_trait::async_trait;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a single read described by `spec`
    async fn find(
        &self,
        collection: Collection,
        spec: &QuerySpec,
    ) -> Result<Vec<Document>, StorageError>;

    /// Find by identifier; a malformed identifier is a cast failure
    async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, StorageError>;

    /// Validate and insert, returning the stored document
    async fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<Document, StorageError>;

    /// Merge `changes` into an existing document and re-validate it
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        changes: Document,
    ) -> Result<Option<Document>, StorageError>;

    /// Remove a document, returning it if it existed
    async fn delete(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, StorageError>;
}
