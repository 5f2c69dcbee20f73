//! Seed data import
//!
//! A seed file is a JSON object mapping collection names to document arrays:
//! `{ "tours": [ {...}, ... ], "users": [ ... ] }`.

use super::memory::InMemoryDocumentStore;
use crate::contract::{Collection, Document, StorageError};
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::Path;

/// Import every document in the file, returning how many were stored
pub async fn import_seed_file(store: &InMemoryDocumentStore, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StorageError::Connection {
            message: format!("Cannot open seed file {}: {}", path.display(), e),
        })?;
    let seed: BTreeMap<String, Vec<Document>> = serde_json::from_str(&raw)
        .with_context(|| format!("Seed file {} is not a collection map", path.display()))?;

    let mut imported = 0;
    for (name, documents) in seed {
        let collection = Collection::from_name(&name)
            .with_context(|| format!("Unknown collection '{}' in seed file", name))?;
        for document in documents {
            store.import(collection, document)?;
            imported += 1;
        }
        tracing::info!(collection = %collection, total = store.count(collection), "seed data imported");
    }
    Ok(imported)
}
