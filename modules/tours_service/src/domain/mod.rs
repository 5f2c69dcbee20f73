//! Domain layer - query translation, collection rules and CRUD service

pub mod collections;
pub mod query;
pub mod repository;
pub mod service;

pub use query::{FilterPolicy, QueryParams, QuerySpec, QueryTranslator};
pub use repository::DocumentStore;
pub use service::Service;
