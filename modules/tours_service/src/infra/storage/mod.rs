//! Storage layer - in-memory document store and seed import

pub mod matcher;
pub mod memory;
pub mod seed;
pub mod validation;

pub use memory::InMemoryDocumentStore;
pub use seed::import_seed_file;
