//! Contract layer - transport-agnostic errors and models
//!
//! Nothing here depends on HTTP. The REST layer maps these onto responses.

pub mod error;
pub mod failure;
pub mod model;
pub mod storage;

pub use error::{AppError, ErrorKind, ResponseStatus};
pub use failure::Failure;
pub use model::{Collection, Document, CREATED_AT_FIELD, ID_FIELD, VERSION_FIELD};
pub use storage::{FieldViolation, StorageError, DUPLICATE_KEY_CODE};
