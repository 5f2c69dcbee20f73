//! Tours Service Module
//!
//! REST backend for tours, users and reviews stored as JSON documents.
//! Every failure a handler produces funnels through one environment-aware
//! responder; list endpoints translate URL query parameters into a single
//! filtered, sorted, projected and paginated read.

// Public exports
pub mod contract;
pub use contract::{AppError, Collection, Document, ErrorKind, Failure, ResponseStatus, StorageError};

pub mod config;
pub use config::{Config, Environment};

pub mod supervisor;
pub use supervisor::CrashSupervisor;

pub mod module;
pub use module::ToursServiceModule;

pub mod logging;

// Internal modules (hidden from public API)
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
