//! REST API layer

pub mod capture;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;

use crate::config::Config;
use crate::domain::Service;
use std::sync::Arc;

/// Router state shared by handlers and the error responder
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
    pub config: Arc<Config>,
}
