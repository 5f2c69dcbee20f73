//! Global error responder
//!
//! Handlers return `Result<_, Failure>`. `Failure::into_response` only parks
//! the failure in the response extensions; `global_error_responder` is the
//! single place that turns it into a client response, according to the
//! configured environment.

use super::dto::ResponseEnvelope;
use super::extract::RequestContext;
use super::AppState;
use crate::config::Environment;
use crate::contract::{
    AppError, Failure, ResponseStatus, StorageError, DUPLICATE_KEY_CODE,
};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Body message for every non-operational failure in production
pub const GENERIC_MESSAGE: &str = "Something went very wrong!";

/// First single- or double-quoted substring, quotes included
static QUOTED_VALUE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""(?:\\.|[^"\\])*"|'(?:\\.|[^'\\])*'"#).ok());

/// A failure waiting for the responder
#[derive(Debug, Clone)]
pub struct CapturedFailure(pub Arc<Failure>);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response
            .extensions_mut()
            .insert(CapturedFailure(Arc::new(self)));
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        Failure::from(self).into_response()
    }
}

/// Middleware rendering every captured failure
pub async fn global_error_responder(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let context = request.extensions().get::<RequestContext>().cloned();
    let mut response = next.run(request).await;
    match response.extensions_mut().remove::<CapturedFailure>() {
        Some(CapturedFailure(failure)) => {
            respond(&failure, state.config.environment, context.as_ref())
        }
        None => response,
    }
}

/// Render and log one failure
pub fn respond(
    failure: &Failure,
    environment: Environment,
    context: Option<&RequestContext>,
) -> Response {
    let rendered = render(failure, environment);
    let (method, path, requested_at) = match context {
        Some(ctx) => (
            ctx.method.as_str(),
            ctx.path.as_str(),
            ctx.received_at.to_rfc3339(),
        ),
        None => ("-", "-", String::new()),
    };

    if rendered.status_code >= 500 {
        tracing::error!(
            %method, %path, %requested_at,
            status_code = rendered.status_code,
            name = failure.name(),
            error = %failure,
            "request failed"
        );
    } else {
        tracing::warn!(
            %method, %path, %requested_at,
            status_code = rendered.status_code,
            name = failure.name(),
            message = %failure.message(),
            "request rejected"
        );
    }

    let status =
        StatusCode::from_u16(rendered.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(rendered.body)).into_response()
}

/// Status and body chosen for a failure
#[derive(Debug, Clone)]
pub struct Rendered {
    pub status_code: u16,
    pub body: ResponseEnvelope,
}

pub fn render(failure: &Failure, environment: Environment) -> Rendered {
    match environment {
        Environment::Development => render_development(failure),
        Environment::Production => render_production(failure),
    }
}

fn render_development(failure: &Failure) -> Rendered {
    let status_code = failure.status_code().unwrap_or(500);
    let status = failure.status().unwrap_or(ResponseStatus::Error);
    let body = ResponseEnvelope::failure(status, failure.message())
        .with_error(failure.describe(status_code, status), failure.trace());
    Rendered { status_code, body }
}

fn render_production(failure: &Failure) -> Rendered {
    let translated = translate(failure);
    let effective = match &translated {
        Some(app) => Some(app),
        None => match failure {
            Failure::App(app) => Some(app),
            Failure::Storage(_) | Failure::Defect(_) => None,
        },
    };

    match effective {
        Some(app) if app.is_operational() => Rendered {
            status_code: app.status_code(),
            body: ResponseEnvelope::failure(app.status(), app.message()),
        },
        _ => {
            tracing::error!(
                name = failure.name(),
                trace = %failure.trace(),
                "non-operational failure: {}",
                failure
            );
            Rendered {
                status_code: 500,
                body: ResponseEnvelope::failure(ResponseStatus::Error, GENERIC_MESSAGE),
            }
        }
    }
}

/// Map recognized storage shapes onto operational errors
pub fn translate(failure: &Failure) -> Option<AppError> {
    let Failure::Storage(err) = failure else {
        return None;
    };
    match err {
        StorageError::Cast { path, value, .. } => {
            Some(AppError::invalid_input(format!("Invalid {}: {}.", path, value)))
        }
        StorageError::Server { code, errmsg } if *code == DUPLICATE_KEY_CODE => {
            let value = QUOTED_VALUE.as_ref()?.find(errmsg)?.as_str();
            Some(AppError::conflict(format!(
                "Duplicate field value: {}. Please use another value!",
                value
            )))
        }
        StorageError::Validation { errors } => Some(AppError::aggregate_validation(
            errors.values().map(|violation| violation.message.as_str()),
        )),
        StorageError::Server { .. } | StorageError::Connection { .. } => None,
    }
}
