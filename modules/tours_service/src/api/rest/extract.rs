//! Request extractors whose rejections take the failure path

use crate::contract::{AppError, Failure};
use crate::domain::QueryParams;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request},
    http::{request::Parts, Method, Uri},
    middleware::Next,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Per-request facts stamped before routing
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    fn from_request_line(method: &Method, uri: &Uri) -> Self {
        Self {
            method: method.clone(),
            path: uri.path().to_string(),
            query: parse_query(uri).unwrap_or_default(),
            received_at: Utc::now(),
        }
    }
}

/// Middleware stamping a `RequestContext` once per request
pub async fn stamp_request(mut request: Request, next: Next) -> Response {
    let context = RequestContext::from_request_line(request.method(), request.uri());
    request.extensions_mut().insert(context);
    next.run(request).await
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match parts.extensions.get::<RequestContext>() {
            Some(context) => context.clone(),
            None => RequestContext::from_request_line(&parts.method, &parts.uri),
        })
    }
}

fn parse_query(uri: &Uri) -> Result<QueryParams, AppError> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map_err(|rejection| AppError::invalid_input(rejection.body_text()))?;
    Ok(QueryParams::from_pairs(pairs))
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parse_query(&parts.uri)?)
    }
}

/// `{id}` path segment
#[derive(Debug, Clone)]
pub struct RecordId(pub String);

impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::new(rejection.body_text(), rejection.status().as_u16()))?;
        Ok(Self(id))
    }
}

/// JSON request body; malformed or oversized bodies become operational errors
#[derive(Debug, Clone)]
pub struct JsonBody(pub Value);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = Failure;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(request, state)
            .await
            .map_err(json_rejection)?;
        Ok(Self(value))
    }
}

#[track_caller]
pub fn json_rejection(rejection: JsonRejection) -> AppError {
    AppError::new(rejection.body_text(), rejection.status().as_u16())
}
