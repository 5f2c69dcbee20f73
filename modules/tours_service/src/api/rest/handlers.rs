//! HTTP request handlers - thin layer that delegates to domain service
//!
//! Handlers only propagate failures with `?`; formatting belongs to the
//! global responder.

use super::dto::ResponseEnvelope;
use super::extract::RequestContext;
use crate::contract::{AppError, Collection, Failure};
use crate::domain::{QueryParams, Service};
use axum::{extract::OriginalUri, http::StatusCode, Json};
use serde_json::Value;
use std::sync::Arc;

/// Fixed parameters of the cheapest-tours alias
pub const TOP_CHEAP_LIMIT: &str = "5";
pub const TOP_CHEAP_SORT: &str = "-ratingsAverage,price";
pub const TOP_CHEAP_FIELDS: &str = "name,price,ratingsAverage,summary,difficulty";

/// List documents through the query translator
pub async fn list_documents(
    service: Arc<Service>,
    collection: Collection,
    context: RequestContext,
    params: QueryParams,
) -> Result<Json<ResponseEnvelope>, Failure> {
    let documents = service.list(collection, &params).await?;
    Ok(Json(ResponseEnvelope::list(
        collection.name(),
        documents,
        context.received_at,
    )))
}

/// Five best-rated, cheapest tours
pub async fn top_cheap_tours(
    service: Arc<Service>,
    context: RequestContext,
    params: QueryParams,
) -> Result<Json<ResponseEnvelope>, Failure> {
    let params = params
        .with("limit", TOP_CHEAP_LIMIT)
        .with("sort", TOP_CHEAP_SORT)
        .with("fields", TOP_CHEAP_FIELDS);
    list_documents(service, Collection::Tours, context, params).await
}

pub async fn get_document(
    service: Arc<Service>,
    collection: Collection,
    id: String,
) -> Result<Json<ResponseEnvelope>, Failure> {
    let document = service.get(collection, &id).await?;
    Ok(Json(ResponseEnvelope::document(collection.singular(), document)))
}

pub async fn create_document(
    service: Arc<Service>,
    collection: Collection,
    body: Value,
) -> Result<(StatusCode, Json<ResponseEnvelope>), Failure> {
    let document = service.create(collection, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(ResponseEnvelope::document(collection.singular(), document)),
    ))
}

pub async fn update_document(
    service: Arc<Service>,
    collection: Collection,
    id: String,
    body: Value,
) -> Result<Json<ResponseEnvelope>, Failure> {
    let document = service.update(collection, &id, body).await?;
    Ok(Json(ResponseEnvelope::document(collection.singular(), document)))
}

pub async fn delete_document(
    service: Arc<Service>,
    collection: Collection,
    id: String,
) -> Result<StatusCode, Failure> {
    service.delete(collection, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fallback for every unmatched route
pub async fn route_not_found(OriginalUri(uri): OriginalUri) -> Result<(), AppError> {
    Err(AppError::not_found(format!(
        "Can't find {} on this server!",
        uri
    )))
}
