//! Route registration

use super::capture::{capture, with_failure_capture};
use super::error::global_error_responder;
use super::extract::{stamp_request, JsonBody, RecordId, RequestContext};
use super::{handlers, AppState};
use crate::contract::Collection;
use crate::domain::QueryParams;
use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

/// API prefix shared by every resource
pub const API_PREFIX: &str = "/api/v1";

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    let mut router = Router::new().route(
        &format!("{}/tours/top-5-cheap", API_PREFIX),
        get(top_cheap_tours_handler),
    );
    for collection in Collection::ALL {
        router = register_collection(router, collection);
    }

    router
        .fallback(with_failure_capture(handlers::route_not_found))
        .method_not_allowed_fallback(with_failure_capture(handlers::route_not_found))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            global_error_responder,
        ))
        .layer(middleware::from_fn(stamp_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CRUD routes for one collection
fn register_collection(router: Router<AppState>, collection: Collection) -> Router<AppState> {
    let base = format!("{}/{}", API_PREFIX, collection.name());
    let item = format!("{}/{{id}}", base);

    router
        .route(
            &base,
            get(
                move |State(state): State<AppState>, context: RequestContext, params: QueryParams| {
                    capture(handlers::list_documents(state.service, collection, context, params))
                },
            )
            .post(move |State(state): State<AppState>, JsonBody(body): JsonBody| {
                capture(handlers::create_document(state.service, collection, body))
            }),
        )
        .route(
            &item,
            get(move |State(state): State<AppState>, RecordId(id): RecordId| {
                capture(handlers::get_document(state.service, collection, id))
            })
            .patch(
                move |State(state): State<AppState>, RecordId(id): RecordId, JsonBody(body): JsonBody| {
                    capture(handlers::update_document(state.service, collection, id, body))
                },
            )
            .delete(move |State(state): State<AppState>, RecordId(id): RecordId| {
                capture(handlers::delete_document(state.service, collection, id))
            }),
        )
}

// ===== Handler wrappers that extract the service from state =====

async fn top_cheap_tours_handler(
    State(state): State<AppState>,
    context: RequestContext,
    params: QueryParams,
) -> axum::response::Response {
    capture(handlers::top_cheap_tours(state.service, context, params)).await
}
