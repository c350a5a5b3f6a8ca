mod middleware;
mod products;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    application::{logic::LogicStage, mutations::ProductMutationService},
    cache::{CacheState, response_cache_layer},
    presentation::views::{HomeTemplate, render_not_found_response, render_template_response},
};

use middleware::{log_responses, set_request_context};

pub use middleware::RequestContext;

pub(crate) const PRODUCTS_SLOT: &str = "#products-slot";
pub(crate) const PRODUCTS_GRID: &str = "#products-grid";
pub(crate) const PRODUCTS_PAGER: &str = "#products-pager";
pub(crate) const MUTATION_STATUS: &str = "#mutation-status";

#[derive(Clone)]
pub struct HttpState {
    pub logic: LogicStage,
    pub mutations: Arc<ProductMutationService>,
    pub cache: Option<CacheState>,
}

pub fn build_router(state: HttpState) -> Router {
    // The response cache skips non-GET, datastar and event-stream traffic.
    let cached_routes = Router::new()
        .route("/", get(home))
        .route(
            "/products",
            get(products::shell).post(products::create),
        )
        .fallback(fallback);

    let cached_routes = if let Some(cache_state) = state.cache.clone() {
        cached_routes.layer(axum_middleware::from_fn_with_state(
            cache_state,
            response_cache_layer,
        ))
    } else {
        cached_routes
    };

    let stream_routes = Router::new()
        .route("/products/resolve", get(products::resolve))
        .route("/products/refresh", get(products::refresh))
        .route("/_health", get(health));

    cached_routes
        .merge(stream_routes)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn home() -> Response {
    render_template_response(HomeTemplate, StatusCode::OK)
}

async fn health() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

async fn fallback() -> Response {
    render_not_found_response()
}
