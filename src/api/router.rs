//! API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//! Layers (outermost first): CORS, request log, handler.

use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the clinic API router.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/home", get(endpoints::home::dashboard))
        .route(
            "/patients",
            get(endpoints::patients::list).post(endpoints::patients::create),
        )
        .route(
            "/patients/:id",
            get(endpoints::patients::detail)
                .put(endpoints::patients::update)
                .delete(endpoints::patients::remove),
        )
        .route(
            "/doctors",
            get(endpoints::doctors::list).post(endpoints::doctors::register),
        )
        .route(
            "/doctors/:id",
            get(endpoints::doctors::detail)
                .put(endpoints::doctors::update)
                .delete(endpoints::doctors::remove),
        )
        .route(
            "/specializations",
            get(endpoints::specializations::list).post(endpoints::specializations::create),
        )
        .route(
            "/specializations/:id",
            axum::routing::put(endpoints::specializations::rename)
                .delete(endpoints::specializations::remove),
        )
        .route(
            "/visits",
            get(endpoints::visits::list).post(endpoints::visits::book),
        )
        .route(
            "/visits/:id",
            get(endpoints::visits::detail)
                .put(endpoints::visits::reschedule)
                .delete(endpoints::visits::remove),
        )
        .route("/admin/:kind", get(endpoints::admin::list))
        .route("/admin/:kind/:id", delete(endpoints::admin::purge_record))
        .route("/admin/:kind/:id/history", get(endpoints::admin::history))
        .route(
            "/admin/:kind/:id/restore",
            post(endpoints::admin::restore_record),
        )
        .with_state(ctx)
        .layer(axum::middleware::from_fn(middleware::request_log::log_request))
        .layer(cors);

    Router::new().nest("/api", api)
}
