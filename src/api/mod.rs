pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::bridge::Bridge;
use handlers::ApiDoc;

pub fn router(bridge: Arc<Bridge>) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/connection", get(handlers::get_connection))
        .route("/devices", get(handlers::list_devices))
        .route("/devices/info", get(handlers::get_device_info))
        .route("/readings/status", get(handlers::get_status))
        .route("/readings/axis", get(handlers::get_axis))
        .route("/readings/trigger", get(handlers::get_trigger))
        .route("/readings/stored-count", get(handlers::get_stored_count))
        .with_state(bridge)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
