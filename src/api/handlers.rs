use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use utoipa::OpenApi;

use super::{
    dto::{AxisParams, ConnectionDto, DeviceDto, DeviceParams, QueryResponseDto},
    errors::AppError,
};
use crate::{
    bridge::Bridge,
    sensors::{QueryValue, NOT_READY},
    stream::ConnectionState,
};

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Accelerometer and gyroscope summary, e.g. `Acc: 1,2,3, Gyr: 4,5,6`.
#[utoipa::path(
    get,
    path = "/readings/status",
    params(DeviceParams),
    responses(
        (status = 200, description = "Status summary or NOT_READY", body = QueryResponseDto),
    ),
    tag = "readings"
)]
pub async fn get_status(
    State(bridge): State<Arc<Bridge>>,
    Query(params): Query<DeviceParams>,
) -> Json<QueryResponseDto> {
    let value = bridge.queries().status(&params.name);
    Json(QueryResponseDto::new(params.name, value))
}

/// Single accelerometer or gyroscope component.
#[utoipa::path(
    get,
    path = "/readings/axis",
    params(AxisParams),
    responses(
        (status = 200, description = "Axis value or NOT_READY", body = QueryResponseDto),
        (status = 400, description = "Unknown selector"),
    ),
    tag = "readings"
)]
pub async fn get_axis(
    State(bridge): State<Arc<Bridge>>,
    Query(params): Query<AxisParams>,
) -> Result<Json<QueryResponseDto>, AppError> {
    let value = bridge
        .queries()
        .axis_by_name(&params.name, &params.selector)
        .map_err(AppError::bad_request)?;
    Ok(Json(QueryResponseDto::new(params.name, value)))
}

/// Whether the device is currently triggered.
#[utoipa::path(
    get,
    path = "/readings/trigger",
    params(DeviceParams),
    responses(
        (status = 200, description = "Trigger state or NOT_READY", body = QueryResponseDto),
    ),
    tag = "readings"
)]
pub async fn get_trigger(
    State(bridge): State<Arc<Bridge>>,
    Query(params): Query<DeviceParams>,
) -> Json<QueryResponseDto> {
    let value = bridge.queries().trigger(&params.name);
    Json(QueryResponseDto::new(params.name, value))
}

/// Number of samples stored on the device.
#[utoipa::path(
    get,
    path = "/readings/stored-count",
    params(DeviceParams),
    responses(
        (status = 200, description = "Stored sample count or NOT_READY", body = QueryResponseDto),
    ),
    tag = "readings"
)]
pub async fn get_stored_count(
    State(bridge): State<Arc<Bridge>>,
    Query(params): Query<DeviceParams>,
) -> Json<QueryResponseDto> {
    let value = bridge.queries().stored_count(&params.name);
    Json(QueryResponseDto::new(params.name, value))
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// Devices with a cached reading on the current connection.
#[utoipa::path(
    get,
    path = "/devices",
    responses(
        (status = 200, description = "Cached devices, sorted by name", body = Vec<DeviceDto>),
    ),
    tag = "devices"
)]
pub async fn list_devices(State(bridge): State<Arc<Bridge>>) -> Json<Vec<DeviceDto>> {
    let devices = bridge
        .cache()
        .entries()
        .into_iter()
        .map(|(name, received_at)| DeviceDto { name, received_at })
        .collect();
    Json(devices)
}

/// Device metadata fetched on demand from the sensor service. `value` holds
/// the upstream JSON serialised as a string.
#[utoipa::path(
    get,
    path = "/devices/info",
    params(DeviceParams),
    responses(
        (status = 200, description = "Device metadata or NOT_READY", body = QueryResponseDto),
    ),
    tag = "devices"
)]
pub async fn get_device_info(
    State(bridge): State<Arc<Bridge>>,
    Query(params): Query<DeviceParams>,
) -> Json<QueryResponseDto> {
    let body = bridge.device_info(&params.name).await;
    let value = if body == NOT_READY {
        QueryValue::NotReady
    } else {
        QueryValue::Text(body)
    };
    Json(QueryResponseDto::new(params.name, value))
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// State of the stream connection.
#[utoipa::path(
    get,
    path = "/connection",
    responses(
        (status = 200, description = "Current connection state", body = ConnectionDto),
    ),
    tag = "system"
)]
pub async fn get_connection(State(bridge): State<Arc<Bridge>>) -> Json<ConnectionDto> {
    Json(ConnectionDto {
        state: bridge.connection_state(),
    })
}

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        get_status,
        get_axis,
        get_trigger,
        get_stored_count,
        list_devices,
        get_device_info,
        get_connection,
        health
    ),
    components(schemas(QueryResponseDto, DeviceDto, ConnectionDto, ConnectionState)),
    tags(
        (name = "readings", description = "Latest sensor readings per device"),
        (name = "devices",  description = "Device listing and metadata"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "Rabboni Bridge API",
        version = "0.1.0",
        description = "Live Rabboni sensor readings served from an in-memory cache"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
