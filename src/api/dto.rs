use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    sensors::{QueryValue, DEFAULT_DEVICE_NAME},
    stream::ConnectionState,
};

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_owned()
}

fn default_selector() -> String {
    "accX".to_owned()
}

/// Query string for per-device endpoints.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeviceParams {
    /// Device name. Defaults to `RAB`.
    #[serde(default = "default_device_name")]
    pub name: String,
}

/// Query string for `GET /readings/axis`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AxisParams {
    /// Device name. Defaults to `RAB`.
    #[serde(default = "default_device_name")]
    pub name: String,
    /// One of `accX`, `accY`, `accZ`, `gyrX`, `gyrY`, `gyrZ`. Defaults to `accX`.
    #[serde(default = "default_selector")]
    pub selector: String,
}

/// Answer to a single query.
///
/// `value` is a string, number or boolean, or the string `"NOT_READY"` when
/// nothing is known about the device yet (`ready` is then `false`).
#[derive(Debug, Serialize, ToSchema)]
pub struct QueryResponseDto {
    pub name: String,
    pub ready: bool,
    #[schema(value_type = Object)]
    pub value: QueryValue,
}

impl QueryResponseDto {
    pub fn new(name: String, value: QueryValue) -> Self {
        Self {
            name,
            ready: value.is_ready(),
            value,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeviceDto {
    pub name: String,
    /// When the current reading for this device arrived.
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionDto {
    pub state: ConnectionState,
}
