pub mod models;
pub mod queries;

pub use models::{DecodeError, Reading};
pub use queries::{Axis, Queries, QueryError, QueryValue, Selector, Sensor, DEFAULT_DEVICE_NAME, NOT_READY};
