pub mod api;
pub mod bridge;
pub mod config;
pub mod metadata;
pub mod reading_cache;
pub mod sensors;
pub mod stream;
