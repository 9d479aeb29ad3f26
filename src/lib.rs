pub mod cli;
pub mod config;
pub mod error;
pub mod football_data;
pub mod http_cache;
pub mod http_client;
pub mod memory_store;
pub mod model;
pub mod render;
pub mod scoring;
pub mod sqlite_store;
pub mod store;
pub mod submission;
pub mod telemetry;
