pub mod config;
pub mod engine;
pub mod error;
pub mod feeds;
pub mod models;
pub mod signals;
pub mod telemetry;
