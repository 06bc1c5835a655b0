pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod lifecycle;
pub mod service;
pub mod streaming;
pub mod telemetry;
