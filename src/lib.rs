pub mod app;
pub mod artifact;
pub mod cleaning;
pub mod config;
pub mod error;
pub mod infra;
pub mod logging;
