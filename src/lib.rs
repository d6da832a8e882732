pub mod apis;
pub mod config;
pub mod constants;
pub mod error;
pub mod graphql;
pub mod logging;
pub mod storage;
pub mod types;

// Use cases and their ports
pub mod app;
// Adapters behind the ports
pub mod infra;
