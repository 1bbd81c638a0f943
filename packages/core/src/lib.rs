// Library root. The binary in `src/main.rs` and the integration tests in
// `tests/` both build on these modules.

pub mod chain;
pub mod coin;
pub mod db;
pub mod error;
pub mod metrics;
pub mod queries;
pub mod query;
pub mod repository;
pub mod services;
pub mod store;

// Only needed by the binary.
pub mod cli;
pub mod config;
pub mod logging;
