// Library root. Exposes the modules the binary and `tests/` share.
// Production entry point remains `src/main.rs`.

pub mod api;
pub mod auth;
pub mod cache;
pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod repository;
pub mod scheduler;

// Binary plumbing. Public so integration tests can build a `Config`.
pub mod cli;
pub mod config;
pub mod logging;
