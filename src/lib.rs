//! Library crate for pubquiz-back, exposing modules for binaries and integration tests.

/// Runtime configuration loading.
pub mod config;
/// Storage entities, the store abstraction, and the in-memory backend.
pub mod dao;
/// Request, response, and stream payload types.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// Business logic over the shared state.
pub mod services;
/// Shared application state and the pure session machine.
pub mod state;
