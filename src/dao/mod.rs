//! Storage layer: entities, the [`session_store::SessionStore`] abstraction,
//! and the in-memory reference backend.

/// Persisted entity types.
pub mod models;
/// The [`session_store::SessionStore`] trait and the in-memory backend.
pub mod session_store;
/// Backend-agnostic storage errors.
pub mod storage;
