//! Shared application state handed to every route handler and worker.

/// Pure status transition and advancement rules.
pub mod machine;

use std::sync::Arc;

use crate::{
    config::AppConfig, dao::session_store::SessionStore, services::collaborators::Collaborators,
};

/// Cheaply clonable handle on the application state.
pub type SharedState = Arc<AppState>;

/// Central application state.
///
/// Deliberately tiny: the store is the single source of truth across
/// instances, so nothing session- or task-scoped is cached here.
pub struct AppState {
    store: Arc<dyn SessionStore>,
    collaborators: Collaborators,
    config: AppConfig,
}

impl AppState {
    /// Construct the shared state wrapped in an [`Arc`].
    pub fn new(
        store: Arc<dyn SessionStore>,
        collaborators: Collaborators,
        config: AppConfig,
    ) -> SharedState {
        Arc::new(Self {
            store,
            collaborators,
            config,
        })
    }

    /// Handle on the shared durable store.
    pub fn store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    /// Collaborator handles used by the background executors.
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
