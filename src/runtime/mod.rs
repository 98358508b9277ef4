//! Runtime adapters and the serializable API surface.

use std::future::Future;

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod reload;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

pub use api::{
    complete_query, health, submit_query, AdmissionResponse, CompletionResponse, Health,
    QuerySubmission,
};
#[cfg(feature = "tokio-runtime")]
pub use reload::{ConfigurationReloader, ConfigurationSource, FileConfigurationSource, ReloadHandle};
#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;

/// Spawner abstraction so background work can run on any executor.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
