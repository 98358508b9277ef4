//! Error types for resource-group operations.

use thiserror::Error;

/// Errors produced by selector resolution, configuration, and admission control.
///
/// Every variant is reported synchronously to the caller of the failing
/// operation. Nothing in this crate retries internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceGroupError {
    /// A group identifier or template is empty or has a malformed segment.
    #[error("invalid resource group identifier: {0}")]
    InvalidIdentifier(String),
    /// A template references a variable that the query context does not bind.
    #[error("missing template variable: {0}")]
    MissingVariable(String),
    /// The configuration document failed parsing or validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No selector matched the query context.
    #[error("no selector matched query {0}")]
    NoMatchingSelector(String),
    /// The resolved group has no specification chain in the active configuration.
    #[error("no resource group specification for {0}")]
    MissingResourceGroupSpec(String),
    /// The leaf group queue is at its configured maximum.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// A query with the same identifier is already queued or running.
    #[error("duplicate query: {0}")]
    DuplicateQuery(String),
    /// The query identifier is not tracked by the manager.
    #[error("unknown query: {0}")]
    UnknownQuery(String),
    /// The query is running and cannot be withdrawn.
    #[error("query {0} is not queued")]
    NotQueued(String),
    /// The query is still queued and cannot be completed.
    #[error("query {0} is not running")]
    NotRunning(String),
}

impl ResourceGroupError {
    /// Short machine-readable reason code, used in API responses and audit events.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::MissingVariable(_) => "missing_variable",
            Self::InvalidConfig(_) => "invalid_config",
            Self::NoMatchingSelector(_) => "no_matching_selector",
            Self::MissingResourceGroupSpec(_) => "missing_resource_group_spec",
            Self::QueueFull(_) => "queue_full",
            Self::DuplicateQuery(_) => "duplicate_query",
            Self::UnknownQuery(_) => "unknown_query",
            Self::NotQueued(_) => "not_queued",
            Self::NotRunning(_) => "not_running",
        }
    }
}

/// Result alias for resource-group operations.
pub type Result<T> = std::result::Result<T, ResourceGroupError>;

/// Application-facing result using anyhow for file and environment loaders.
pub type AppResult<T> = std::result::Result<T, anyhow::Error>;
