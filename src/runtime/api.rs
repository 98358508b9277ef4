//! API-facing request/response models.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::{
    AdmissionOutcome, QueryContext, QueryId, ResourceGroupId, ResourceGroupManager, Result,
    StartedQuery, DEFAULT_QUERY_PRIORITY,
};

/// Query submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySubmission {
    /// Query identifier.
    pub query_id: QueryId,
    /// Submitting user.
    pub user: String,
    /// Client-declared source.
    #[serde(default)]
    pub source: Option<String>,
    /// Query type.
    #[serde(default)]
    pub query_type: Option<String>,
    /// Client tags.
    #[serde(default)]
    pub client_tags: BTreeSet<String>,
    /// Priority; higher runs first under `QUERY_PRIORITY`.
    #[serde(default)]
    pub priority: Option<i32>,
}

impl From<QuerySubmission> for QueryContext {
    fn from(req: QuerySubmission) -> Self {
        Self {
            query_id: req.query_id,
            user: req.user,
            source: req.source,
            query_type: req.query_type,
            client_tags: req.client_tags,
            priority: req.priority.unwrap_or(DEFAULT_QUERY_PRIORITY),
        }
    }
}

/// Admission decision as returned to the execution layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdmissionResponse {
    /// The query may start now.
    #[serde(rename_all = "camelCase")]
    Admitted {
        /// Query identifier.
        query_id: QueryId,
        /// Leaf group charged.
        group: ResourceGroupId,
    },
    /// The query waits for capacity.
    #[serde(rename_all = "camelCase")]
    Queued {
        /// Query identifier.
        query_id: QueryId,
        /// Leaf group holding the entry.
        group: ResourceGroupId,
        /// 1-based position at enqueue time.
        position: usize,
    },
    /// The query was refused.
    #[serde(rename_all = "camelCase")]
    Rejected {
        /// Query identifier.
        query_id: QueryId,
        /// Stable reason code, e.g. `queue_full`.
        reason: String,
        /// Human-readable message.
        message: String,
    },
}

/// Completion result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    /// Query that finished.
    pub query_id: QueryId,
    /// Queued queries started as a result.
    pub started: Vec<StartedQuery>,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Active configuration version.
    pub config_version: u64,
    /// Running queries across all roots.
    pub running: u32,
    /// Queued queries across all groups.
    pub queued: usize,
}

/// Submit a query and map the outcome to a response.
pub fn submit_query(manager: &ResourceGroupManager, req: QuerySubmission) -> AdmissionResponse {
    let context = QueryContext::from(req);
    match manager.admit_query(&context) {
        Ok(AdmissionOutcome::Admitted { group }) => AdmissionResponse::Admitted {
            query_id: context.query_id,
            group,
        },
        Ok(AdmissionOutcome::Queued { group, position }) => AdmissionResponse::Queued {
            query_id: context.query_id,
            group,
            position,
        },
        Err(e) => AdmissionResponse::Rejected {
            query_id: context.query_id,
            reason: e.reason().to_string(),
            message: e.to_string(),
        },
    }
}

/// Report a finished query.
///
/// # Errors
///
/// See [`ResourceGroupManager::notify_completion`].
pub fn complete_query(
    manager: &ResourceGroupManager,
    query_id: QueryId,
) -> Result<CompletionResponse> {
    let started = manager.notify_completion(&query_id)?;
    Ok(CompletionResponse { query_id, started })
}

/// Liveness summary built from a non-blocking snapshot.
pub fn health(manager: &ResourceGroupManager) -> Health {
    let snapshot = manager.queue_snapshot();
    Health {
        ok: true,
        config_version: manager.configuration_version(),
        running: snapshot.total_running(),
        queued: snapshot.queued.len(),
    }
}
