//! Per-query attributes supplied by the execution layer.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Priority given to queries that do not set one.
pub const DEFAULT_QUERY_PRIORITY: i32 = 1;

/// Opaque query identifier assigned by the execution layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(String);

impl QueryId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for QueryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Attributes of an incoming query used for routing and ordering.
///
/// The core never looks at query text or plans; these fields are all it sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryContext {
    /// Query identifier.
    pub query_id: QueryId,
    /// Authenticated user.
    pub user: String,
    /// Client-reported source (tool name), if any.
    #[serde(default)]
    pub source: Option<String>,
    /// Statement category such as `SELECT` or `INSERT`, if known.
    #[serde(default)]
    pub query_type: Option<String>,
    /// Client tags attached to the session.
    #[serde(default)]
    pub client_tags: BTreeSet<String>,
    /// Ordering priority under `QUERY_PRIORITY`; higher runs first.
    #[serde(default = "default_priority")]
    pub priority: i32,
}

const fn default_priority() -> i32 {
    DEFAULT_QUERY_PRIORITY
}

impl QueryContext {
    /// Context with only the mandatory fields set.
    pub fn new(query_id: impl Into<QueryId>, user: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            user: user.into(),
            source: None,
            query_type: None,
            client_tags: BTreeSet::new(),
            priority: DEFAULT_QUERY_PRIORITY,
        }
    }

    /// Set the source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the query type.
    #[must_use]
    pub fn with_query_type(mut self, query_type: impl Into<String>) -> Self {
        self.query_type = Some(query_type.into());
        self
    }

    /// Add a client tag.
    #[must_use]
    pub fn with_client_tag(mut self, tag: impl Into<String>) -> Self {
        self.client_tags.insert(tag.into());
        self
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}
