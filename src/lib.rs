//! # Prometheus Resource Groups
//!
//! Hierarchical admission control for a query execution service.
//!
//! Incoming queries are routed by ordered selectors to a leaf of a tree of
//! resource groups. Every group carries a soft and a hard concurrency limit
//! and a bounded queue. A query runs only when every group from its leaf to
//! the root has headroom; otherwise it waits in its leaf queue, and each
//! completion drains queued work according to the scheduling policy of each
//! internal group (`FAIR`, `WEIGHTED`, `QUERY_PRIORITY`, `WEIGHTED_FIFO`).
//!
//! Groups are named by templates such as `global.adhoc.${USER}` and are
//! created lazily on first use. The whole configuration can be replaced at
//! runtime without dropping running or queued work.
//!
//! ## Quick start
//!
//! ```rust
//! use prometheus_resource_groups::core::{QueryContext, ResourceGroupManager};
//!
//! let manager = ResourceGroupManager::from_json_str(r#"{
//!     "rootGroups": [{
//!         "name": "global", "hardConcurrencyLimit": 10, "maxQueued": 100,
//!         "subGroups": [{ "name": "${USER}", "hardConcurrencyLimit": 2, "maxQueued": 5 }]
//!     }],
//!     "selectors": [{ "group": "global.${USER}" }]
//! }"#)?;
//!
//! let outcome = manager.admit_query(&QueryContext::new("q1", "alice"))?;
//! assert!(outcome.is_admitted());
//! assert_eq!(outcome.group().to_string(), "global.alice");
//!
//! let started = manager.notify_completion(&"q1".into())?;
//! assert!(started.is_empty());
//! # Ok::<(), prometheus_resource_groups::core::ResourceGroupError>(())
//! ```
//!
//! ## Hot reconfiguration
//!
//! [`core::ResourceGroupManager::reconfigure`] validates a new document and
//! swaps it in. Surviving groups pick up new limits immediately; raised
//! limits start queued work right away and lowered limits take effect as
//! running queries finish. Groups whose path disappears are deprecated:
//! they receive no new queries, drain what they hold, and are removed once
//! idle. With the `tokio-runtime` feature, [`runtime::ConfigurationReloader`]
//! polls a file and reconfigures when it changes.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Group identifiers, routing, specification, and admission accounting.
pub mod core;
/// Configuration models for the resource-group document and environment.
pub mod config;
/// Builders to construct a manager from configuration.
pub mod builders;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
