//! Configuration models: the resource-group document and environment settings.

pub mod env;
pub mod resource_groups;

pub use env::{EnvSettings, CONFIG_PATH_VAR, REFRESH_INTERVAL_VAR};
pub use resource_groups::{GroupConfig, ResourceGroupsConfig, SelectorConfig};
