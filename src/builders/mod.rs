//! Builders to construct a resource group manager from configuration.

pub mod manager_builder;

pub use manager_builder::ResourceGroupManagerBuilder;
