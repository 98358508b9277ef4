//! Unit tests for individual components

mod audit_test;
mod builders_test;
mod config_test;
mod error_test;
mod identifier_test;
mod runtime_test;
mod selector_test;
mod util_test;
