//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment: defaults, YAML files, then
//! `CHATDO_*` environment overrides, validated after merging.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
