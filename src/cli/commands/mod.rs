//! CLI command implementations.

pub mod chat;
pub mod migrate;
pub mod serve;
