//! Adapters for storage, reasoning providers and HTTP.

pub mod http;
pub mod oracles;
pub mod sqlite;
