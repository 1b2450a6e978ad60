//! Reasoning oracle implementations.

pub mod anthropic_api;
pub mod pattern;

pub use anthropic_api::{AnthropicOracle, AnthropicOracleConfig};
pub use pattern::PatternOracle;

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ReasoningConfig, ReasoningProvider};
use crate::domain::ports::ReasoningOracle;

/// Build the configured oracle.
pub fn build_oracle(config: &ReasoningConfig) -> DomainResult<Arc<dyn ReasoningOracle>> {
    Ok(match config.provider {
        ReasoningProvider::Pattern => Arc::new(PatternOracle::new()),
        ReasoningProvider::Anthropic => {
            Arc::new(AnthropicOracle::new(AnthropicOracleConfig::from(config))?)
        }
    })
}
