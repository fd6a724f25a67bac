//! Configuration for the RAG pipeline.
//!
//! [`RagConfig`] is the settings object the surrounding application hands to
//! the pipeline. Loading it from files or the environment is the
//! application's job; this module only holds and validates the values.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::{RagError, Result};

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Name of the document collection.
    pub collection_name: String,
    /// Identifier of the embedding model.
    pub embedding_model: String,
    /// Identifier of the generation model.
    pub generation_model: String,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
    /// Upper bound on completion length, in tokens.
    pub max_tokens: u32,
    /// Number of passages retrieved when a call does not say.
    pub default_n_results: usize,
    /// Maximum total size of the context block, in characters.
    pub context_budget: usize,
    /// Wall-clock ceiling for one generation attempt.
    pub generation_timeout: Duration,
    /// Pause before the single retry of a transient generation failure.
    pub retry_backoff: Duration,
    /// Cap on in-flight generation calls. `None` means unlimited.
    pub max_concurrent_generations: Option<usize>,
    /// Directory the vector store persists to. `None` keeps it in memory.
    pub persist_location: Option<PathBuf>,
    /// Distance metric of the collection.
    pub distance_metric: DistanceMetric,
    /// Results farther than this from the query are dropped. `None` keeps all `k`.
    pub relevance_floor: Option<f32>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection_name: "documents".to_string(),
            embedding_model: "all-minilm".to_string(),
            generation_model: "mistral".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            default_n_results: 3,
            context_budget: 4000,
            generation_timeout: Duration::from_secs(120),
            retry_backoff: Duration::from_millis(500),
            max_concurrent_generations: None,
            persist_location: None,
            distance_metric: DistanceMetric::Cosine,
            relevance_floor: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - a name or model identifier is empty
    /// - `temperature` is outside `[0, 1]`
    /// - `max_tokens`, `default_n_results`, `context_budget` or `generation_timeout` is zero
    /// - `max_concurrent_generations` is `Some(0)`
    /// - `relevance_floor` is not finite
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("collection_name", &self.collection_name),
            ("embedding_model", &self.embedding_model),
            ("generation_model", &self.generation_model),
        ] {
            if value.trim().is_empty() {
                return Err(RagError::Config(format!("{field} must not be empty")));
            }
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(RagError::Config(format!(
                "temperature ({}) must be within [0, 1]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(RagError::Config("max_tokens must be greater than zero".to_string()));
        }
        if self.default_n_results == 0 {
            return Err(RagError::Config("default_n_results must be at least 1".to_string()));
        }
        if self.context_budget == 0 {
            return Err(RagError::Config("context_budget must be greater than zero".to_string()));
        }
        if self.generation_timeout.is_zero() {
            return Err(RagError::Config(
                "generation_timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_generations == Some(0) {
            return Err(RagError::Config(
                "max_concurrent_generations must be at least 1 when set".to_string(),
            ));
        }
        if let Some(floor) = self.relevance_floor {
            if !floor.is_finite() {
                return Err(RagError::Config("relevance_floor must be finite".to_string()));
            }
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the collection name.
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.collection_name = name.into();
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the generation model identifier.
    pub fn generation_model(mut self, model: impl Into<String>) -> Self {
        self.config.generation_model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the completion length bound.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set the default number of passages to retrieve.
    pub fn default_n_results(mut self, n: usize) -> Self {
        self.config.default_n_results = n;
        self
    }

    /// Set the context budget in characters.
    pub fn context_budget(mut self, budget: usize) -> Self {
        self.config.context_budget = budget;
        self
    }

    /// Set the per-attempt generation timeout.
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation_timeout = timeout;
        self
    }

    /// Set the backoff before retrying a transient generation failure.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    /// Cap concurrent generation calls.
    pub fn max_concurrent_generations(mut self, limit: usize) -> Self {
        self.config.max_concurrent_generations = Some(limit);
        self
    }

    /// Persist the vector store under `dir`.
    pub fn persist_location(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.persist_location = Some(dir.into());
        self
    }

    /// Set the collection's distance metric.
    pub fn distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.config.distance_metric = metric;
        self
    }

    /// Drop results farther than `floor` from the query.
    pub fn relevance_floor(mut self, floor: f32) -> Self {
        self.config.relevance_floor = Some(floor);
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RagConfig::default().validate().is_ok());
        assert_eq!(RagConfig::default().default_n_results, 3);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(RagConfig::builder().temperature(1.5).build().is_err());
        assert!(RagConfig::builder().context_budget(0).build().is_err());
        assert!(RagConfig::builder().default_n_results(0).build().is_err());
        assert!(RagConfig::builder().generation_timeout(Duration::ZERO).build().is_err());
        assert!(RagConfig::builder().max_concurrent_generations(0).build().is_err());
        assert!(RagConfig::builder().relevance_floor(f32::NAN).build().is_err());
        assert!(RagConfig::builder().collection_name(" ").build().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: RagConfig =
            serde_json::from_str(r#"{"generation_model": "llama3", "context_budget": 800}"#)
                .unwrap();
        assert_eq!(config.generation_model, "llama3");
        assert_eq!(config.context_budget, 800);
        assert_eq!(config.collection_name, "documents");
    }
}
