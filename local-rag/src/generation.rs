//! Generation client: one prompt in, one completion out, under a timeout and
//! a single-retry policy.
//!
//! A [`GenerationBackend`] performs exactly one round trip to a language
//! model. [`GenerationClient`] wraps it with the call policy:
//!
//! - every attempt is bounded by a wall-clock timeout; exceeding it is a
//!   [`RagError::Timeout`];
//! - a transient failure ([`RagError::is_transient`]) is retried once after a
//!   fixed backoff; anything else propagates immediately;
//! - after the retry the error propagates. The client never substitutes a
//!   degraded answer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::config::RagConfig;
use crate::error::{RagError, Result};

/// Total attempts per call: the first try plus one retry.
const MAX_ATTEMPTS: u32 = 2;

/// Per-call overrides of the client defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Backend model to invoke.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling randomness in `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Upper bound on completion length, in tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A fully resolved request handed to a [`GenerationBackend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The complete prompt.
    pub prompt: String,
    /// Backend model to invoke.
    pub model: String,
    /// Sampling randomness in `[0, 1]`.
    pub temperature: f32,
    /// Upper bound on completion length, in tokens.
    pub max_tokens: u32,
}

/// A language-model backend that performs a single request/response round trip.
///
/// Implementations report unreachability as [`RagError::BackendUnavailable`]
/// (or [`RagError::Timeout`]) and every other failure as
/// [`RagError::Generation`]; only the former are retried.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short name of the backend, used in errors and logs.
    fn name(&self) -> &str;

    /// Generate a completion for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Applies timeout, retry, and concurrency policy around a [`GenerationBackend`].
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    backoff: Duration,
    limiter: Option<Arc<Semaphore>>,
}

impl GenerationClient {
    /// Create a client for `model` with default policy (120s timeout, 500ms backoff).
    pub fn new(backend: Arc<dyn GenerationBackend>, model: impl Into<String>) -> Self {
        let defaults = RagConfig::default();
        Self {
            backend,
            model: model.into(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            timeout: defaults.generation_timeout,
            backoff: defaults.retry_backoff,
            limiter: None,
        }
    }

    /// Create a client using the generation settings in `config`.
    pub fn from_config(backend: Arc<dyn GenerationBackend>, config: &RagConfig) -> Self {
        let client = Self::new(backend, config.generation_model.clone())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_timeout(config.generation_timeout)
            .with_backoff(config.retry_backoff);
        match config.max_concurrent_generations {
            Some(limit) => client.with_max_concurrency(limit),
            None => client,
        }
    }

    /// Set the default sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default completion length bound.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the pause before the retry.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Allow at most `limit` calls to be in flight at once. Extra callers wait.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(limit.max(1))));
        self
    }

    /// The default model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Name of the wrapped backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Resolve `options` against the client defaults, returning the model,
    /// temperature, and `max_tokens` a request would use.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] if the model is empty, the temperature
    /// is outside `[0, 1]`, or `max_tokens` is zero.
    pub fn resolve_options(&self, options: &GenerationOptions) -> Result<(String, f32, u32)> {
        let model = options.model.clone().unwrap_or_else(|| self.model.clone());
        if model.trim().is_empty() {
            return Err(RagError::Validation("model must not be empty".to_string()));
        }
        let temperature = options.temperature.unwrap_or(self.temperature);
        if !(0.0..=1.0).contains(&temperature) {
            return Err(RagError::Validation(format!(
                "temperature ({temperature}) must be within [0, 1]"
            )));
        }
        let max_tokens = options.max_tokens.unwrap_or(self.max_tokens);
        if max_tokens == 0 {
            return Err(RagError::Validation("max_tokens must be greater than zero".to_string()));
        }
        Ok((model, temperature, max_tokens))
    }

    /// Build a request for `prompt` with `options` resolved against the client defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] if the prompt is blank or the options
    /// are invalid (see [`resolve_options`](Self::resolve_options)).
    pub fn request(&self, prompt: &str, options: &GenerationOptions) -> Result<GenerationRequest> {
        if prompt.trim().is_empty() {
            return Err(RagError::Validation("prompt must not be empty".to_string()));
        }
        let (model, temperature, max_tokens) = self.resolve_options(options)?;
        Ok(GenerationRequest { prompt: prompt.to_string(), model, temperature, max_tokens })
    }

    /// Generate a completion for `prompt`.
    ///
    /// # Errors
    ///
    /// - [`RagError::Validation`] for bad input (see [`request`](Self::request)).
    /// - [`RagError::BackendUnavailable`] or [`RagError::Timeout`] when both
    ///   attempts fail transiently.
    /// - Any non-transient backend error, without retry.
    pub async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let request = self.request(prompt, options)?;
        self.send(&request).await
    }

    /// Send an already resolved request under the retry policy.
    pub async fn send(&self, request: &GenerationRequest) -> Result<String> {
        let _permit = match &self.limiter {
            Some(limiter) => Some(limiter.acquire().await.map_err(|e| {
                RagError::BackendUnavailable {
                    backend: self.backend.name().to_string(),
                    message: format!("concurrency limiter closed: {e}"),
                }
            })?),
            None => None,
        };

        let mut attempt = 1;
        loop {
            match self.attempt(request).await {
                Ok(text) => {
                    debug!(
                        backend = self.backend.name(),
                        model = %request.model,
                        attempt,
                        response_len = text.len(),
                        "generation completed"
                    );
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    warn!(
                        backend = self.backend.name(),
                        attempt,
                        backoff = ?self.backoff,
                        error = %e,
                        "transient generation failure, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(backend = self.backend.name(), attempt, error = %e, "generation failed");
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.backend.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(RagError::Timeout {
                backend: self.backend.name().to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("backoff", &self.backoff)
            .field("limited", &self.limiter.is_some())
            .finish()
    }
}
