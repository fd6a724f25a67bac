//! Ollama generation backend and embedding provider.
//!
//! This module is only available when the `ollama` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::RagConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{GenerationBackend, GenerationRequest};

/// The default Ollama server address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// The default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

/// The dimensionality of `all-minilm`.
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client(connect_timeout: Duration) -> std::result::Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().connect_timeout(connect_timeout).build()
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

async fn error_detail(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body)
}

// ── Generation ─────────────────────────────────────────────────────

/// A [`GenerationBackend`] calling `POST /api/generate` on an Ollama server.
///
/// Connection failures and gateway errors (502/503/504) are reported as
/// [`RagError::BackendUnavailable`], connect timeouts as [`RagError::Timeout`],
/// and everything else as [`RagError::Generation`]. The request timeout itself
/// is enforced by [`GenerationClient`](crate::GenerationClient).
///
/// # Example
///
/// ```rust,ignore
/// use local_rag::ollama::OllamaGenerationBackend;
///
/// let backend = OllamaGenerationBackend::new("http://localhost:11434")?;
/// let client = GenerationClient::new(Arc::new(backend), "mistral");
/// ```
pub struct OllamaGenerationBackend {
    client: reqwest::Client,
    base_url: String,
    connect_timeout: Duration,
}

impl OllamaGenerationBackend {
    /// Create a backend for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_connect_timeout(base_url, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a backend for the local server at [`DEFAULT_BASE_URL`].
    pub fn local() -> Result<Self> {
        Self::new(DEFAULT_BASE_URL)
    }

    /// Create a backend with a custom TCP connect timeout.
    pub fn with_connect_timeout(
        base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = http_client(connect_timeout).map_err(|e| {
            RagError::Config(format!("failed to create Ollama HTTP client: {e}"))
        })?;
        Ok(Self { client, base_url: base_url.into(), connect_timeout })
    }

    fn transport_error(&self, e: reqwest::Error) -> RagError {
        if e.is_timeout() {
            RagError::Timeout { backend: "Ollama".into(), timeout: self.connect_timeout }
        } else if e.is_connect() || e.is_request() {
            RagError::BackendUnavailable {
                backend: "Ollama".into(),
                message: format!("unable to reach {}: {e}", self.base_url),
            }
        } else {
            RagError::Generation {
                backend: "Ollama".into(),
                message: format!("request failed: {e}"),
            }
        }
    }
}

#[async_trait]
impl GenerationBackend for OllamaGenerationBackend {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        debug!(
            backend = "Ollama",
            model = %request.model,
            prompt_len = request.prompt.len(),
            "sending generate request"
        );

        let body = GenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "api/generate"))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(backend = "Ollama", error = %e, "request failed");
                self.transport_error(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response).await;
            error!(backend = "Ollama", %status, "API error");
            let message = format!("API returned {status}: {detail}");
            return Err(match status {
                StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT => {
                    RagError::BackendUnavailable { backend: "Ollama".into(), message }
                }
                _ => RagError::Generation { backend: "Ollama".into(), message },
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            error!(backend = "Ollama", error = %e, "failed to parse response");
            RagError::Generation {
                backend: "Ollama".into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        Ok(parsed.response.trim().to_string())
    }
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] calling `POST /api/embed` on an Ollama server.
///
/// # Configuration
///
/// - `model` – defaults to `all-minilm`.
/// - `dimensions` – must match the model; defaults to 384.
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for the server at `base_url` with the default model.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = http_client(DEFAULT_CONNECT_TIMEOUT).map_err(|e| RagError::Embedding {
            provider: "Ollama".into(),
            message: format!("failed to create HTTP client: {e}"),
        })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        })
    }

    /// Set the model name and the dimensionality it produces.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Create a provider using `config.embedding_model`, which must produce
    /// vectors of `dimensions` components.
    pub fn from_config(
        base_url: impl Into<String>,
        config: &RagConfig,
        dimensions: usize,
    ) -> Result<Self> {
        Ok(Self::new(base_url)?.with_model(config.embedding_model.clone(), dimensions))
    }

    fn error(message: String) -> RagError {
        RagError::Embedding { provider: "Ollama".into(), message }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| Self::error("API returned empty response".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = "Ollama", batch_size = texts.len(), model = %self.model, "embedding batch");

        let response = self
            .client
            .post(endpoint(&self.base_url, "api/embed"))
            .json(&EmbedRequest { model: &self.model, input: texts.to_vec() })
            .send()
            .await
            .map_err(|e| {
                error!(provider = "Ollama", error = %e, "request failed");
                Self::error(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response).await;
            error!(provider = "Ollama", %status, "API error");
            return Err(Self::error(format!("API returned {status}: {detail}")));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = "Ollama", error = %e, "failed to parse response");
            Self::error(format!("failed to parse response: {e}"))
        })?;

        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
