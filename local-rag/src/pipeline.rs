//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] answers questions by composing a [`DocumentStore`], a
//! [`ContextAssembler`], a [`PromptTemplate`], and a [`GenerationClient`].
//! Each [`answer`](RagPipeline::answer) call moves through
//! retrieving → assembling → generating, skipping retrieval when context is
//! disabled. No state is kept between calls besides the store's collection.
//!
//! # Example
//!
//! ```rust,ignore
//! use local_rag::{AnswerOptions, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .document_store(Arc::new(store))
//!     .generation_backend(Arc::new(backend))
//!     .build()?;
//!
//! let envelope = pipeline.answer("What is RAG?", AnswerOptions::default()).await?;
//! println!("{}", envelope.response);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::context::{ContextAssembler, ContextBlock};
use crate::document::CollectionStats;
use crate::error::{AnswerStage, RagError, Result};
use crate::generation::{
    GenerationBackend, GenerationClient, GenerationOptions, GenerationRequest,
};
use crate::prompt::PromptTemplate;
use crate::samples::load_sample_documents;
use crate::store::DocumentStore;

/// Per-call options for [`RagPipeline::answer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOptions {
    /// Retrieve context from the document store before generating.
    pub use_context: bool,
    /// Number of passages to retrieve. `None` uses the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_results: Option<usize>,
    /// Overrides for the generation call.
    #[serde(default)]
    pub generation: GenerationOptions,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self { use_context: true, n_results: None, generation: GenerationOptions::default() }
    }
}

impl AnswerOptions {
    /// Options that skip retrieval entirely.
    pub fn without_context() -> Self {
        Self { use_context: false, ..Self::default() }
    }

    /// Retrieve `n` passages instead of the configured default.
    pub fn with_n_results(mut self, n: usize) -> Self {
        self.n_results = Some(n);
        self
    }

    /// Override generation settings for this call.
    pub fn with_generation(mut self, generation: GenerationOptions) -> Self {
        self.generation = generation;
        self
    }
}

/// The result of [`RagPipeline::answer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEnvelope {
    /// The question, echoed back.
    pub query: String,
    /// The generated answer.
    pub response: String,
    /// Passage texts included in the prompt, most relevant first.
    pub retrieved_documents: Vec<String>,
    /// Sources of `retrieved_documents`, in the same order.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Whether any retrieved context reached the prompt.
    pub context_used: bool,
    /// The model that produced `response`.
    pub model: String,
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`]. The pipeline is `Send +
/// Sync` and meant to be shared behind an `Arc` by concurrent callers.
pub struct RagPipeline {
    config: RagConfig,
    store: Arc<DocumentStore>,
    assembler: ContextAssembler,
    prompt: PromptTemplate,
    generator: GenerationClient,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The document store, for ingestion and document management.
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// The generation client.
    pub fn generator(&self) -> &GenerationClient {
        &self.generator
    }

    /// Answer `query`, grounding the answer in retrieved passages when
    /// `options.use_context` is set.
    ///
    /// An empty collection is not an error: the question is answered without
    /// context and the envelope reports `context_used == false`.
    ///
    /// # Errors
    ///
    /// - [`RagError::Validation`] if `query` is blank, `n_results` is zero, or
    ///   the generation options are invalid. Nothing is retrieved in that case.
    /// - [`RagError::Answer`] wrapping the store or generation failure, with
    ///   [`AnswerStage::Retrieving`] or [`AnswerStage::Generating`].
    pub async fn answer(&self, query: &str, options: AnswerOptions) -> Result<AnswerEnvelope> {
        if query.trim().is_empty() {
            return Err(RagError::Validation("query must not be empty".to_string()));
        }
        let n_results = options.n_results.unwrap_or(self.config.default_n_results);
        if n_results == 0 {
            return Err(RagError::Validation("n_results must be at least 1".to_string()));
        }
        let (model, temperature, max_tokens) =
            self.generator.resolve_options(&options.generation)?;

        let context = if options.use_context {
            self.retrieve_context(query, n_results).await?
        } else {
            debug!("context disabled, skipping retrieval");
            ContextBlock::default()
        };

        debug!(stage = %AnswerStage::Generating, passages = context.len(), "building prompt");
        let request = GenerationRequest {
            prompt: self.prompt.render(query, &context),
            model,
            temperature,
            max_tokens,
        };
        let response = self
            .generator
            .send(&request)
            .await
            .map_err(|e| wrap(query, AnswerStage::Generating, e))?;

        let context_used = !context.is_empty();
        info!(
            context_used,
            passages = context.len(),
            context_chars = context.total_chars(),
            model = %request.model,
            "answered query"
        );

        Ok(AnswerEnvelope {
            query: query.to_string(),
            response,
            retrieved_documents: context.texts(),
            sources: context.sources(),
            context_used,
            model: request.model,
        })
    }

    /// Load the built-in sample corpus if the collection is empty. Returns
    /// how many records were added.
    pub async fn ensure_seeded(&self) -> Result<usize> {
        if self.store.stats().await?.document_count > 0 {
            return Ok(0);
        }
        info!(collection = self.store.collection(), "collection empty, loading sample documents");
        load_sample_documents(&self.store).await
    }

    /// Store statistics, without touching the embedding or generation backends.
    pub async fn health(&self) -> Result<CollectionStats> {
        self.store.stats().await
    }

    async fn retrieve_context(&self, query: &str, n_results: usize) -> Result<ContextBlock> {
        debug!(stage = %AnswerStage::Retrieving, n_results, "searching document store");
        let results = self
            .store
            .search(query, n_results)
            .await
            .map_err(|e| wrap(query, AnswerStage::Retrieving, e))?;

        if results.is_empty() {
            info!(collection = self.store.collection(), "no passages retrieved, answering without context");
            return Ok(ContextBlock::default());
        }

        debug!(stage = %AnswerStage::Assembling, candidates = results.len(), "assembling context");
        Ok(self.assembler.build(&results))
    }
}

fn wrap(query: &str, stage: AnswerStage, source: RagError) -> RagError {
    error!(%stage, error = %source, "answer failed");
    RagError::Answer { query: query.to_string(), stage, source: Box::new(source) }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `document_store` and one of `generation_backend`/`generation_client` are
/// required. `config` defaults to [`RagConfig::default()`] and
/// `prompt_template` to [`PromptTemplate::default()`].
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(config)
///     .document_store(Arc::new(store))
///     .generation_backend(Arc::new(backend))
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    store: Option<Arc<DocumentStore>>,
    backend: Option<Arc<dyn GenerationBackend>>,
    client: Option<GenerationClient>,
    prompt: Option<PromptTemplate>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document store.
    pub fn document_store(mut self, store: Arc<DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the generation backend. The client policy is taken from the config.
    pub fn generation_backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set a fully configured generation client. Takes precedence over
    /// [`generation_backend`](Self::generation_backend).
    pub fn generation_client(mut self, client: GenerationClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the prompt template.
    pub fn prompt_template(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Build the [`RagPipeline`], validating the config and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the config is invalid or a required
    /// field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let store = self
            .store
            .ok_or_else(|| RagError::Config("document_store is required".to_string()))?;
        let generator = match (self.client, self.backend) {
            (Some(client), _) => client,
            (None, Some(backend)) => GenerationClient::from_config(backend, &config),
            (None, None) => {
                return Err(RagError::Config(
                    "generation_backend or generation_client is required".to_string(),
                ));
            }
        };

        Ok(RagPipeline {
            assembler: ContextAssembler::new(config.context_budget),
            prompt: self.prompt.unwrap_or_default(),
            config,
            store,
            generator,
        })
    }
}
