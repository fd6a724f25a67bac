//! # local-rag
//!
//! Retrieval-augmented question answering over a local document store.
//!
//! ## Overview
//!
//! A question flows through four parts:
//!
//! - [`DocumentStore`] embeds the question with an [`EmbeddingProvider`] and
//!   runs a k-nearest-neighbour search on a [`VectorStore`].
//! - [`ContextAssembler`] turns the ranked passages into a deduplicated
//!   [`ContextBlock`] that fits the configured character budget.
//! - [`PromptTemplate`] renders the instruction, the passages, and the question.
//! - [`GenerationClient`] sends the prompt to a [`GenerationBackend`] under a
//!   timeout and a single-retry policy.
//!
//! [`RagPipeline::answer`] coordinates them and returns an [`AnswerEnvelope`].
//! Backends are trait objects, so any of them can be swapped or mocked; see
//! [`mock`] for offline implementations and `ollama` (feature `ollama`) for
//! an HTTP backend.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use local_rag::mock::{HashEmbeddingProvider, MockGenerationBackend};
//! use local_rag::{AnswerOptions, DocumentStore, InMemoryVectorStore, RagConfig, RagPipeline};
//!
//! let config = RagConfig::default();
//! let store = DocumentStore::from_config(
//!     &config,
//!     Arc::new(HashEmbeddingProvider::default()),
//!     Arc::new(InMemoryVectorStore::new()),
//! )
//! .await?;
//! store.add_documents(&["Paris is the capital of France."], None, None).await?;
//!
//! let pipeline = RagPipeline::builder()
//!     .config(config)
//!     .document_store(Arc::new(store))
//!     .generation_backend(Arc::new(MockGenerationBackend::new()))
//!     .build()?;
//!
//! let envelope = pipeline.answer("What is the capital of France?", AnswerOptions::default()).await?;
//! assert!(envelope.context_used);
//! ```

pub mod config;
pub mod context;
pub mod distance;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod mock;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod pipeline;
pub mod prompt;
pub mod samples;
pub mod store;
pub mod vectorstore;

pub use config::{RagConfig, RagConfigBuilder};
pub use context::{ContextAssembler, ContextBlock, Passage};
pub use distance::DistanceMetric;
pub use document::{
    CollectionStats, DocumentRecord, Metadata, MetadataValue, SearchResult, document_id,
};
pub use embedding::EmbeddingProvider;
pub use error::{AnswerStage, RagError, Result};
pub use generation::{GenerationBackend, GenerationClient, GenerationOptions, GenerationRequest};
pub use inmemory::InMemoryVectorStore;
#[cfg(feature = "ollama")]
pub use ollama::{OllamaEmbeddingProvider, OllamaGenerationBackend};
pub use pipeline::{AnswerEnvelope, AnswerOptions, RagPipeline, RagPipelineBuilder};
pub use prompt::PromptTemplate;
pub use samples::{SAMPLE_DOCUMENTS, load_sample_documents};
pub use store::{DocumentStore, format_search_results};
pub use vectorstore::VectorStore;
