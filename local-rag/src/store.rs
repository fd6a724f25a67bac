//! The document store: embedding-aware ingestion and similarity search over
//! one collection.
//!
//! [`DocumentStore`] composes an [`EmbeddingProvider`] with a [`VectorStore`]
//! and owns the contract callers rely on regardless of the index underneath:
//!
//! - ingestion is all-or-nothing: every text is embedded before anything is
//!   written, and the batch is written with a single atomic upsert;
//! - ids are derived from content when omitted, so re-ingesting the same text
//!   overwrites instead of duplicating;
//! - search results come back in non-decreasing distance order, and an empty
//!   collection yields an empty result rather than an error.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::distance::DistanceMetric;
use crate::document::{CollectionStats, DocumentRecord, Metadata, SearchResult, document_id};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Longest passage preview rendered by [`format_search_results`].
const PREVIEW_CHARS: usize = 500;

/// A single collection of documents, searchable by text.
pub struct DocumentStore {
    collection: String,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorStore>,
    relevance_floor: Option<f32>,
}

impl DocumentStore {
    /// Open the named collection on `index`, creating it if needed with the
    /// provider's dimensionality and the given metric.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStore`] if the collection exists with a
    /// different dimensionality or metric.
    pub async fn open(
        collection: impl Into<String>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorStore>,
        metric: DistanceMetric,
    ) -> Result<Self> {
        let collection = collection.into();
        let dimensions = embedding_provider.dimensions();
        index.create_collection(&collection, dimensions, metric).await.map_err(|e| {
            error!(collection = %collection, error = %e, "failed to open collection");
            e
        })?;
        debug!(collection = %collection, dimensions, ?metric, backend = index.name(), "opened collection");
        Ok(Self { collection, embedding_provider, index, relevance_floor: None })
    }

    /// Open the collection described by `config`.
    pub async fn from_config(
        config: &RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let store =
            Self::open(&config.collection_name, embedding_provider, index, config.distance_metric)
                .await?;
        Ok(store.with_relevance_floor(config.relevance_floor))
    }

    /// Drop search results farther than `floor` from the query. `None` keeps all `k`.
    pub fn with_relevance_floor(mut self, floor: Option<f32>) -> Self {
        self.relevance_floor = floor;
        self
    }

    /// Name of the collection this store serves.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed and store `texts`. Returns the number of distinct records written.
    ///
    /// When `ids` is `None`, each id is derived from its text with
    /// [`document_id`]. When `metadata` is `None`, every record gets
    /// `{"source": "unknown"}`.
    ///
    /// # Errors
    ///
    /// - [`RagError::Validation`] if `texts` is empty, an id is empty, or
    ///   `ids`/`metadata` lengths differ from `texts`.
    /// - [`RagError::Embedding`] if the provider fails or returns vectors of
    ///   the wrong count or dimensionality. Nothing is written in that case.
    pub async fn add_documents(
        &self,
        texts: &[&str],
        ids: Option<&[&str]>,
        metadata: Option<&[Metadata]>,
    ) -> Result<usize> {
        if texts.is_empty() {
            return Err(RagError::Validation("texts must not be empty".to_string()));
        }
        if let Some(ids) = ids {
            if ids.len() != texts.len() {
                return Err(RagError::Validation(format!(
                    "got {} ids for {} texts",
                    ids.len(),
                    texts.len()
                )));
            }
            if ids.iter().any(|id| id.is_empty()) {
                return Err(RagError::Validation("ids must not be empty strings".to_string()));
            }
        }
        if let Some(metadata) = metadata {
            if metadata.len() != texts.len() {
                return Err(RagError::Validation(format!(
                    "got {} metadata entries for {} texts",
                    metadata.len(),
                    texts.len()
                )));
            }
        }

        let embeddings = self.embed_all(texts).await?;

        let records: Vec<DocumentRecord> = texts
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| DocumentRecord {
                id: ids.map_or_else(|| document_id(text), |ids| ids[i].to_string()),
                text: (*text).to_string(),
                embedding,
                metadata: metadata.map_or_else(default_metadata, |m| m[i].clone()),
            })
            .collect();
        let distinct = records.iter().map(|r| r.id.as_str()).collect::<HashSet<_>>().len();

        self.index.upsert(&self.collection, &records).await.map_err(|e| {
            error!(collection = %self.collection, error = %e, "upsert failed during ingestion");
            e
        })?;

        info!(collection = %self.collection, document_count = distinct, "added documents");
        Ok(distinct)
    }

    /// Return the `k` records nearest to `query`, ascending by distance.
    ///
    /// The query is embedded exactly once. Returns at most
    /// `min(k, collection size)` results; an empty collection yields an empty
    /// result.
    ///
    /// # Errors
    ///
    /// - [`RagError::Validation`] if `k` is zero or `query` is blank.
    /// - [`RagError::Embedding`] if the query cannot be embedded.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::Validation("k must be at least 1".to_string()));
        }
        if query.trim().is_empty() {
            return Err(RagError::Validation("query must not be empty".to_string()));
        }

        let embedding = self.embed_all(&[query]).await?.into_iter().next().ok_or_else(|| {
            self.embedding_error("provider returned no embedding for the query".to_string())
        })?;

        let mut results = self.index.search(&self.collection, &embedding, k).await.map_err(|e| {
            error!(collection = %self.collection, error = %e, "vector store search failed");
            e
        })?;

        if let Some(floor) = self.relevance_floor {
            results.retain(|r| r.distance <= floor);
        }

        debug!(collection = %self.collection, k, result_count = results.len(), "search completed");
        Ok(results)
    }

    /// Search and render the results as a human-readable listing.
    pub async fn search_formatted(&self, query: &str, k: usize) -> Result<String> {
        let results = self.search(query, k).await?;
        Ok(format_search_results(&results))
    }

    /// Delete records by id. Returns how many existed.
    pub async fn delete(&self, ids: &[&str]) -> Result<usize> {
        let removed = self.index.delete(&self.collection, ids).await?;
        info!(collection = %self.collection, removed, "deleted documents");
        Ok(removed)
    }

    /// Remove every record in the collection. Irreversible.
    pub async fn clear(&self) -> Result<()> {
        self.index.clear(&self.collection).await?;
        info!(collection = %self.collection, "cleared collection");
        Ok(())
    }

    /// Collection name, record count, and persist location. Never embeds.
    pub async fn stats(&self) -> Result<CollectionStats> {
        Ok(CollectionStats {
            collection_name: self.collection.clone(),
            document_count: self.index.count(&self.collection).await?,
            persist_location: self.index.persist_location().map(|p| p.to_path_buf()),
        })
    }

    /// Embed `texts`, checking that the provider honoured its own contract.
    async fn embed_all(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let embeddings = self.embedding_provider.embed_batch(texts).await.map_err(|e| {
            error!(provider = self.embedding_provider.name(), error = %e, "embedding failed");
            match e {
                RagError::Embedding { .. } => e,
                other => self.embedding_error(other.to_string()),
            }
        })?;

        if embeddings.len() != texts.len() {
            return Err(self.embedding_error(format!(
                "provider returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }
        let expected = self.embedding_provider.dimensions();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(self.embedding_error(format!(
                "provider returned a {}-dimensional embedding, expected {expected}",
                bad.len()
            )));
        }
        Ok(embeddings)
    }

    fn embedding_error(&self, message: String) -> RagError {
        RagError::Embedding { provider: self.embedding_provider.name().to_string(), message }
    }
}

fn default_metadata() -> Metadata {
    Metadata::from([("source".to_string(), "unknown".into())])
}

/// Render search results as a numbered listing with content previews and sources.
pub fn format_search_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No documents found matching the query.".to_string();
    }

    let mut formatted = String::from("Retrieved Documents:\n");
    formatted.push_str(&"-".repeat(50));
    formatted.push('\n');

    for (i, result) in results.iter().enumerate() {
        let text = &result.record.text;
        let content = if text.chars().count() > PREVIEW_CHARS {
            format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
        } else {
            text.clone()
        };
        formatted.push_str(&format!("\n[Document {}]\nContent: {content}\n", i + 1));
        formatted.push_str(&format!("Source: {}\n", result.record.source().unwrap_or("Unknown")));
    }
    formatted
}
