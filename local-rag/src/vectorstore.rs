//! Vector store trait for storing and searching vector embeddings.

use std::path::Path;

use async_trait::async_trait;

use crate::distance::DistanceMetric;
use crate::document::{DocumentRecord, SearchResult};
use crate::error::Result;

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`DocumentRecord`]s. Each
/// collection has a fixed dimensionality and [`DistanceMetric`]. Whatever
/// index sits underneath, implementations must guarantee:
///
/// - [`upsert`](VectorStore::upsert) is all-or-nothing: either every record
///   in the batch is visible to later searches or none is.
/// - Upserting an existing id replaces the record instead of duplicating it.
/// - [`search`](VectorStore::search) returns results in non-decreasing
///   distance order and never observes a partially applied write.
///
/// # Example
///
/// ```rust,ignore
/// use local_rag::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 384, DistanceMetric::Cosine).await?;
/// store.upsert("docs", &records).await?;
/// let results = store.search("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short name of the backend, used in errors and logs.
    fn name(&self) -> &str;

    /// Create a named collection. No-op if it already exists with the same
    /// dimensionality and metric.
    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert or replace records in a collection as a single atomic write.
    async fn upsert(&self, collection: &str, records: &[DocumentRecord]) -> Result<()>;

    /// Delete records by id. Returns how many records were removed.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<usize>;

    /// Remove every record from a collection, keeping the collection itself.
    async fn clear(&self, collection: &str) -> Result<()>;

    /// Search for the `top_k` records nearest to the given embedding.
    ///
    /// Returns results ordered by ascending distance.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Where this store persists its data, if anywhere.
    fn persist_location(&self) -> Option<&Path> {
        None
    }
}
