//! Shared test doubles for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use local_rag::mock::HashEmbeddingProvider;
use local_rag::{
    DistanceMetric, DocumentRecord, DocumentStore, EmbeddingProvider, InMemoryVectorStore,
    RagError, Result, SearchResult, VectorStore,
};

pub const DIM: usize = 256;

/// Embedder that counts calls and can be switched into failure mode.
#[derive(Default)]
pub struct CountingEmbedder {
    inner: HashEmbeddingProvider,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self { inner: HashEmbeddingProvider::new(DIM), ..Self::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn name(&self) -> &str {
        "counting"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::Embedding {
                provider: "counting".into(),
                message: "model not loaded".into(),
            });
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Embedder that fails on any text containing "poison".
pub struct PoisonEmbedder(pub HashEmbeddingProvider);

#[async_trait]
impl EmbeddingProvider for PoisonEmbedder {
    fn name(&self) -> &str {
        "poison"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("poison") {
            return Err(RagError::Embedding {
                provider: "poison".into(),
                message: "refused to embed".into(),
            });
        }
        self.0.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.0.dimensions()
    }
}

/// Vector store wrapper that counts every call.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryVectorStore,
    pub calls: AtomicUsize,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VectorStore for CountingStore {
    fn name(&self) -> &str {
        "counting"
    }

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        self.inner.create_collection(name, dimensions, metric).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.hit();
        self.inner.delete_collection(name).await
    }

    async fn upsert(&self, collection: &str, records: &[DocumentRecord]) -> Result<()> {
        self.hit();
        self.inner.upsert(collection, records).await
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<usize> {
        self.hit();
        self.inner.delete(collection, ids).await
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        self.hit();
        self.inner.clear(collection).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.hit();
        self.inner.search(collection, embedding, top_k).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.hit();
        self.inner.count(collection).await
    }

    fn persist_location(&self) -> Option<&Path> {
        self.inner.persist_location()
    }
}

/// A memory-only store over the hashing embedder.
pub async fn memory_store() -> DocumentStore {
    DocumentStore::open(
        "documents",
        Arc::new(HashEmbeddingProvider::new(DIM)),
        Arc::new(InMemoryVectorStore::new()),
        DistanceMetric::Cosine,
    )
    .await
    .unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
