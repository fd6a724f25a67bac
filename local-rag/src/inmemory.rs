//! In-memory vector store with optional JSON snapshot persistence.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. Searches take the shared
//! lock; every mutation takes the exclusive lock, so readers never observe a
//! half-applied batch. When opened with [`InMemoryVectorStore::open`], the
//! whole store is rewritten to `collections.json` in the persist directory
//! after each mutation, before the change becomes visible.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::RagConfig;
use crate::distance::DistanceMetric;
use crate::document::{DocumentRecord, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "InMemory";

/// File name of the snapshot inside the persist directory.
pub const SNAPSHOT_FILE: &str = "collections.json";

#[derive(Debug, Clone)]
struct StoredRecord {
    /// Insertion sequence, used to keep equal-distance results in a stable order.
    seq: u64,
    record: DocumentRecord,
}

#[derive(Debug, Clone)]
struct Collection {
    dimensions: usize,
    metric: DistanceMetric,
    records: HashMap<String, StoredRecord>,
    next_seq: u64,
}

impl Collection {
    /// Fail unless this collection was created with `dimensions` and `metric`.
    fn check_shape(&self, name: &str, dimensions: usize, metric: DistanceMetric) -> Result<()> {
        if self.dimensions != dimensions || self.metric != metric {
            return Err(store_error(format!(
                "collection '{name}' already exists with {} dimensions ({:?}), requested {dimensions} ({metric:?})",
                self.dimensions, self.metric
            )));
        }
        Ok(())
    }

    fn new(dimensions: usize, metric: DistanceMetric) -> Self {
        Self { dimensions, metric, records: HashMap::new(), next_seq: 0 }
    }

    fn insert(&mut self, record: DocumentRecord) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.insert(record.id.clone(), StoredRecord { seq, record });
    }

    fn ordered(&self) -> Vec<&StoredRecord> {
        let mut stored: Vec<&StoredRecord> = self.records.values().collect();
        stored.sort_by_key(|s| s.seq);
        stored
    }
}

type Collections = HashMap<String, Collection>;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    collections: Vec<CollectionSnapshot>,
}

#[derive(Serialize, Deserialize)]
struct CollectionSnapshot {
    name: String,
    dimensions: usize,
    metric: DistanceMetric,
    records: Vec<DocumentRecord>,
}

impl Snapshot {
    fn capture(collections: &Collections) -> Self {
        let mut names: Vec<&String> = collections.keys().collect();
        names.sort();
        let collections = names
            .into_iter()
            .map(|name| {
                let collection = &collections[name];
                CollectionSnapshot {
                    name: name.clone(),
                    dimensions: collection.dimensions,
                    metric: collection.metric,
                    records: collection.ordered().into_iter().map(|s| s.record.clone()).collect(),
                }
            })
            .collect();
        Self { collections }
    }

    fn restore(self) -> Collections {
        self.collections
            .into_iter()
            .map(|snapshot| {
                let mut collection = Collection::new(snapshot.dimensions, snapshot.metric);
                for record in snapshot.records {
                    collection.insert(record);
                }
                (snapshot.name, collection)
            })
            .collect()
    }
}

fn store_error(message: impl Into<String>) -> RagError {
    RagError::VectorStore { backend: BACKEND.to_string(), message: message.into() }
}

fn missing_collection(name: &str) -> RagError {
    store_error(format!("collection '{name}' does not exist"))
}

/// An in-memory vector store supporting cosine and L2 distance.
///
/// Collections are stored as nested `HashMap`s: collection name → record ID → record.
/// All operations are async-safe via `tokio::sync::RwLock`.
///
/// # Example
///
/// ```rust,ignore
/// use local_rag::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::open("./vector_store").await?;
/// store.create_collection("documents", 384, DistanceMetric::Cosine).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<Collections>,
    persist_dir: Option<PathBuf>,
}

impl InMemoryVectorStore {
    /// Create a new empty, memory-only vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store persisted under `dir`, loading the existing snapshot if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStore`] if the directory cannot be created or
    /// the snapshot cannot be read or parsed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            store_error(format!("failed to create persist directory '{}': {e}", dir.display()))
        })?;

        let path = dir.join(SNAPSHOT_FILE);
        let collections = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    store_error(format!("corrupt snapshot '{}': {e}", path.display()))
                })?;
                snapshot.restore()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Collections::new(),
            Err(e) => {
                return Err(store_error(format!(
                    "failed to read snapshot '{}': {e}",
                    path.display()
                )));
            }
        };

        info!(path = %path.display(), collection_count = collections.len(), "opened vector store");
        Ok(Self { collections: RwLock::new(collections), persist_dir: Some(dir) })
    }

    /// Open the store described by `config`: persisted under
    /// `config.persist_location` when set, memory-only otherwise.
    pub async fn from_config(config: &RagConfig) -> Result<Self> {
        match &config.persist_location {
            Some(dir) => Self::open(dir).await,
            None => Ok(Self::new()),
        }
    }

    /// Apply a mutation under the write lock.
    ///
    /// With persistence enabled the mutation runs on a copy, which replaces
    /// the live state only after the snapshot is written. Without it, `f`
    /// must validate everything before it changes anything.
    async fn mutate<T>(&self, f: impl FnOnce(&mut Collections) -> Result<T>) -> Result<T> {
        let mut guard = self.collections.write().await;
        match &self.persist_dir {
            None => f(&mut *guard),
            Some(dir) => {
                let mut next = guard.clone();
                let output = f(&mut next)?;
                write_snapshot(dir, &next).await?;
                *guard = next;
                Ok(output)
            }
        }
    }
}

async fn write_snapshot(dir: &Path, collections: &Collections) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(&Snapshot::capture(collections))
        .map_err(|e| store_error(format!("failed to serialize snapshot: {e}")))?;
    let path = dir.join(SNAPSHOT_FILE);
    let tmp = dir.join(format!("{SNAPSHOT_FILE}.tmp"));
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| store_error(format!("failed to write '{}': {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, &path)
        .await
        .map_err(|e| store_error(format!("failed to replace '{}': {e}", path.display())))?;
    debug!(path = %path.display(), "wrote snapshot");
    Ok(())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        if dimensions == 0 {
            return Err(store_error("collection dimensions must be greater than zero"));
        }
        {
            let collections = self.collections.read().await;
            if let Some(existing) = collections.get(name) {
                return existing.check_shape(name, dimensions, metric);
            }
        }
        self.mutate(|collections| match collections.entry(name.to_string()) {
            Entry::Occupied(existing) => existing.get().check_shape(name, dimensions, metric),
            Entry::Vacant(slot) => {
                slot.insert(Collection::new(dimensions, metric));
                Ok(())
            }
        })
        .await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.mutate(|collections| {
            collections.remove(name);
            Ok(())
        })
        .await
    }

    async fn upsert(&self, collection: &str, records: &[DocumentRecord]) -> Result<()> {
        self.mutate(|collections| {
            let store = collections.get_mut(collection).ok_or_else(|| missing_collection(collection))?;
            if let Some(bad) = records.iter().find(|r| r.embedding.len() != store.dimensions) {
                return Err(store_error(format!(
                    "record '{}' has {} dimensions, collection '{collection}' expects {}",
                    bad.id,
                    bad.embedding.len(),
                    store.dimensions
                )));
            }
            for record in records {
                store.insert(record.clone());
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<usize> {
        self.mutate(|collections| {
            let store = collections.get_mut(collection).ok_or_else(|| missing_collection(collection))?;
            Ok(ids.iter().filter(|id| store.records.remove(**id).is_some()).count())
        })
        .await
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        self.mutate(|collections| {
            let store = collections.get_mut(collection).ok_or_else(|| missing_collection(collection))?;
            store.records.clear();
            Ok(())
        })
        .await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing_collection(collection))?;
        if store.records.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if embedding.len() != store.dimensions {
            return Err(store_error(format!(
                "query has {} dimensions, collection '{collection}' expects {}",
                embedding.len(),
                store.dimensions
            )));
        }

        let mut scored: Vec<(f32, &StoredRecord)> = store
            .records
            .values()
            .map(|stored| {
                let distance = store.metric.distance(&stored.record.embedding, embedding);
                (if distance.is_nan() { f32::INFINITY } else { distance }, stored)
            })
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.seq.cmp(&b.1.seq)));
        scored.truncate(top_k);
        Ok(scored
            .into_iter()
            .map(|(distance, stored)| SearchResult { record: stored.record.clone(), distance })
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|c| c.records.len())
            .ok_or_else(|| missing_collection(collection))
    }

    fn persist_location(&self) -> Option<&Path> {
        self.persist_dir.as_deref()
    }
}
