//! Document store behaviour: ingestion, search, and management.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use common::{CountingEmbedder, CountingStore, DIM, PoisonEmbedder, memory_store};
use local_rag::mock::HashEmbeddingProvider;
use local_rag::{
    DistanceMetric, DocumentStore, EmbeddingProvider, InMemoryVectorStore, Metadata,
    MetadataValue, RagError, Result, document_id,
};

#[tokio::test]
async fn reingesting_same_id_overwrites() {
    let store = memory_store().await;

    store.add_documents(&["Paris is the capital of France."], Some(&["x"][..]), None).await.unwrap();
    assert_eq!(store.stats().await.unwrap().document_count, 1);

    store.add_documents(&["Paris is the capital of France."], Some(&["x"][..]), None).await.unwrap();
    assert_eq!(store.stats().await.unwrap().document_count, 1);
}

#[tokio::test]
async fn generated_ids_make_ingestion_idempotent() {
    let store = memory_store().await;
    let texts = ["alpha beta", "gamma delta"];

    assert_eq!(store.add_documents(&texts, None, None).await.unwrap(), 2);
    assert_eq!(store.add_documents(&texts, None, None).await.unwrap(), 2);
    assert_eq!(store.stats().await.unwrap().document_count, 2);

    let results = store.search("alpha beta", 1).await.unwrap();
    assert_eq!(results[0].record.id, document_id("alpha beta"));
}

#[tokio::test]
async fn search_on_empty_store_returns_nothing() {
    let store = memory_store().await;
    let results = store.search("anything at all", 5).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn capital_query_finds_paris_first() {
    let store = memory_store().await;
    store
        .add_documents(
            &["Paris is the capital of France.", "Lyon is a city in France."],
            Some(&["d1", "d2"][..]),
            None,
        )
        .await
        .unwrap();

    let results = store.search("capital of France", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.id, "d1");

    let both = store.search("capital of France", 5).await.unwrap();
    assert_eq!(both.len(), 2);
    assert!(both[0].distance <= both[1].distance);
}

#[tokio::test]
async fn mismatched_ids_are_rejected() {
    let store = memory_store().await;
    let err = store.add_documents(&["one", "two"], Some(&["only-one"][..]), None).await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));

    let err = store.add_documents(&[], None, None).await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));

    let metadata = vec![Metadata::new()];
    let err = store.add_documents(&["one", "two"], None, Some(metadata.as_slice())).await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
}

#[tokio::test]
async fn zero_k_and_blank_query_are_rejected() {
    let store = memory_store().await;
    assert!(matches!(store.search("q", 0).await, Err(RagError::Validation(_))));
    assert!(matches!(store.search("   ", 3).await, Err(RagError::Validation(_))));
}

#[tokio::test]
async fn embedding_failure_aborts_whole_batch() {
    let store = DocumentStore::open(
        "documents",
        Arc::new(PoisonEmbedder(HashEmbeddingProvider::new(DIM))),
        Arc::new(InMemoryVectorStore::new()),
        DistanceMetric::Cosine,
    )
    .await
    .unwrap();

    let err = store
        .add_documents(&["good text", "poison text", "more good text"], None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, RagError::Embedding { .. }));
    assert_eq!(store.stats().await.unwrap().document_count, 0);
}

#[tokio::test]
async fn query_embedding_failure_surfaces() {
    let embedder = Arc::new(CountingEmbedder::new());
    let store = DocumentStore::open(
        "documents",
        embedder.clone(),
        Arc::new(InMemoryVectorStore::new()),
        DistanceMetric::Cosine,
    )
    .await
    .unwrap();
    store.add_documents(&["some text"], None, None).await.unwrap();

    embedder.fail.store(true, Ordering::SeqCst);
    let err = store.search("some text", 3).await.unwrap_err();
    assert!(matches!(err, RagError::Embedding { .. }));
}

#[tokio::test]
async fn missing_metadata_defaults_to_unknown_source() {
    let store = memory_store().await;
    store.add_documents(&["plain text"], Some(&["p"][..]), None).await.unwrap();

    let results = store.search("plain text", 1).await.unwrap();
    assert_eq!(
        results[0].record.metadata.get("source"),
        Some(&MetadataValue::Text("unknown".into()))
    );
}

#[tokio::test]
async fn caller_metadata_is_preserved_verbatim() {
    let store = memory_store().await;
    let metadata = vec![Metadata::from([
        ("source".to_string(), "atlas".into()),
        ("page".to_string(), 12i64.into()),
        ("reviewed".to_string(), true.into()),
    ])];
    store.add_documents(&["Rivers of Europe"], Some(&["r"][..]), Some(metadata.as_slice())).await.unwrap();

    let results = store.search("rivers", 1).await.unwrap();
    assert_eq!(results[0].record.metadata, metadata[0]);
    assert_eq!(results[0].record.source(), Some("atlas"));
}

#[tokio::test]
async fn delete_and_clear_remove_records() {
    let store = memory_store().await;
    store.add_documents(&["a one", "b two", "c three"], Some(&["a", "b", "c"][..]), None).await.unwrap();

    assert_eq!(store.delete(&["a", "missing"]).await.unwrap(), 1);
    assert_eq!(store.stats().await.unwrap().document_count, 2);

    store.clear().await.unwrap();
    assert_eq!(store.stats().await.unwrap().document_count, 0);
    assert!(store.search("b two", 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn stats_never_embed() {
    let embedder = Arc::new(CountingEmbedder::new());
    let store = DocumentStore::open(
        "notes",
        embedder.clone(),
        Arc::new(CountingStore::default()),
        DistanceMetric::Cosine,
    )
    .await
    .unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.collection_name, "notes");
    assert_eq!(stats.document_count, 0);
    assert_eq!(stats.persist_location, None);
    assert_eq!(embedder.calls(), 0);
}

#[tokio::test]
async fn relevance_floor_drops_distant_results() {
    let store = memory_store().await.with_relevance_floor(Some(0.5));
    store
        .add_documents(
            &["Paris is the capital of France.", "Bananas are yellow fruit."],
            Some(&["paris", "banana"][..]),
            None,
        )
        .await
        .unwrap();

    let results = store.search("capital of France", 5).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.record.id.as_str()).collect();
    assert_eq!(ids, vec!["paris"]);
}

#[tokio::test]
async fn formatted_search_lists_documents() {
    let store = memory_store().await;
    assert_eq!(
        store.search_formatted("anything", 3).await.unwrap(),
        "No documents found matching the query."
    );

    store.add_documents(&["Vector databases store embeddings."], None, None).await.unwrap();
    let formatted = store.search_formatted("vector databases", 3).await.unwrap();
    assert!(formatted.contains("[Document 1]"));
    assert!(formatted.contains("Content: Vector databases store embeddings."));
    assert!(formatted.contains("Source: unknown"));
}

#[tokio::test]
async fn persisted_store_reports_location_and_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let index = Arc::new(InMemoryVectorStore::open(dir.path()).await.unwrap());
        let store = DocumentStore::open(
            "documents",
            Arc::new(HashEmbeddingProvider::new(DIM)),
            index,
            DistanceMetric::Cosine,
        )
        .await
        .unwrap();
        store.add_documents(&["kept across restarts"], Some(&["k"][..]), None).await.unwrap();
        assert_eq!(
            store.stats().await.unwrap().persist_location.as_deref(),
            Some(dir.path())
        );
    }

    let index = Arc::new(InMemoryVectorStore::open(dir.path()).await.unwrap());
    let store = DocumentStore::open(
        "documents",
        Arc::new(HashEmbeddingProvider::new(DIM)),
        index,
        DistanceMetric::Cosine,
    )
    .await
    .unwrap();
    assert_eq!(store.stats().await.unwrap().document_count, 1);
}

#[tokio::test]
async fn reopening_with_other_dimensions_fails() {
    let index = Arc::new(InMemoryVectorStore::new());
    DocumentStore::open(
        "documents",
        Arc::new(HashEmbeddingProvider::new(DIM)),
        index.clone(),
        DistanceMetric::Cosine,
    )
    .await
    .unwrap();

    let reopened = DocumentStore::open(
        "documents",
        Arc::new(HashEmbeddingProvider::new(DIM * 2)),
        index,
        DistanceMetric::Cosine,
    )
    .await;
    assert!(matches!(reopened, Err(RagError::VectorStore { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_a_partial_batch() {
    const N: usize = 8;
    let store = Arc::new(memory_store().await);

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            let texts: Vec<String> = (0..N).map(|i| format!("passage number {i}")).collect();
            let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
            let ids: Vec<String> = (0..N).map(|i| format!("d{i}")).collect();
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            for _ in 0..100 {
                store.add_documents(&texts, Some(ids.as_slice()), None).await.unwrap();
                store.clear().await.unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let results = store.search("passage number", N).await.unwrap();
                    assert!(results.is_empty() || results.len() == N, "saw {}", results.len());
                    let count = store.stats().await.unwrap().document_count;
                    assert!(count == 0 || count == N, "saw count {count}");
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}

/// Embedder whose batches violate the one-vector-per-text, fixed-width contract.
enum Misbehaving {
    DropsLast,
    Narrow,
}

#[async_trait]
impl EmbeddingProvider for Misbehaving {
    fn name(&self) -> &str {
        "misbehaving"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0; DIM])
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(match self {
            Self::DropsLast => vec![vec![1.0; DIM]; texts.len() - 1],
            Self::Narrow => vec![vec![1.0; DIM - 1]; texts.len()],
        })
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

#[tokio::test]
async fn batches_breaking_the_embedding_contract_write_nothing() {
    for provider in [Misbehaving::DropsLast, Misbehaving::Narrow] {
        let store = DocumentStore::open(
            "documents",
            Arc::new(provider),
            Arc::new(InMemoryVectorStore::new()),
            DistanceMetric::Cosine,
        )
        .await
        .unwrap();

        let err = store.add_documents(&["one", "two"], None, None).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding { .. }), "got {err:?}");
        assert_eq!(store.stats().await.unwrap().document_count, 0);
    }
}
