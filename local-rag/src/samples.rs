//! A small built-in corpus for first runs and demos.

use tracing::info;

use crate::document::Metadata;
use crate::error::Result;
use crate::store::DocumentStore;

/// The sample passages, in id order (`sample_doc_0` ..).
pub const SAMPLE_DOCUMENTS: [&str; 5] = [
    "Artificial Intelligence is revolutionizing many industries by enabling machines to learn from data and make intelligent decisions without explicit programming.",
    "The Model Context Protocol (MCP) enables modular tool use for AI agents by providing a standardized way to connect language models to external services.",
    "Vector databases like ChromaDB store embeddings of text, enabling fast semantic similarity search and retrieval of relevant documents.",
    "Retrieval-Augmented Generation (RAG) combines the benefits of retrieval and generation, allowing AI systems to ground their responses in factual, retrieved content.",
    "Ollama provides a simple way to run large language models locally, supporting models like Mistral, Llama, and others without requiring expensive cloud infrastructure.",
];

/// Ingest [`SAMPLE_DOCUMENTS`] into `store`. Returns the number of records written.
///
/// Ids are fixed, so loading twice overwrites rather than duplicates.
pub async fn load_sample_documents(store: &DocumentStore) -> Result<usize> {
    let ids: Vec<String> = (0..SAMPLE_DOCUMENTS.len()).map(|i| format!("sample_doc_{i}")).collect();
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    let metadata: Vec<Metadata> = SAMPLE_DOCUMENTS
        .iter()
        .map(|_| {
            Metadata::from([
                ("source".to_string(), "sample".into()),
                ("type".to_string(), "general_info".into()),
            ])
        })
        .collect();

    let added = store
        .add_documents(&SAMPLE_DOCUMENTS, Some(ids.as_slice()), Some(metadata.as_slice()))
        .await?;
    info!(collection = store.collection(), added, "loaded sample documents");
    Ok(added)
}
