//! The embedding seam: text in, fixed-width vectors out.

use async_trait::async_trait;

use crate::error::Result;

/// Turns passages and queries into vectors for a [`DocumentStore`](crate::DocumentStore).
///
/// The store fixes a collection's dimensionality from
/// [`dimensions`](EmbeddingProvider::dimensions) when it opens the collection,
/// so a provider must keep returning vectors of exactly that width. Failures
/// should be reported as [`RagError::Embedding`](crate::RagError::Embedding).
///
/// # Example
///
/// ```rust,ignore
/// use local_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short name of the provider, used in errors and logs.
    fn name(&self) -> &str;

    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts.
    ///
    /// The result holds one vector per input, in input order, each with
    /// [`dimensions`](EmbeddingProvider::dimensions) components. The store
    /// rejects the whole batch, writing nothing, when either holds false.
    ///
    /// The default calls [`embed`](EmbeddingProvider::embed) once per text.
    /// Override it when the backend accepts batches natively.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Width of every vector this provider returns.
    fn dimensions(&self) -> usize;
}
