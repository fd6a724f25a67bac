//! Offline stand-ins for the embedding and generation backends.
//!
//! [`HashEmbeddingProvider`] is a bag-of-words embedder using feature hashing:
//! texts sharing words end up close under cosine distance, which is enough
//! for demos and tests without a model download. [`MockGenerationBackend`]
//! replays a script of replies and records every request it receives.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::distance::magnitude;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{GenerationBackend, GenerationRequest};

/// A deterministic feature-hashing embedder.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    /// Create an embedder producing vectors of `dimensions` components.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(bytes) % self.dimensions as u64) as usize
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimensions];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            embedding[self.bucket(&token.to_lowercase())] += 1.0;
        }
        let norm = magnitude(&embedding);
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// One scripted reply of a [`MockGenerationBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Succeed with this text.
    Text(String),
    /// Fail with [`RagError::BackendUnavailable`].
    Unavailable,
    /// Fail with [`RagError::Generation`] carrying this message.
    Error(String),
    /// Sleep, then succeed with the text.
    Delayed(Duration, String),
}

/// A scripted [`GenerationBackend`].
///
/// Replies are consumed from the script in order; once it is exhausted every
/// call gets the fallback reply.
///
/// # Example
///
/// ```rust,ignore
/// use local_rag::mock::{MockGenerationBackend, MockReply};
///
/// let backend = MockGenerationBackend::new()
///     .with_script([MockReply::Unavailable, MockReply::Text("4".into())]);
/// ```
#[derive(Debug)]
pub struct MockGenerationBackend {
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerationBackend {
    /// A backend that always answers `"mock response"`.
    pub fn new() -> Self {
        Self::always(MockReply::Text("mock response".to_string()))
    }

    /// A backend that gives `reply` to every call not covered by a script.
    pub fn always(reply: MockReply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replace the script with `replies`, served before the fallback.
    pub fn with_script(mut self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        self.script = Mutex::new(replies.into_iter().collect());
        self
    }

    /// Number of `generate` calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());
        let reply = self.script.lock().await.pop_front().unwrap_or_else(|| self.fallback.clone());

        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Unavailable => Err(RagError::BackendUnavailable {
                backend: "mock".to_string(),
                message: "connection refused".to_string(),
            }),
            MockReply::Error(message) => {
                Err(RagError::Generation { backend: "mock".to_string(), message })
            }
            MockReply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }
}
