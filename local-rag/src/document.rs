//! Data types for stored documents, search results, and collection stats.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A scalar metadata value. Preserved verbatim, never interpreted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// A boolean flag.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Text(String),
}

impl MetadataValue {
    /// Return the value as a string slice if it is [`MetadataValue::Text`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Key-value metadata attached to a [`DocumentRecord`].
pub type Metadata = HashMap<String, MetadataValue>;

/// A stored passage with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    /// Unique identifier within the collection.
    pub id: String,
    /// The passage text. Never mutated after storage.
    pub text: String,
    /// The vector embedding for `text`.
    pub embedding: Vec<f32>,
    /// Caller-supplied metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl DocumentRecord {
    /// The `source` metadata entry, if it is a string.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(MetadataValue::as_str)
    }
}

/// A retrieved [`DocumentRecord`] paired with its distance to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved record.
    pub record: DocumentRecord,
    /// Distance to the query vector (smaller is more similar).
    pub distance: f32,
}

/// Cheap, read-only introspection of a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionStats {
    /// Name of the collection.
    pub collection_name: String,
    /// Number of stored records.
    pub document_count: usize,
    /// Where the collection is persisted, if anywhere.
    pub persist_location: Option<PathBuf>,
}

/// Derive a stable document id from its text.
///
/// Identical text always yields the same id, so re-ingesting it overwrites
/// the existing record.
pub fn document_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("doc_{hex}")
}
