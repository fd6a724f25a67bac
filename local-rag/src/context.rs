//! Context assembly: turning ranked search results into a bounded context block.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::SearchResult;

/// A passage selected for the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Id of the record the passage came from.
    pub id: String,
    /// Passage text, possibly truncated (see [`Passage::truncated`]).
    pub text: String,
    /// The record's `source` metadata, if any.
    pub source: Option<String>,
    /// Distance of the record to the query.
    pub distance: f32,
    /// Whether `text` was cut to fit the budget.
    pub truncated: bool,
}

/// An ordered set of passages whose total size is within a budget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBlock {
    passages: Vec<Passage>,
}

impl ContextBlock {
    /// The selected passages, most relevant first.
    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    /// Passage texts in order.
    pub fn texts(&self) -> Vec<String> {
        self.passages.iter().map(|p| p.text.clone()).collect()
    }

    /// Passage sources in the same order as [`texts`](Self::texts), `"Unknown"` when absent.
    pub fn sources(&self) -> Vec<String> {
        self.passages
            .iter()
            .map(|p| p.source.clone().unwrap_or_else(|| "Unknown".to_string()))
            .collect()
    }

    /// Total size of the passage texts, in characters.
    pub fn total_chars(&self) -> usize {
        self.passages.iter().map(|p| p.text.chars().count()).sum()
    }

    /// Number of passages.
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// Whether no passage was selected.
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// Selects passages in relevance order until a character budget is spent.
///
/// - Candidates are taken in the order given (ascending distance); equal
///   distances keep that order.
/// - A candidate whose normalized text matches an already selected passage is
///   skipped.
/// - Accumulation stops at the first candidate that would overflow the
///   budget. Passages are never split, except that a first candidate larger
///   than the whole budget is cut to exactly the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAssembler {
    budget: usize,
}

impl ContextAssembler {
    /// Create an assembler with a budget in characters.
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    /// The budget in characters.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Build a context block from candidates ordered most relevant first.
    pub fn build(&self, candidates: &[SearchResult]) -> ContextBlock {
        let mut passages: Vec<Passage> = Vec::new();
        if self.budget == 0 {
            return ContextBlock { passages };
        }

        let mut seen = HashSet::new();
        let mut used = 0usize;

        for candidate in candidates {
            let record = &candidate.record;
            if !seen.insert(normalize(&record.text)) {
                debug!(id = %record.id, "skipping duplicate passage");
                continue;
            }

            let size = record.text.chars().count();
            if passages.is_empty() && size > self.budget {
                let text = record.text.chars().take(self.budget).collect();
                passages.push(passage(candidate, text, true));
                used = self.budget;
                break;
            }
            if used + size > self.budget {
                break;
            }
            used += size;
            passages.push(passage(candidate, record.text.clone(), false));
        }

        debug!(
            candidates = candidates.len(),
            selected = passages.len(),
            used,
            budget = self.budget,
            "assembled context"
        );
        ContextBlock { passages }
    }
}

fn passage(candidate: &SearchResult, text: String, truncated: bool) -> Passage {
    Passage {
        id: candidate.record.id.clone(),
        text,
        source: candidate.record.source().map(str::to_string),
        distance: candidate.distance,
        truncated,
    }
}

/// Trim and collapse whitespace runs so formatting noise does not defeat dedup.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
