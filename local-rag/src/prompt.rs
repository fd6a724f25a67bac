//! Prompt construction.

use serde::{Deserialize, Serialize};

use crate::context::ContextBlock;

/// Instruction placed before the retrieved context.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful AI assistant. Use the provided context to answer the user's question accurately and concisely.";

/// Instruction placed after the question.
pub const DEFAULT_CLOSING_INSTRUCTION: &str = "Please provide a clear and informative answer based on the context provided. If the context doesn't contain relevant information, say so and provide your best response based on your knowledge.";

/// Renders the prompt sent to the generation backend.
///
/// With context, the prompt is the system instruction, the enumerated
/// passages, the question, and the closing instruction. Without context it is
/// the bare question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Text placed before the context section.
    pub system_instruction: String,
    /// Text placed after the question.
    pub closing_instruction: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            closing_instruction: DEFAULT_CLOSING_INSTRUCTION.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Render a prompt grounding `question` in `context`.
    ///
    /// Falls back to [`render_bare`](Self::render_bare) when `context` is empty.
    pub fn render(&self, question: &str, context: &ContextBlock) -> String {
        if context.is_empty() {
            return self.render_bare(question);
        }

        let mut prompt = format!("{}\n\nContext Information:\n", self.system_instruction);
        for (i, passage) in context.passages().iter().enumerate() {
            prompt.push_str(&format!("\n[Document {}]\nContent: {}\n", i + 1, passage.text));
            if let Some(source) = &passage.source {
                prompt.push_str(&format!("Source: {source}\n"));
            }
        }
        prompt.push_str(&format!("\nUser Question: {question}\n\n{}", self.closing_instruction));
        prompt
    }

    /// Render a prompt with no retrieved context: the question itself.
    pub fn render_bare(&self, question: &str) -> String {
        question.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextAssembler;
    use crate::document::{DocumentRecord, Metadata, SearchResult};

    #[test]
    fn renders_enumerated_passages_then_question() {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), "atlas".into());
        let candidates = vec![
            SearchResult {
                record: DocumentRecord {
                    id: "d1".into(),
                    text: "Paris is the capital of France.".into(),
                    embedding: vec![],
                    metadata,
                },
                distance: 0.1,
            },
            SearchResult {
                record: DocumentRecord {
                    id: "d2".into(),
                    text: "Lyon is a city in France.".into(),
                    embedding: vec![],
                    metadata: Metadata::new(),
                },
                distance: 0.4,
            },
        ];
        let context = ContextAssembler::new(1000).build(&candidates);

        let prompt = PromptTemplate::default().render("What is the capital?", &context);

        assert!(prompt.starts_with(DEFAULT_SYSTEM_INSTRUCTION));
        let first = prompt.find("[Document 1]\nContent: Paris").unwrap();
        let second = prompt.find("[Document 2]\nContent: Lyon").unwrap();
        let question = prompt.find("User Question: What is the capital?").unwrap();
        assert!(first < second && second < question);
        assert!(prompt.contains("Source: atlas"));
        assert!(prompt.ends_with(DEFAULT_CLOSING_INSTRUCTION));
    }

    #[test]
    fn empty_context_renders_bare_question() {
        let prompt = PromptTemplate::default().render("What is 2+2?", &ContextBlock::default());
        assert_eq!(prompt, "What is 2+2?");
    }
}
