//! Prompt templates for RAG generation

use crate::providers::vector_store::VectorSearchResult;

/// Fixed answer when the document has nothing relevant
pub const NO_ANSWER: &str = "I don't know based on this document.";

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Stuff every retrieved chunk into one context block
    pub fn build_context(results: &[VectorSearchResult]) -> String {
        results
            .iter()
            .map(|r| r.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Build the grounded RAG prompt
    pub fn build_rag_prompt(question: &str, context: &str) -> String {
        format!(
            r#"Answer the user's question based ONLY on the following context.
If the answer is not in the context, say "{NO_ANSWER}"

<context>
{context}
</context>

Question: {question}"#
        )
    }

    /// Unique citations in retrieval order
    pub fn sources(results: &[VectorSearchResult]) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for result in results {
            let citation = result.chunk.source.format_citation();
            if !sources.contains(&citation) {
                sources.push(citation);
            }
        }
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkSource};
    use uuid::Uuid;

    fn result(content: &str, page: u32) -> VectorSearchResult {
        VectorSearchResult {
            chunk: Chunk::new(
                Uuid::new_v4(),
                content.to_string(),
                ChunkSource::pdf("lease.pdf".to_string(), page, 8),
                0,
            ),
            similarity: 0.8,
        }
    }

    #[test]
    fn test_build_context_joins_chunks() {
        let results = vec![result("Rent is due monthly.", 1), result("Pets are allowed.", 3)];
        assert_eq!(
            PromptBuilder::build_context(&results),
            "Rent is due monthly.\n\nPets are allowed."
        );
    }

    #[test]
    fn test_rag_prompt_template() {
        let prompt = PromptBuilder::build_rag_prompt("Are pets allowed?", "Pets are allowed.");
        assert!(prompt
            .starts_with("Answer the user's question based ONLY on the following context."));
        assert!(prompt.contains("say \"I don't know based on this document.\""));
        assert!(prompt.contains("<context>\nPets are allowed.\n</context>"));
        assert!(prompt.ends_with("Question: Are pets allowed?"));
    }

    #[test]
    fn test_sources_deduplicated_in_order() {
        let results = vec![result("a", 3), result("b", 1), result("c", 3)];
        assert_eq!(
            PromptBuilder::sources(&results),
            vec!["lease.pdf, Page 3".to_string(), "lease.pdf, Page 1".to_string()]
        );
    }
}
