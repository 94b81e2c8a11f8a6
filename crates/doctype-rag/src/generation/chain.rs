//! Retrieval-augmented answering

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, LlmProvider, VectorStoreProvider};
use crate::types::ChatResponse;

use super::prompt::{PromptBuilder, NO_ANSWER};

/// Embed the question, retrieve the closest chunks and let the LLM answer
/// from them alone
#[derive(Clone)]
pub struct RagChain {
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStoreProvider>,
    llm: Arc<dyn LlmProvider>,
    top_k: usize,
}

impl RagChain {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
        llm: Arc<dyn LlmProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            llm,
            top_k,
        }
    }

    /// Answer a question from the indexed document
    pub async fn answer(&self, question: &str) -> Result<ChatResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::BadRequest("Question must not be empty".to_string()));
        }

        let query_embedding = self.embedder.embed(question).await?;
        let results = self.vector_store.search(&query_embedding, self.top_k).await?;

        if results.is_empty() {
            tracing::info!("No chunks retrieved, answering without the LLM");
            return Ok(ChatResponse {
                answer: NO_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        tracing::debug!(
            "Retrieved {} chunks (best similarity {:.3})",
            results.len(),
            results[0].similarity
        );

        let context = PromptBuilder::build_context(&results);
        let prompt = PromptBuilder::build_rag_prompt(question, &context);
        let answer = self.llm.generate(&prompt).await?;

        Ok(ChatResponse {
            answer: answer.trim().to_string(),
            sources: PromptBuilder::sources(&results),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::local::MemoryVectorStore;
    use crate::test_support::{embedded_chunk, KeywordEmbedder, MockLlm};

    fn chain(store: Arc<MemoryVectorStore>, llm: Arc<MockLlm>) -> RagChain {
        RagChain::new(Arc::new(KeywordEmbedder), store, llm, 3)
    }

    #[tokio::test]
    async fn test_empty_index_short_circuits() {
        let llm = Arc::new(MockLlm::new("should not be used"));
        let store = Arc::new(MemoryVectorStore::new(KeywordEmbedder::DIMENSIONS));

        let response = chain(store, llm.clone()).answer("What is the deadline?").await.unwrap();

        assert_eq!(response.answer, "I don't know based on this document.");
        assert!(response.sources.is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_answer_uses_retrieved_context() {
        let llm = Arc::new(MockLlm::new("  The deadline is March 3.\n"));
        let store = Arc::new(MemoryVectorStore::new(KeywordEmbedder::DIMENSIONS));
        store
            .replace_all(vec![
                embedded_chunk("The deadline is March 3.", 2),
                embedded_chunk("Submissions go to the registrar.", 2),
                embedded_chunk("Late entries are not accepted.", 5),
            ])
            .await
            .unwrap();

        let response = chain(store, llm.clone()).answer("When is the deadline?").await.unwrap();

        assert_eq!(response.answer, "The deadline is March 3.");
        assert_eq!(llm.calls(), 1);

        // two chunks share page 2
        assert_eq!(response.sources.len(), 2);
        assert!(response.sources.contains(&"notes.pdf, Page 2".to_string()));
        assert!(response.sources.contains(&"notes.pdf, Page 5".to_string()));

        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("The deadline is March 3."));
        assert!(prompt.ends_with("Question: When is the deadline?"));
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let llm = Arc::new(MockLlm::new("unused"));
        let store = Arc::new(MemoryVectorStore::new(KeywordEmbedder::DIMENSIONS));

        let err = chain(store, llm).answer("   ").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }
}
