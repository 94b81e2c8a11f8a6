//! doctype-rag: question answering over an uploaded PDF
//!
//! Upload a PDF, have it split into page-attributed chunks, embedded and
//! indexed, then ask questions that an LLM answers from the retrieved
//! chunks only. Embeddings run locally (ONNX), through Ollama or through
//! Gemini; vectors live in memory, in a local file or in Upstash Vector.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use server::RagServer;
pub use types::{
    document::{Chunk, ChunkSource, Document},
    query::ChatRequest,
    response::{ChatResponse, IngestResponse},
};

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document as PdfDocument, Object, Stream};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    use crate::error::{Error, Result};
    use crate::providers::{EmbeddingProvider, LlmProvider};
    use crate::types::{Chunk, ChunkSource};

    /// A PDF with one line of Courier text per page
    pub fn sample_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = PdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    /// Deterministic letter-histogram embeddings
    pub struct KeywordEmbedder;

    impl KeywordEmbedder {
        pub const DIMENSIONS: usize = 8;

        pub fn vector(text: &str) -> Vec<f32> {
            let mut v = vec![0.0; Self::DIMENSIONS];
            for b in text.to_lowercase().bytes().filter(u8::is_ascii_alphabetic) {
                v[b as usize % Self::DIMENSIONS] += 1.0;
            }
            v
        }
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(Self::vector(text))
        }

        fn dimensions(&self) -> usize {
            Self::DIMENSIONS
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "keyword"
        }
    }

    /// Rate limited for the first `failures` calls, then a `KeywordEmbedder`
    pub struct FlakyEmbedder {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyEmbedder {
        pub fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(Error::RateLimited("HTTP 429 Too Many Requests".to_string()));
            }
            Ok(KeywordEmbedder::vector(text))
        }

        fn dimensions(&self) -> usize {
            KeywordEmbedder::DIMENSIONS
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    /// Canned LLM that records its prompts
    pub struct MockLlm {
        answer: String,
        prompts: Mutex<Vec<String>>,
    }

    impl MockLlm {
        pub fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().len()
        }

        pub fn last_prompt(&self) -> Option<String> {
            self.prompts.lock().last().cloned()
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            Ok(self.answer.clone())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-1"
        }
    }

    /// Serve `router` on an ephemeral local port, returning its base URL
    pub async fn serve_stub(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Chunk from page `page` of notes.pdf, not yet embedded
    pub fn plain_chunk(text: &str, page: u32) -> Chunk {
        Chunk::new(
            Uuid::new_v4(),
            text.to_string(),
            ChunkSource::pdf("notes.pdf".to_string(), page, 5),
            0,
        )
    }

    /// Chunk from page `page` of notes.pdf with its keyword embedding
    pub fn embedded_chunk(text: &str, page: u32) -> Chunk {
        let mut chunk = plain_chunk(text, page);
        chunk.embedding = KeywordEmbedder::vector(text);
        chunk
    }
}
