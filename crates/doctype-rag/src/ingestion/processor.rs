//! Ingestion pipeline orchestration

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkSource, Document};

use super::parser::{PageContent, PdfLoader};
use super::splitter::RecursiveCharacterSplitter;

/// Load a PDF and cut it into page-attributed chunks
pub struct IngestPipeline {
    loader: PdfLoader,
    splitter: RecursiveCharacterSplitter,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            loader: PdfLoader::default(),
            splitter: RecursiveCharacterSplitter::new(chunk_size, chunk_overlap),
        }
    }

    /// Use a specific loader
    pub fn with_loader(mut self, loader: PdfLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Split every page on its own, numbering chunks across the document
    pub fn split_pages(&self, doc: &Document, pages: &[PageContent]) -> Vec<Chunk> {
        let total_pages = pages.len() as u32;
        let mut chunks = Vec::new();

        for page in pages {
            for text in self.splitter.split_text(&page.content) {
                let source = ChunkSource::pdf(doc.filename.clone(), page.page_number, total_pages);
                chunks.push(Chunk::new(doc.id, text, source, chunks.len() as u32));
            }
        }

        chunks
    }

    /// Load the PDF at `path` and split it; `filename` is the name the
    /// user uploaded and ends up in every citation
    pub fn load_and_split(&self, path: &Path, filename: &str) -> Result<(Document, Vec<Chunk>)> {
        if !PdfLoader::is_pdf(filename) {
            return Err(Error::UnsupportedFileType(format!(
                "'{}' - only PDF documents can be ingested",
                filename
            )));
        }

        let data = std::fs::read(path)?;
        let parsed = self.loader.parse(filename, &data)?;

        let mut doc = Document::new(
            filename.to_string(),
            parsed.content_hash.clone(),
            data.len() as u64,
        );
        doc.total_pages = Some(parsed.total_pages());

        let chunks = self.split_pages(&doc, &parsed.pages);
        doc.total_chunks = chunks.len() as u32;

        tracing::info!(
            "Loaded PDF: {} pages → {} chunks",
            parsed.total_pages(),
            chunks.len()
        );

        Ok((doc, chunks))
    }
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}
