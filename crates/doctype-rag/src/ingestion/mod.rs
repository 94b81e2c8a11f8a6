//! Document ingestion: PDF loading and chunking

pub mod parser;
pub mod processor;
pub mod splitter;

pub use parser::{PageContent, ParsedPdf, PdfLoader};
pub use processor::IngestPipeline;
pub use splitter::RecursiveCharacterSplitter;
