//! PDF loading with per-page text extraction

use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// Text of a single page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Extracted text
    pub content: String,
}

/// A loaded PDF
#[derive(Debug, Clone)]
pub struct ParsedPdf {
    /// Pages in document order, empty pages included
    pub pages: Vec<PageContent>,
    /// SHA-256 of the extracted text
    pub content_hash: String,
}

impl ParsedPdf {
    /// Total number of pages
    pub fn total_pages(&self) -> u32 {
        self.pages.len() as u32
    }
}

/// Loads PDFs page by page
#[derive(Debug, Clone)]
pub struct PdfLoader {
    /// Upper bound for pdf-extract before falling back to lopdf
    extract_timeout: Duration,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            extract_timeout: Duration::from_secs(60),
        }
    }
}

impl PdfLoader {
    /// Create a loader that gives pdf-extract `extract_timeout`
    pub fn with_timeout(extract_timeout: Duration) -> Self {
        Self { extract_timeout }
    }

    /// Whether a filename looks like a PDF
    pub fn is_pdf(filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
    }

    /// Load a PDF from disk
    pub fn load(&self, path: &Path) -> Result<ParsedPdf> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();

        if !Self::is_pdf(&filename) {
            return Err(Error::UnsupportedFileType(format!(
                "'{}' - only PDF documents can be ingested",
                filename
            )));
        }

        let data = std::fs::read(path)?;
        self.parse(&filename, &data)
    }

    /// Parse PDF bytes
    pub fn parse(&self, filename: &str, data: &[u8]) -> Result<ParsedPdf> {
        let raw_pages = self.extract_pages(filename, data)?;

        let pages: Vec<PageContent> = raw_pages
            .iter()
            .enumerate()
            .map(|(i, text)| PageContent {
                page_number: i as u32 + 1,
                content: cleanup_pdf_text(text),
            })
            .collect();

        if pages.iter().all(|p| p.content.trim().is_empty()) {
            return Err(Error::file_parse(
                filename,
                "No text content could be extracted from PDF (it may be scanned or encrypted)",
            ));
        }

        let mut hasher = Sha256::new();
        for page in &pages {
            hasher.update(page.content.as_bytes());
        }

        Ok(ParsedPdf {
            pages,
            content_hash: hex::encode(hasher.finalize()),
        })
    }

    /// Per-page raw text: pdf-extract first, lopdf when it fails, hangs or
    /// disagrees with the page tree
    fn extract_pages(&self, filename: &str, data: &[u8]) -> Result<Vec<String>> {
        let document = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;
        let page_count = document.get_pages().len();

        match self.extract_with_timeout(data) {
            Ok(pages) if pages.len() == page_count => return Ok(pages),
            Ok(pages) => tracing::warn!(
                "pdf-extract returned {} pages for '{}' but the page tree has {}, using lopdf",
                pages.len(),
                filename,
                page_count
            ),
            Err(e) => tracing::warn!("pdf-extract failed on '{}': {}, using lopdf", filename, e),
        }

        Ok(extract_with_lopdf(&document))
    }

    /// pdf-extract can spin on unusual fonts, so it runs on its own thread
    fn extract_with_timeout(&self, data: &[u8]) -> std::result::Result<Vec<String>, String> {
        let data = data.to_vec();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem_by_pages(&data);
            let _ = tx.send(result.map_err(|e| e.to_string()));
        });

        match rx.recv_timeout(self.extract_timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Err(format!("timed out after {:?}", self.extract_timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err("extraction thread panicked".to_string())
            }
        }
    }
}

fn extract_with_lopdf(document: &lopdf::Document) -> Vec<String> {
    document
        .get_pages()
        .keys()
        .map(|&page_number| match document.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("Could not extract text from page {}: {}", page_number, e);
                String::new()
            }
        })
        .collect()
}

/// Normalise extracted text: drop NULs, map ligatures and typographic
/// punctuation to ASCII, trim lines and collapse blank runs into one
/// paragraph break
fn cleanup_pdf_text(text: &str) -> String {
    let text = text
        .replace('\0', "")
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2014}', "--")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{2026}', "...")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl");

    let mut cleaned = String::with_capacity(text.len());
    let mut pending_break = false;
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            pending_break = true;
            continue;
        }
        if !cleaned.is_empty() {
            cleaned.push_str(if pending_break { "\n\n" } else { "\n" });
        }
        cleaned.push_str(line);
        pending_break = false;
    }
    cleaned
}
