//! Document ingestion endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::ingestion::{IngestPipeline, PdfLoader};
use crate::server::state::AppState;
use crate::types::{Chunk, Document, IngestResponse};

/// Multipart field carrying the upload
const FILE_FIELD: &str = "file";

/// POST /ingest - Upload a PDF, then chunk, embed and store it
pub async fn ingest_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>> {
    let start = Instant::now();
    let (filename, data) = read_file_field(&mut multipart).await?;

    if !PdfLoader::is_pdf(&filename) {
        return Err(Error::UnsupportedFileType(format!(
            "'{}' - only PDF documents can be ingested",
            filename
        )));
    }

    tracing::info!("Received upload: {} ({} bytes)", filename, data.len());

    let chunks_processed = process_upload(&state, data, &filename).await.map_err(|e| {
        tracing::error!("Ingestion of {} failed: {}", filename, e);
        e
    })?;

    tracing::info!(
        "Ingested {}: {} chunks in {:.1}s",
        filename,
        chunks_processed,
        start.elapsed().as_secs_f64()
    );

    Ok(Json(IngestResponse::success(filename, chunks_processed)))
}

/// Pull the `file` field out of the form; other fields are skipped
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(base_name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::BadRequest("Uploaded file has no filename".to_string()))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::BadRequest(format!("Failed to read file: {}", e)))?;

        return Ok((filename, data.to_vec()));
    }

    Err(Error::BadRequest(format!(
        "Missing multipart field '{}'",
        FILE_FIELD
    )))
}

/// Last path component of a client supplied name
fn base_name(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim().to_string()
}

/// `temp_<random>_<name>` inside the upload directory
fn write_temp_file(dir: &Path, filename: &str, data: &[u8]) -> Result<NamedTempFile> {
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix("temp_")
        .suffix(&format!("_{}", filename))
        .tempfile_in(dir)?;
    file.write_all(data)?;
    file.flush()?;
    Ok(file)
}

/// Write the upload to a temp file, load and split it, then remove the file
fn stage_and_split(
    pipeline: &IngestPipeline,
    dir: &Path,
    filename: &str,
    data: &[u8],
) -> Result<(Document, Vec<Chunk>)> {
    let upload = write_temp_file(dir, filename, data)?;
    let result = pipeline.load_and_split(upload.path(), filename);

    if let Err(e) = upload.close() {
        tracing::warn!("Failed to remove temporary upload for {}: {}", filename, e);
    }
    result
}

async fn process_upload(state: &AppState, data: Vec<u8>, filename: &str) -> Result<usize> {
    let pipeline = state.pipeline().clone();
    let dir = state.config().server.upload_dir.clone();
    let name = filename.to_string();
    let (document, chunks) =
        tokio::task::spawn_blocking(move || stage_and_split(&pipeline, &dir, &name, &data))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

    if chunks.is_empty() {
        return Err(Error::file_parse(filename, "Document produced no text chunks"));
    }

    let stored = state.ingestor().ingest(chunks).await?;
    state.set_last_document(document);
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name_strips_directories() {
        assert_eq!(base_name("report.pdf"), "report.pdf");
        assert_eq!(base_name("../../etc/report.pdf"), "report.pdf");
        assert_eq!(base_name("C:\\Users\\me\\report.pdf"), "report.pdf");
    }

    #[test]
    fn test_temp_file_naming() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_temp_file(dir.path(), "report.pdf", b"%PDF").unwrap();

        let name = file.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("temp_"));
        assert!(name.ends_with("_report.pdf"));
        assert_eq!(std::fs::read(file.path()).unwrap(), b"%PDF");

        file.close().unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_staged_upload_removed_after_split() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = IngestPipeline::default();

        let pdf = crate::test_support::sample_pdf(&["Alpha page text"]);
        let (document, chunks) = stage_and_split(&pipeline, dir.path(), "a.pdf", &pdf).unwrap();
        assert_eq!(document.filename, "a.pdf");
        assert_eq!(chunks.len(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        assert!(stage_and_split(&pipeline, dir.path(), "b.pdf", b"not a pdf").is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
