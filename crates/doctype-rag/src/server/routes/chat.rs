//! Question answering endpoint

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{ChatRequest, ChatResponse};

/// POST /chat - Answer a question from the indexed document
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let start = Instant::now();
    tracing::info!("Question: \"{}\"", request.question);

    let response = state.chain().answer(&request.question).await.map_err(|e| {
        tracing::error!("Chat failed: {}", e);
        e
    })?;

    tracing::info!(
        "Answered in {:.1}s with {} sources",
        start.elapsed().as_secs_f64(),
        response.sources.len()
    );

    Ok(Json(response))
}
