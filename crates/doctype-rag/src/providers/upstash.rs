//! Upstash Vector REST provider

use async_trait::async_trait;
use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::VectorStoreConfig;
use crate::error::{Error, Result};
use crate::types::Chunk;

use super::vector_store::{VectorSearchResult, VectorStoreProvider};

/// Hosted vector index addressed over REST with a bearer token
pub struct UpstashVectorStore {
    client: reqwest::Client,
    url: String,
    token: String,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: String,
    vector: &'a [f32],
    metadata: Value,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
}

/// Every Upstash response wraps its payload in `result`
#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Deserialize)]
struct IndexInfo {
    #[serde(rename = "vectorCount", default)]
    vector_count: usize,
}

impl UpstashVectorStore {
    /// Create from config; URL and token are required
    pub fn from_config(config: &VectorStoreConfig, timeout_secs: u64) -> Result<Self> {
        let url = config
            .upstash_url
            .clone()
            .ok_or_else(|| Error::Config("UPSTASH_VECTOR_REST_URL is not set".to_string()))?;
        let token = config
            .upstash_token
            .clone()
            .ok_or_else(|| Error::Config("UPSTASH_VECTOR_REST_TOKEN is not set".to_string()))?;

        Self::new(url, token, timeout_secs)
    }

    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let mut request = self
            .client
            .request(method, format!("{}/{}", self.url, path))
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("Upstash request to /{} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status, &text, Error::VectorDb));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::vector_db(format!("Failed to parse Upstash response: {}", e)))?;
        Ok(envelope.result)
    }
}

fn upsert_body(chunks: &[Chunk]) -> Result<Value> {
    let vectors: Vec<UpsertVector> = chunks
        .iter()
        .map(|chunk| {
            if chunk.embedding.is_empty() {
                return Err(Error::vector_db(format!("Chunk {} has no embedding", chunk.id)));
            }
            Ok(UpsertVector {
                id: chunk.id.to_string(),
                vector: &chunk.embedding,
                metadata: chunk.to_vector_metadata(),
            })
        })
        .collect::<Result<_>>()?;
    Ok(serde_json::to_value(vectors)?)
}

fn into_results(matches: Vec<QueryMatch>) -> Vec<VectorSearchResult> {
    matches
        .into_iter()
        .filter_map(|m| {
            let metadata = m.metadata?;
            let chunk = Chunk::from_vector_metadata(&m.id, &metadata)?;
            Some(VectorSearchResult {
                chunk,
                similarity: m.score,
            })
        })
        .collect()
}

#[async_trait]
impl VectorStoreProvider for UpstashVectorStore {
    async fn upsert(&self, chunk: &Chunk) -> Result<()> {
        let body = upsert_body(std::slice::from_ref(chunk))?;
        let _: Value = self.call(Method::POST, "upsert", Some(body)).await?;
        Ok(())
    }

    async fn replace_all(&self, chunks: Vec<Chunk>) -> Result<()> {
        let body = upsert_body(&chunks)?;
        self.reset().await?;
        if !chunks.is_empty() {
            let _: Value = self.call(Method::POST, "upsert", Some(body)).await?;
        }
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorSearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let body = serde_json::to_value(QueryRequest {
            vector: query_embedding,
            top_k,
            include_metadata: true,
        })?;
        let matches: Vec<QueryMatch> = self.call(Method::POST, "query", Some(body)).await?;
        Ok(into_results(matches))
    }

    async fn reset(&self) -> Result<()> {
        let _: Value = self.call(Method::DELETE, "reset", None).await?;
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let info: IndexInfo = self.call(Method::GET, "info", None).await?;
        Ok(info.vector_count)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.len().await.is_ok())
    }

    fn name(&self) -> &str {
        "upstash"
    }
}
