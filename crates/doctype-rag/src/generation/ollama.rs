//! Ollama API client with retry logic

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Ollama API client with automatic retry
pub struct OllamaClient {
    client: Client,
    base_url: String,
    embed_model: String,
    generate_model: String,
    temperature: f32,
    max_retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            embed_model: config.ollama_embed_model.clone(),
            generate_model: config.ollama_generate_model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    pub fn generate_model(&self) -> &str {
        &self.generate_model
    }

    /// Retry a request with exponential backoff (1s, 2s, 4s, ...).
    /// Client errors, including 429, are returned at once.
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    let delay = Duration::from_secs(2u64.pow(attempt));
                    tracing::warn!(
                        "Ollama request failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
        on_error: fn(String) -> Error,
    ) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| on_error(format!("Ollama request to {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status, &body, on_error));
        }

        response
            .json()
            .await
            .map_err(|e| on_error(format!("Failed to parse Ollama response: {}", e)))
    }

    /// Check if Ollama is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Embed text with the configured embedding model
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = &EmbedRequest {
            model: &self.embed_model,
            prompt: text,
        };

        self.retry_request(move || async move {
            let response: EmbedResponse = self
                .post("/api/embeddings", request, Error::Embedding)
                .await?;
            Ok(response.embedding)
        })
        .await
    }

    /// Complete a prompt with the configured generation model
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let request = &GenerateRequest {
            model: &self.generate_model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        tracing::debug!("Generating answer with model: {}", self.generate_model);

        self.retry_request(move || async move {
            let response: GenerateResponse =
                self.post("/api/generate", request, Error::Llm).await?;
            Ok(response.response)
        })
        .await
    }
}

/// Connection problems, timeouts and 5xx are worth another try.
/// Rate limits are left to the caller's `RetryPolicy`.
fn is_transient(error: &Error) -> bool {
    match error {
        Error::Embedding(msg) | Error::Llm(msg) => {
            !msg.starts_with("HTTP 4") && !msg.starts_with("Failed to parse")
        }
        _ => false,
    }
}
