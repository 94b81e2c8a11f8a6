//! Google Gemini API providers (Generative Language API, API-key auth)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::LlmProvider;

/// HTTP plumbing shared by the embedder and the generator
#[derive(Clone)]
struct GeminiApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiApi {
    fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .google_api_key
            .clone()
            .ok_or_else(|| Error::Config("Gemini requires GOOGLE_API_KEY".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post<Req, Resp>(
        &self,
        url: &str,
        body: &Req,
        on_error: fn(String) -> Error,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| on_error(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status, &body, on_error));
        }

        response
            .json()
            .await
            .map_err(|e| on_error(format!("Failed to parse Gemini response: {}", e)))
    }
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

impl Content {
    fn text(text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    content: Content,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini text embeddings (text-embedding-004, 768 dimensions)
pub struct GeminiEmbedder {
    api: GeminiApi,
    model: String,
    dimensions: usize,
}

impl GeminiEmbedder {
    /// Create a new Gemini embedder
    pub fn new(config: &LlmConfig, dimensions: usize) -> Result<Self> {
        Ok(Self {
            api: GeminiApi::new(config)?,
            model: config.gemini_embed_model.clone(),
            dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: format!("models/{}", self.model),
            content: Content::text(text),
        };

        let url = self.api.endpoint(&self.model, "embedContent");
        let response: EmbedResponse = self.api.post(&url, &request, Error::Embedding).await?;

        if response.embedding.values.is_empty() {
            return Err(Error::embedding("Gemini returned an empty embedding"));
        }
        Ok(response.embedding.values)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.embed("health check").await.is_ok())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    /// Text of the first candidate, all parts concatenated
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().map(|p| p.text).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Gemini text generation
pub struct GeminiLlm {
    api: GeminiApi,
    model: String,
    temperature: f32,
}

impl GeminiLlm {
    /// Create a new Gemini LLM provider
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            api: GeminiApi::new(config)?,
            model: config.gemini_model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content::text(prompt)],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let url = self.api.endpoint(&self.model, "generateContent");
        let response: GenerateResponse = self.api.post(&url, &request, Error::Llm).await?;

        response
            .into_text()
            .ok_or_else(|| Error::llm("No text in Gemini response"))
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models/{}", self.api.base_url, self.model);
        let response = self
            .api
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api.api_key)
            .send()
            .await;
        Ok(matches!(response, Ok(r) if r.status().is_success()))
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LlmConfig {
        LlmConfig {
            google_api_key: Some("test-key".to_string()),
            gemini_base_url: "https://example.test/v1beta/".to_string(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_requires_api_key() {
        let err = GeminiLlm::new(&LlmConfig::default()).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_endpoint() {
        let llm = GeminiLlm::new(&config()).unwrap();
        assert_eq!(
            llm.api.endpoint(&llm.model, "generateContent"),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_body() {
        let request = GenerateRequest {
            contents: vec![Content::text("What is the refund policy?")],
            generation_config: GenerationConfig { temperature: 0.0 },
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "What is the refund policy?");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn test_response_text() {
        let response: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{ "text": "Thirty " }, { "text": "days." }],
                    "role": "model"
                }
            }]
        }))
        .unwrap();
        assert_eq!(response.into_text().as_deref(), Some("Thirty days."));

        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert!(blocked.into_text().is_none());
    }

    #[test]
    fn test_embed_response() {
        let response: EmbedResponse =
            serde_json::from_str(r#"{"embedding":{"values":[0.1,0.2,0.3]}}"#).unwrap();
        assert_eq!(response.embedding.values.len(), 3);
    }
}
