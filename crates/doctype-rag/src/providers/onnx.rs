//! Local sentence embeddings with ONNX Runtime
//!
//! Runs a sentence-transformers export (all-MiniLM-L6-v2 by default, 384
//! dimensions) on the CPU: tokenise, run the encoder, mean-pool the last
//! hidden state under the attention mask and L2-normalise.

use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;

const HF_BASE_URL: &str = "https://huggingface.co/sentence-transformers";

/// Session and tokenizer; inference needs exclusive access
struct SentenceModel {
    session: Session,
    tokenizer: Tokenizer,
    max_length: usize,
    dimensions: usize,
}

/// ONNX sentence embedder
pub struct OnnxEmbedder {
    model: Arc<Mutex<SentenceModel>>,
    dimensions: usize,
}

impl OnnxEmbedder {
    /// Load the model, downloading it into the cache directory on first use
    pub async fn new(config: &EmbeddingConfig) -> Result<Self> {
        tracing::info!("Initializing ONNX embedder with model: {}", config.model);

        let model_dir = config.cache_dir.join(&config.model);
        tokio::fs::create_dir_all(&model_dir)
            .await
            .map_err(|e| Error::Config(format!("Failed to create cache directory: {}", e)))?;

        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        let repo = format!("{}/{}/resolve/main", HF_BASE_URL, config.model);
        if !model_path.exists() {
            download(&format!("{}/onnx/model.onnx", repo), &model_path).await?;
        }
        if !tokenizer_path.exists() {
            download(&format!("{}/tokenizer.json", repo), &tokenizer_path).await?;
        }

        let session = Session::builder()
            .map_err(|e| Error::embedding(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::embedding(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| Error::embedding(format!("Failed to set threads: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| Error::embedding(format!("Failed to load model: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::embedding(format!("Failed to load tokenizer: {}", e)))?;

        let dimensions = config.effective_dimensions();
        tracing::info!("ONNX embedder ready ({} dimensions)", dimensions);

        Ok(Self {
            model: Arc::new(Mutex::new(SentenceModel {
                session,
                tokenizer,
                max_length: config.max_length,
                dimensions,
            })),
            dimensions,
        })
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || model.lock().encode(&texts))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }
}

impl SentenceModel {
    fn encode(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = texts.len();
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::embedding(format!("Tokenization failed: {}", e)))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_length)
            .max(1);

        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let row = i * seq_len;
            let ids = encoding.get_ids().iter().take(seq_len);
            let mask = encoding.get_attention_mask().iter();
            let types = encoding.get_type_ids().iter();

            for (j, ((&id, &m), &t)) in ids.zip(mask).zip(types).enumerate() {
                input_ids[row + j] = id as i64;
                attention_mask[row + j] = m as i64;
                token_type_ids[row + j] = t as i64;
            }
        }

        let shape = vec![batch_size, seq_len];
        let tensor = |data: Vec<i64>, what: &str| {
            Tensor::from_array((shape.clone(), data.into_boxed_slice()))
                .map_err(|e| Error::embedding(format!("Failed to build {} tensor: {}", what, e)))
        };

        let inputs = vec![
            ("input_ids", tensor(input_ids, "input_ids")?.into_dyn()),
            ("attention_mask", tensor(attention_mask.clone(), "attention_mask")?.into_dyn()),
            ("token_type_ids", tensor(token_type_ids, "token_type_ids")?.into_dyn()),
        ];

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| Error::embedding(format!("Inference failed: {}", e)))?;

        let outputs: Vec<_> = outputs.iter().collect();
        let hidden = outputs
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| outputs.first())
            .map(|(_, value)| value)
            .ok_or_else(|| Error::embedding("Model produced no output tensor"))?;

        let (shape, data) = hidden
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::embedding(format!("Failed to extract tensor: {}", e)))?;
        let hidden_size = shape.get(2).map(|&d| d as usize).unwrap_or(self.dimensions);

        Ok((0..batch_size)
            .map(|i| {
                let mask = &attention_mask[i * seq_len..(i + 1) * seq_len];
                mean_pool(data, mask, i, hidden_size)
            })
            .collect())
    }
}

/// Masked mean over the token axis of row `row`, L2-normalised
fn mean_pool(hidden: &[f32], mask: &[i64], row: usize, hidden_size: usize) -> Vec<f32> {
    let seq_len = mask.len();
    let mut pooled = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for (j, &m) in mask.iter().enumerate() {
        if m == 0 {
            continue;
        }
        let offset = (row * seq_len + j) * hidden_size;
        if let Some(token) = hidden.get(offset..offset + hidden_size) {
            for (acc, v) in pooled.iter_mut().zip(token) {
                *acc += v;
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        pooled.iter_mut().for_each(|v| *v /= count);
    }

    let norm: f32 = pooled.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        pooled.iter_mut().for_each(|v| *v /= norm);
    }

    pooled
}

async fn download(url: &str, path: &Path) -> Result<()> {
    tracing::info!("Downloading {}", url);

    let response = reqwest::get(url)
        .await
        .map_err(|e| Error::embedding(format!("Failed to download {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(Error::embedding(format!(
            "Download of {} failed: HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::embedding(format!("Failed to read {}: {}", url, e)))?;

    tokio::fs::write(path, &bytes).await?;
    tracing::info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.run(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Empty embedding result"))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_pool_ignores_padding() {
        // one row, three tokens of width 2; the last token is padding
        let hidden = [3.0, 0.0, 1.0, 0.0, 100.0, 100.0];
        let pooled = mean_pool(&hidden, &[1, 1, 0], 0, 2);
        assert!((pooled[0] - 1.0).abs() < 1e-6);
        assert!(pooled[1].abs() < 1e-6);
    }

    #[test]
    fn test_mean_pool_second_row() {
        let hidden = [9.0, 9.0, 0.0, 2.0];
        let pooled = mean_pool(&hidden, &[1], 1, 2);
        assert_eq!(pooled, vec![0.0, 1.0]);
    }
}
