//! Sentence embeddings with Candle.
//!
//! Loads a BERT-family sentence-transformer (all-MiniLM-L6-v2 by default)
//! from the Hugging Face Hub and produces mean-pooled, L2-normalised vectors,
//! matching what `sentence-transformers` computes for the same model.
//!
//! Model files are cached under the Hugging Face cache directory; the first
//! start downloads them (~90MB).

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::semantic_index::{Embedder, IndexError};

pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Output width of MiniLM-L6 and BGE-small.
pub const EMBEDDING_DIM: usize = 384;

/// Word pieces beyond this are truncated (MiniLM's trained sequence length).
const MAX_TOKENS: usize = 256;

pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
    model_name: String,
}

impl SentenceEmbedder {
    /// Download (or reuse the cached copy of) `model_name` and load it on CPU.
    pub fn from_hub(model_name: &str) -> Result<Self, IndexError> {
        info!(model = model_name, "loading embedding model");
        let load = |what: &str, e: &dyn std::fmt::Display| IndexError::Model {
            model: model_name.to_string(),
            reason: format!("{what}: {e}"),
        };

        let device = Device::Cpu;
        let api = Api::new().map_err(|e| load("hub client", &e))?;
        let repo = api.repo(Repo::new(model_name.to_string(), RepoType::Model));

        let config_path = repo.get("config.json").map_err(|e| load("config.json", &e))?;
        let tokenizer_path = repo.get("tokenizer.json").map_err(|e| load("tokenizer.json", &e))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| load("model.safetensors", &e))?;
        debug!(model = model_name, "model files available in cache");

        let raw_config = std::fs::read_to_string(&config_path).map_err(|e| load("config.json", &e))?;
        let config: Config = serde_json::from_str(&raw_config).map_err(|e| load("config.json", &e))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| load("tokenizer", &e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| load("tokenizer truncation", &e))?;
        // Padding is done by hand in `forward_batch`.
        tokenizer.with_padding(None);

        // SAFETY: the weights file lives in the hub cache and is not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .map_err(|e| load("weights", &e))?
        };
        let model = BertModel::load(vb, &config).map_err(|e| load("bert model", &e))?;

        info!(model = model_name, hidden_size = config.hidden_size, "embedding model loaded");
        Ok(Self {
            model,
            tokenizer,
            device,
            dimension: config.hidden_size,
            model_name: model_name.to_string(),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn forward_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, IndexError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| IndexError::Embedding(format!("tokenization failed: {e}")))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let batch = encodings.len();

        let mut ids = Vec::with_capacity(batch * max_len);
        let mut mask = Vec::with_capacity(batch * max_len);
        let mut type_ids = Vec::with_capacity(batch * max_len);
        for enc in &encodings {
            let pad = max_len - enc.get_ids().len();
            ids.extend(enc.get_ids().iter().copied().chain(std::iter::repeat_n(0, pad)));
            mask.extend(enc.get_attention_mask().iter().copied().chain(std::iter::repeat_n(0, pad)));
            type_ids.extend(enc.get_type_ids().iter().copied().chain(std::iter::repeat_n(0, pad)));
        }

        let vectors = self.pooled(ids, mask, type_ids, (batch, max_len))?;
        debug!(batch, max_len, "embedded batch");
        Ok(vectors)
    }

    /// BERT forward pass, attention-masked mean pooling, L2 normalisation.
    fn pooled(
        &self,
        ids: Vec<u32>,
        mask: Vec<u32>,
        type_ids: Vec<u32>,
        shape: (usize, usize),
    ) -> Result<Vec<Vec<f32>>, IndexError> {
        let run = || -> candle_core::Result<Vec<Vec<f32>>> {
            let input_ids = Tensor::from_vec(ids, shape, &self.device)?;
            let attention_mask = Tensor::from_vec(mask, shape, &self.device)?;
            let token_type_ids = Tensor::from_vec(type_ids, shape, &self.device)?;

            // (batch, seq, hidden)
            let hidden = self
                .model
                .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

            let weights = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
            let summed = hidden.broadcast_mul(&weights)?.sum(1)?;
            let counts = weights.sum(1)?.clamp(1e-9, f64::MAX)?;
            let mean = summed.broadcast_div(&counts)?;

            let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
            mean.broadcast_div(&norm)?.to_vec2::<f32>()
        };
        run().map_err(|e| IndexError::Embedding(e.to_string()))
    }
}

impl Embedder for SentenceEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        self.forward_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::Embedding("model returned no vector".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, IndexError> {
        self.forward_batch(texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    #[ignore] // Requires model download
    fn embeddings_are_unit_length() {
        let embedder = SentenceEmbedder::from_hub(DEFAULT_EMBEDDING_MODEL).expect("load model");
        let v = embedder.embed("Water Bottles water emergency relief supply").unwrap();
        assert_eq!(v.len(), EMBEDDING_DIM);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    #[ignore] // Requires model download
    fn batch_matches_single_embedding() {
        let embedder = SentenceEmbedder::from_hub(DEFAULT_EMBEDDING_MODEL).expect("load model");
        let texts = ["Tents shelter emergency relief supply", "Batteries equipment emergency relief supply"];
        let batch = embedder.embed_batch(&texts).unwrap();
        let single = embedder.embed(texts[1]).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(cosine(&batch[1], &single) > 0.999);
    }

    #[test]
    #[ignore] // Requires model download
    fn related_text_is_closer_than_unrelated() {
        let embedder = SentenceEmbedder::from_hub(DEFAULT_EMBEDDING_MODEL).expect("load model");
        let query = embedder.embed("disaster relief emergency: people are thirsty").unwrap();
        let water = embedder.embed("Water Bottles water emergency relief supply").unwrap();
        let batteries = embedder.embed("Batteries equipment emergency relief supply").unwrap();
        assert!(cosine(&query, &water) > cosine(&query, &batteries));
    }
}
