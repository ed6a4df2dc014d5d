use anyhow::{Result, anyhow, ensure};
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{XLMRobertaModel, Config as XLMRobertaConfig};
use tokenizers::Tokenizer;
use tracing::{info, warn};
use twox_hash::XxHash64;

use ragdb_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{normalized_tokens, tokenize_on_device};
use crate::weights::{load_weights, resolve_model_dir};

pub const BGE_M3_DIM: usize = 1024;
const BGE_M3_MAX_LEN: usize = 256;
const XLM_ROBERTA_PAD_ID: u32 = 1;

/// BGE-M3 sentence embeddings (XLM-RoBERTa encoder, masked mean pooling,
/// L2-normalized, 1024 dimensions). Loaded once; `embed_batch` is cheap.
pub struct BgeM3Embedder { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device }

impl BgeM3Embedder {
    pub fn new() -> Result<Self> { Self::from_dir(None) }

    pub fn from_dir(explicit: Option<&Path>) -> Result<Self> {
        let model_dir = resolve_model_dir(explicit, &["APP_MODEL_DIR", "MODEL_DIR"], &["../models/bge-m3", "models/bge-m3"])?;
        let device = select_device();
        info!("Loading BGE-M3 model from {}", model_dir.display());
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(model_dir.join("config.json"))?)?;
        let vb = VarBuilder::from_tensors(load_weights(&model_dir, &device)?, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!("BGE-M3 model loaded");
        Ok(Self { model, tokenizer, device })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, BGE_M3_MAX_LEN, XLM_ROBERTA_PAD_ID, &self.device)?;
        let token_type_ids = Tensor::zeros((1, BGE_M3_MAX_LEN), DType::I64, &self.device)?;
        let hidden_states = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let emb = masked_mean_l2(&hidden_states, &attention_mask)?;
        let emb = emb.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1::<f32>()?;
        ensure!(emb.len() == BGE_M3_DIM, "unexpected embedding dim {}", emb.len());
        if start.elapsed().as_millis() > 100 { warn!("Slow embedding: {} ms", start.elapsed().as_millis()); }
        Ok(emb)
    }
}

impl Embedder for BgeM3Embedder {
    fn dim(&self) -> usize { BGE_M3_DIM }
    fn max_len(&self) -> usize { BGE_M3_MAX_LEN }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { texts.iter().map(|t| self.embed_text(t)).collect() }
}

/// Deterministic stand-in: hashed bag of normalized tokens, L2-normalized.
/// Texts sharing words land close together, which is enough for tests and
/// offline development.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in normalized_tokens(text).enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + val * 0.5 + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { BGE_M3_MAX_LEN }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
}

pub(crate) fn env_flag(key: &str) -> bool {
    std::env::var(key).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn get_default_embedder() -> Result<Box<dyn Embedder>> { embedder_from_dir(None) }

/// `APP_USE_FAKE_EMBEDDINGS=1` selects [`FakeEmbedder`]; otherwise BGE-M3 is
/// loaded from `explicit` or the usual model locations.
pub fn embedder_from_dir(explicit: Option<&Path>) -> Result<Box<dyn Embedder>> {
    if env_flag("APP_USE_FAKE_EMBEDDINGS") { info!("Using FakeEmbedder"); return Ok(Box::new(FakeEmbedder::new(BGE_M3_DIM))); }
    Ok(Box::new(BgeM3Embedder::from_dir(explicit)?))
}
