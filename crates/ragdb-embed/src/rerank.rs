//! Cross-encoder reranking.
//!
//! Scores (query, passage) pairs jointly with an ms-marco MiniLM cross-encoder
//! (BERT encoder, pooler and a single-logit classification head). The logit
//! goes through a sigmoid so every score lands in [0,1].

use anyhow::{Result, anyhow};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use ragdb_core::traits::{RerankScore, Reranker};

use crate::device::select_device;
use crate::embedder::env_flag;
use crate::tokenize::normalized_tokens;
use crate::weights::{load_weights, resolve_model_dir};

const CROSS_ENCODER_MAX_LEN: usize = 512;

/// Sigmoid normalization: maps raw logits to the 0-1 range.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn sort_best_first(scores: &mut [RerankScore]) {
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
}

#[derive(Deserialize)]
struct HeadConfig {
    hidden_size: usize,
}

pub struct CrossEncoderReranker {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

impl CrossEncoderReranker {
    pub fn new() -> Result<Self> { Self::from_dir(None) }

    pub fn from_dir(explicit: Option<&Path>) -> Result<Self> {
        let model_dir = resolve_model_dir(
            explicit,
            &["APP_RERANKER_DIR"],
            &["../models/ms-marco-MiniLM-L-12-v2", "models/ms-marco-MiniLM-L-12-v2"],
        )?;
        let device = select_device();
        info!("Loading cross-encoder from {}", model_dir.display());
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let raw_config = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let head: HeadConfig = serde_json::from_str(&raw_config)?;
        let vb = VarBuilder::from_tensors(load_weights(&model_dir, &device)?, DType::F32, &device);
        let bert = BertModel::load(vb.pp("bert"), &config)?;
        let pooler = candle_nn::linear(head.hidden_size, head.hidden_size, vb.pp("bert.pooler.dense"))?;
        let classifier = candle_nn::linear(head.hidden_size, 1, vb.pp("classifier"))?;
        info!("Cross-encoder loaded");
        Ok(Self { bert, pooler, classifier, tokenizer, device })
    }

    fn score_pair(&self, query: &str, passage: &str) -> Result<f32> {
        let enc = self.tokenizer.encode((query, passage), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let len = enc.get_ids().len().min(CROSS_ENCODER_MAX_LEN);
        let input_ids = Tensor::new(&enc.get_ids()[..len], &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(&enc.get_type_ids()[..len], &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(&enc.get_attention_mask()[..len], &self.device)?.unsqueeze(0)?;
        let hidden = self.bert.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?.flatten_all()?.to_vec1::<f32>()?;
        let logit = logits.first().copied().ok_or_else(|| anyhow!("cross-encoder produced no logit"))?;
        Ok(sigmoid(logit))
    }
}

impl Reranker for CrossEncoderReranker {
    fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<RerankScore>> {
        let mut scores = passages
            .iter()
            .enumerate()
            .map(|(index, p)| Ok(RerankScore { index, score: self.score_pair(query, p)? }))
            .collect::<Result<Vec<_>>>()?;
        sort_best_first(&mut scores);
        debug!("Reranked {} passages", scores.len());
        Ok(scores)
    }
}

/// Deterministic stand-in: share of distinct normalized query words that
/// occur in the passage.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenOverlapReranker;

impl TokenOverlapReranker {
    pub fn score(query: &str, passage: &str) -> f32 {
        let query_terms: HashSet<String> = normalized_tokens(query).collect();
        if query_terms.is_empty() { return 0.0; }
        let passage_terms: HashSet<String> = normalized_tokens(passage).collect();
        let hits = query_terms.iter().filter(|t| passage_terms.contains(*t)).count();
        hits as f32 / query_terms.len() as f32
    }
}

impl Reranker for TokenOverlapReranker {
    fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<RerankScore>> {
        let mut scores: Vec<RerankScore> = passages
            .iter()
            .enumerate()
            .map(|(index, p)| RerankScore { index, score: Self::score(query, p) })
            .collect();
        sort_best_first(&mut scores);
        Ok(scores)
    }
}

pub fn get_default_reranker() -> Result<Box<dyn Reranker>> { reranker_from_dir(None) }

/// `APP_USE_FAKE_RERANKER=1` selects [`TokenOverlapReranker`].
pub fn reranker_from_dir(explicit: Option<&Path>) -> Result<Box<dyn Reranker>> {
    if env_flag("APP_USE_FAKE_RERANKER") { info!("Using TokenOverlapReranker"); return Ok(Box::new(TokenOverlapReranker)); }
    Ok(Box::new(CrossEncoderReranker::from_dir(explicit)?))
}
