//! Answerability check applied before a generator is allowed to answer.

use serde::Serialize;

use ragdb_core::config::RetrievalSettings;
use ragdb_core::types::SearchResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Answerability {
    Answerable,
    /// The best result is below the threshold; refuse to synthesize.
    LowConfidence { top: f32 },
    NoMatches,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGate {
    threshold: f32,
}

impl Default for ConfidenceGate {
    fn default() -> Self { Self { threshold: 0.25 } }
}

impl ConfidenceGate {
    pub fn new(threshold: f32) -> Self { Self { threshold: threshold.clamp(0.0, 1.0) } }

    pub fn from_settings(settings: &RetrievalSettings) -> Self { Self::new(settings.low_confidence_threshold) }

    pub fn threshold(&self) -> f32 { self.threshold }

    pub fn assess(&self, results: &[SearchResult]) -> Answerability {
        match results.first() {
            None => Answerability::NoMatches,
            Some(top) if top.confidence < self.threshold => Answerability::LowConfidence { top: top.confidence },
            Some(_) => Answerability::Answerable,
        }
    }
}
