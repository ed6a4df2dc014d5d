//! Per-query min-max rescaling of reranker scores.

use ragdb_core::types::SearchResult;

/// Rescale `confidence` across exactly `results`: the best score maps to 1.0
/// and the worst to 0.0. When every score is equal, all confidences are 1.0.
pub fn normalize(results: &mut [SearchResult]) {
    if results.is_empty() { return; }
    let (min, max) = results
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), r| (lo.min(r.score), hi.max(r.score)));
    let span = max - min;
    for r in results.iter_mut() {
        r.confidence = if span > 0.0 { (r.score - min) / span } else { 1.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_core::types::{Candidate, ChunkMetadata};

    fn results(scores: &[f32]) -> Vec<SearchResult> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &s)| SearchResult::from_candidate(Candidate::new(i.to_string(), "", ChunkMetadata::default(), 0.0), s))
            .collect()
    }

    #[test]
    fn equal_scores_all_get_full_confidence() {
        let mut rs = results(&[0.4; 5]);
        normalize(&mut rs);
        assert!(rs.iter().all(|r| r.confidence == 1.0));
    }

    #[test]
    fn extremes_map_to_one_and_zero() {
        let mut rs = results(&[0.9, 0.7, 0.35, 0.2, 0.1]);
        normalize(&mut rs);
        assert_eq!(rs[0].confidence, 1.0);
        assert_eq!(rs[4].confidence, 0.0);
        assert!((rs[2].confidence - 0.3125).abs() < 1e-6);
        assert!(rs.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        assert_eq!(rs[1].score, 0.7, "raw score is untouched");
    }

    #[test]
    fn tiny_distinct_scores_still_span_full_range() {
        let mut rs = results(&[5e-8, 4e-8, 3e-8, 2e-8, 1e-8]);
        normalize(&mut rs);
        assert_eq!(rs[0].confidence, 1.0);
        assert_eq!(rs[4].confidence, 0.0);
        assert!(rs[2].confidence > 0.0 && rs[2].confidence < 1.0);
    }

    #[test]
    fn single_result_and_empty_slice() {
        let mut one = results(&[0.02]);
        normalize(&mut one);
        assert_eq!(one[0].confidence, 1.0);
        normalize(&mut []);
    }
}
