//! Reciprocal Rank Fusion.
//!
//! RRF score = Σ 1/(k + rank) over every list a candidate appears in, with
//! 0-based ranks. Works on positions only, so the vector and BM25 score
//! scales never need calibrating against each other.

use std::collections::HashMap;

use ragdb_core::types::{Candidate, ChunkId};

pub const RRF_K: f32 = 60.0;

/// Fuse any number of best-first lists. A candidate's payload comes from the
/// first list it was seen in; ties keep first-encounter order.
pub fn fuse_ranked_lists(lists: &[&[Candidate]], k: f32) -> Vec<Candidate> {
    let mut fused: Vec<Candidate> = Vec::new();
    let mut slot_of: HashMap<ChunkId, usize> = HashMap::new();

    for list in lists {
        for (rank, candidate) in list.iter().enumerate() {
            let contribution = 1.0 / (rank as f32 + k);
            match slot_of.get(&candidate.id) {
                Some(&slot) => {
                    let entry = &mut fused[slot];
                    entry.rrf_score = Some(entry.rrf_score.unwrap_or(0.0) + contribution);
                }
                None => {
                    slot_of.insert(candidate.id.clone(), fused.len());
                    let mut entry = candidate.clone();
                    entry.rrf_score = Some(contribution);
                    fused.push(entry);
                }
            }
        }
    }

    // sort_by is stable: equal scores stay in encounter order
    fused.sort_by(|a, b| b.rrf_score.unwrap_or(0.0).total_cmp(&a.rrf_score.unwrap_or(0.0)));
    fused
}

pub fn reciprocal_rank_fusion(vector: &[Candidate], lexical: &[Candidate], k: f32) -> Vec<Candidate> {
    fuse_ranked_lists(&[vector, lexical], k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_core::types::ChunkMetadata;

    fn cand(id: &str, text: &str, score: f32) -> Candidate {
        Candidate::new(id, text, ChunkMetadata::default(), score)
    }

    fn rrf(id: &str, fused: &[Candidate]) -> f32 {
        fused.iter().find(|c| c.id == id).and_then(|c| c.rrf_score).unwrap_or(0.0)
    }

    #[test]
    fn scores_are_sums_of_reciprocal_ranks() {
        let vector = vec![cand("a", "A", 0.9), cand("b", "B", 0.8), cand("c", "C", 0.7)];
        let lexical = vec![cand("c", "C", 12.0), cand("d", "D", 4.0)];
        let fused = reciprocal_rank_fusion(&vector, &lexical, RRF_K);

        assert_eq!(fused.len(), 4);
        assert!((rrf("a", &fused) - 1.0 / 60.0).abs() < 1e-7);
        assert!((rrf("b", &fused) - 1.0 / 61.0).abs() < 1e-7);
        assert!((rrf("c", &fused) - (1.0 / 62.0 + 1.0 / 60.0)).abs() < 1e-7);
        assert!((rrf("d", &fused) - 1.0 / 61.0).abs() < 1e-7);
        assert!(fused.windows(2).all(|w| w[0].rrf_score >= w[1].rrf_score));
        assert_eq!(fused[0].id, "c");
    }

    #[test]
    fn presence_in_both_lists_beats_best_single_rank() {
        for r1 in 0..10 {
            for r2 in 0..10 {
                let mut vector: Vec<Candidate> = (0..10).map(|i| cand(&format!("v{i}"), "", 0.0)).collect();
                let mut lexical: Vec<Candidate> = (0..10).map(|i| cand(&format!("l{i}"), "", 0.0)).collect();
                vector[r1] = cand("x", "", 0.0);
                lexical[r2] = cand("x", "", 0.0);
                let joined = rrf("x", &reciprocal_rank_fusion(&vector, &lexical, RRF_K));
                let single = 1.0 / (r1.min(r2) as f32 + RRF_K);
                assert!(joined > single, "r1={r1} r2={r2}");
            }
        }
    }

    #[test]
    fn payload_comes_from_first_encounter() {
        let vector = vec![cand("a", "from vector", 0.9)];
        let lexical = vec![cand("a", "from lexical", 3.0)];
        let fused = reciprocal_rank_fusion(&vector, &lexical, RRF_K);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].text, "from vector");
        assert_eq!(fused[0].score, 0.9);
    }

    #[test]
    fn ties_keep_encounter_order() {
        let vector = vec![cand("a", "", 0.0), cand("b", "", 0.0)];
        let lexical = vec![cand("c", "", 0.0), cand("d", "", 0.0)];
        let ids: Vec<String> = reciprocal_rank_fusion(&vector, &lexical, RRF_K).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn one_empty_side_preserves_the_other_order() {
        let lexical = vec![cand("x", "", 5.0), cand("y", "", 2.0)];
        let fused = reciprocal_rank_fusion(&[], &lexical, RRF_K);
        let ids: Vec<&str> = fused.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert!(reciprocal_rank_fusion(&[], &[], RRF_K).is_empty());
    }
}
