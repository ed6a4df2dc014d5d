use std::sync::Arc;
use std::thread;

use ragdb_core::types::{ChunkMetadata, Corpus};
use ragdb_text::{LexicalIndex, LexicalSnapshot};

fn corpus(texts: &[&str]) -> Corpus {
    let ids = (0..texts.len()).map(|i| format!("doc.pdf_chunk_{i}")).collect();
    let metas = (0..texts.len()).map(|i| ChunkMetadata::new("doc.pdf", i)).collect();
    Corpus::new(texts.iter().map(|t| t.to_string()).collect(), ids, metas).expect("corpus")
}

#[test]
fn query_ranks_by_keyword_overlap() {
    let index = LexicalIndex::build(corpus(&[
        "Paris is the capital of France",
        "Rust guarantees memory safety without a garbage collector.",
        "Paris hosts the Louvre museum and the Eiffel tower in Paris.",
    ]))
    .expect("build");

    let hits = index.query("louvre paris", 10).expect("query");
    assert_eq!(hits.len(), 2, "only chunks sharing a term are returned");
    assert_eq!(hits[0].id, "doc.pdf_chunk_2");
    assert!(hits[0].score >= hits[1].score);
    assert_eq!(hits[0].metadata.chunk_id, 2);
}

#[test]
fn results_never_include_non_positive_scores() {
    let index = LexicalIndex::build(corpus(&["alpha bravo", "charlie delta", "echo foxtrot"])).expect("build");
    for q in ["alpha", "delta echo", "zulu", "ALPHA   bravo"] {
        for hit in index.query(q, 10).expect("query") {
            assert!(hit.score > 0.0, "q='{q}' returned score {}", hit.score);
        }
    }
    assert!(index.query("zulu yankee", 10).expect("query").is_empty());
}

#[test]
fn tokenization_is_lowercase_whitespace_only() {
    let index = LexicalIndex::build(corpus(&["Running Dogs", "run dog"])).expect("build");
    let hits = index.query("RUNNING", 10).expect("query");
    assert_eq!(hits.len(), 1, "no stemming: 'running' must not match 'run'");
    assert_eq!(hits[0].text, "Running Dogs");

    // punctuation stays attached to the token
    let index = LexicalIndex::build(corpus(&["The capital of France is Paris."])).expect("build");
    assert!(index.query("paris", 5).expect("query").is_empty());
    assert_eq!(index.query("paris.", 5).expect("query").len(), 1);
}

#[test]
fn k_caps_the_result_count() {
    let index = LexicalIndex::build(corpus(&["fire a", "fire b", "fire c", "fire d"])).expect("build");
    assert_eq!(index.query("fire", 2).expect("query").len(), 2);
    assert!(index.query("fire", 0).expect("query").is_empty());
}

#[test]
fn empty_corpus_yields_disabled_index() {
    let index = LexicalIndex::new();
    assert!(!index.is_built());
    assert!(index.query("anything", 10).expect("query").is_empty());

    index.rebuild(Corpus::default()).expect("rebuild on empty corpus");
    assert!(!index.is_built());
    assert!(index.query("anything", 10).expect("query").is_empty());
    assert!(LexicalSnapshot::empty().query("x", 3).expect("query").is_empty());
}

#[test]
fn rebuild_swaps_whole_snapshot() {
    let index = LexicalIndex::build(corpus(&["old solar panel notes"])).expect("build");
    let held = index.snapshot();

    index.rebuild(corpus(&["new wind turbine notes", "battery storage"])).expect("rebuild");

    // A reader holding the previous snapshot keeps a complete, consistent view.
    assert_eq!(held.len(), 1);
    assert_eq!(held.query("solar", 5).expect("query").len(), 1);

    assert_eq!(index.len(), 2);
    assert!(index.query("solar", 5).expect("query").is_empty());
    assert_eq!(index.query("turbine", 5).expect("query").len(), 1);
}

#[test]
fn concurrent_readers_observe_old_or_new_corpus() {
    let index = Arc::new(LexicalIndex::build(corpus(&["alpha one", "alpha two"])).expect("build"));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for _ in 0..50 {
                    let snap = index.snapshot();
                    let hits = snap.query("alpha", 10).expect("query");
                    assert!(hits.len() == 2 || hits.len() == 3, "partial snapshot observed: {}", hits.len());
                    assert_eq!(snap.corpus().ids().len(), snap.corpus().texts().len());
                }
            })
        })
        .collect();
    for _ in 0..5 {
        index.rebuild(corpus(&["alpha one", "alpha two", "alpha three"])).expect("rebuild");
        index.rebuild(corpus(&["alpha one", "alpha two"])).expect("rebuild");
    }
    for r in readers { r.join().expect("reader thread"); }
}
