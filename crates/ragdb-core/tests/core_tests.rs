use figment::providers::{Format, Toml};
use figment::{Figment, Jail};

use ragdb_core::config::{expand_path, resolve_with_base, Config, RetrievalSettings};
use ragdb_core::types::{Chunk, ChunkInput, ChunkMetadata, Corpus, SearchResult, Candidate};

#[test]
fn corpus_rejects_mismatched_lengths() {
    let err = Corpus::new(
        vec!["a".into(), "b".into()],
        vec!["1".into()],
        vec![ChunkMetadata::default(), ChunkMetadata::default()],
    );
    assert!(err.is_err(), "ids shorter than texts must be rejected");
}

#[test]
fn corpus_from_texts_generates_positional_ids() {
    let corpus = Corpus::from_texts(vec!["alpha".into(), "bravo".into()]);
    assert_eq!(corpus.ids(), &["0".to_string(), "1".to_string()]);
    assert_eq!(corpus.metadatas().len(), 2);
    let c = corpus.candidate(1, 2.5).expect("candidate");
    assert_eq!(c.text, "bravo");
    assert!(corpus.candidate(2, 1.0).is_none());
}

#[test]
fn metadata_accepts_json_encoded_image_paths() {
    let meta: ChunkMetadata = serde_json::from_str(
        r#"{"source":"atlas.pdf","chunk_id":3,"image_paths":"[\"img/p1.png\",\"img/p2.png\"]","chunk_size":480}"#,
    )
    .unwrap();
    assert_eq!(meta.image_paths, vec!["img/p1.png", "img/p2.png"]);
    assert_eq!(meta.chunk_id, 3);
    assert_eq!(meta.extra.get("chunk_size"), Some(&serde_json::json!(480)));

    let broken: ChunkMetadata = serde_json::from_str(r#"{"source":"a","image_paths":"not json"}"#).unwrap();
    assert!(broken.image_paths.is_empty());

    let listed: ChunkMetadata = serde_json::from_str(r#"{"image_paths":["x.png"]}"#).unwrap();
    assert_eq!(listed.image_paths, vec!["x.png"]);
}

#[test]
fn chunk_input_derives_id_from_source_and_ordinal() {
    let input: ChunkInput = serde_json::from_str(r#"{"text":"hello","metadata":{"source":"guide.pdf","chunk_id":7}}"#).unwrap();
    assert_eq!(input.resolved_id(), "guide.pdf_chunk_7");
    assert_eq!(Chunk::id_for("guide.pdf", 7), "guide.pdf_chunk_7");
}

#[test]
fn search_result_falls_back_to_unknown_source() {
    let candidate = Candidate::new("x", "text", ChunkMetadata::default(), 0.1);
    let result = SearchResult::from_candidate(candidate, 0.8);
    assert_eq!(result.source, "Unknown");
    assert_eq!(result.confidence, 0.8);
    assert_eq!(result.text(), "text");
}

#[test]
fn retrieval_defaults_when_section_missing() {
    let config = Config::from_figment(Figment::new()).expect("config");
    assert_eq!(config.retrieval().unwrap(), RetrievalSettings::default());
    assert_eq!(config.storage().unwrap().table, "rag_docs");
}

#[test]
fn config_files_and_env_are_merged() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [retrieval]
            final_top_n = 3
            [retrieval.retry]
            base_delay_ms = 10
            [storage]
            ephemeral = true
            "#,
        )?;
        jail.set_env("RUST_ENV", "test");
        jail.set_env("APP_RETRIEVAL__RERANK_POOL", "8");
        let config = Config::load().expect("load");
        let retrieval = config.retrieval().expect("retrieval");
        assert_eq!(retrieval.final_top_n, 3);
        assert_eq!(retrieval.rerank_pool, 8);
        assert_eq!(retrieval.retry.base_delay_ms, 10);
        assert_eq!(retrieval.retry.max_attempts, 3);
        assert!(config.storage().expect("storage").ephemeral);
        Ok(())
    });
}

#[test]
fn invalid_budgets_are_rejected() {
    let figment = Figment::new().merge(Toml::string("[retrieval]\nfinal_top_n = 20\nrerank_pool = 10"));
    assert!(Config::from_figment(figment).is_err());
}

#[test]
fn path_helpers_expand_and_resolve() {
    std::env::set_var("RAGDB_TEST_ROOT", "/srv/rag");
    assert_eq!(expand_path("$RAGDB_TEST_ROOT/db"), std::path::PathBuf::from("/srv/rag/db"));
    let base = std::path::Path::new("/base");
    assert_eq!(resolve_with_base(base, "rel/dir"), base.join("rel/dir"));
    assert_eq!(resolve_with_base(base, "/abs"), std::path::PathBuf::from("/abs"));
}
