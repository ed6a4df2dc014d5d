use ragdb_core::config::StorageSettings;
use ragdb_core::error::{StoreError, DEFAULT_TRANSIENT_MARKERS};
use ragdb_core::traits::VectorStore;
use ragdb_core::types::{Chunk, ChunkMetadata};
use ragdb_vector::{open_store, LanceVectorStore};
use tempfile::TempDir;

const DIM: usize = 4;

fn markers() -> Vec<String> { DEFAULT_TRANSIENT_MARKERS.iter().map(|m| m.to_string()).collect() }

fn chunk(source: &str, ordinal: usize, text: &str, embedding: [f32; DIM]) -> Chunk {
    let mut metadata = ChunkMetadata::new(source, ordinal);
    metadata.image_paths = vec![format!("img/{source}_{ordinal}.png")];
    Chunk { id: Chunk::id_for(source, ordinal), text: text.into(), embedding: embedding.to_vec(), metadata }
}

fn open(tmp: &TempDir) -> LanceVectorStore {
    LanceVectorStore::open(tmp.path(), "rag_docs", DIM, markers()).expect("open store")
}

#[test]
fn missing_table_reads_as_empty() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp);
    assert!(store.query_nearest(&[1.0, 0.0, 0.0, 0.0], 5).unwrap().is_empty());
    assert!(store.get_all().unwrap().is_empty());
}

#[test]
fn upsert_then_query_returns_nearest_first() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp);
    store
        .upsert(&[
            chunk("atlas.pdf", 0, "The capital of France is Paris.", [1.0, 0.0, 0.0, 0.0]),
            chunk("atlas.pdf", 1, "Rivers of Europe.", [0.0, 1.0, 0.0, 0.0]),
            chunk("notes.txt", 0, "Unrelated notes.", [0.0, 0.0, 1.0, 0.0]),
        ])
        .unwrap();

    let hits = store.query_nearest(&[0.9, 0.1, 0.0, 0.0], 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "atlas.pdf_chunk_0");
    assert!(hits[0].score >= hits[1].score);
    assert_eq!(hits[0].metadata.source, "atlas.pdf");
    assert_eq!(hits[0].metadata.image_paths, vec!["img/atlas.pdf_0.png"]);
}

#[test]
fn upsert_is_keyed_by_id() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp);
    store.upsert(&[chunk("a.txt", 0, "first", [1.0, 0.0, 0.0, 0.0])]).unwrap();
    store.upsert(&[chunk("a.txt", 0, "second", [1.0, 0.0, 0.0, 0.0]), chunk("a.txt", 1, "other", [0.0, 1.0, 0.0, 0.0])]).unwrap();

    let corpus = store.get_all().unwrap();
    assert_eq!(corpus.len(), 2);
    let pos = corpus.ids().iter().position(|id| id == "a.txt_chunk_0").expect("chunk present");
    assert_eq!(corpus.texts()[pos], "second");
    assert_eq!(corpus.metadatas()[pos].chunk_id, 0);
}

#[test]
fn data_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    open(&tmp).upsert(&[chunk("a.txt", 0, "persisted", [0.0, 0.0, 0.0, 1.0])]).unwrap();
    let reopened = open(&tmp);
    assert_eq!(reopened.get_all().unwrap().texts(), &["persisted".to_string()]);
}

#[test]
fn wrong_dimension_is_a_backend_error() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp);
    let mut bad = chunk("a.txt", 0, "x", [1.0, 0.0, 0.0, 0.0]);
    bad.embedding.push(0.5);
    assert!(matches!(store.upsert(&[bad]), Err(StoreError::Backend(_))));
}

#[test]
fn open_store_honours_ephemeral_flag() {
    let settings = StorageSettings { ephemeral: true, ..StorageSettings::default() };
    let store = open_store(&settings, DIM, &markers()).unwrap();
    store.upsert(&[chunk("m.txt", 0, "in memory", [1.0, 0.0, 0.0, 0.0])]).unwrap();
    assert_eq!(store.get_all().unwrap().len(), 1);
}
