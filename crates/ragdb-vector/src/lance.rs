//! LanceDB-backed persistent store.
//!
//! One table holds `id`, `text`, `metadata` (JSON) and a fixed-size `vector`
//! column. The async LanceDB client runs on a runtime owned by the store so
//! callers see the synchronous [`VectorStore`] trait.

use arrow_array::{FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, DistanceType, Table};
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use ragdb_core::error::StoreError;
use ragdb_core::traits::VectorStore;
use ragdb_core::types::{Candidate, Chunk, ChunkMetadata, Corpus};

pub fn build_arrow_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32), true),
    ]))
}

pub struct LanceVectorStore {
    runtime: Runtime,
    db: Connection,
    table_name: String,
    dim: usize,
    markers: Vec<String>,
}

impl LanceVectorStore {
    pub fn open(path: &Path, table_name: &str, dim: usize, markers: Vec<String>) -> Result<Self, StoreError> {
        let runtime = Runtime::new().map_err(|e| StoreError::Backend(format!("failed to start runtime: {e}")))?;
        let uri = path.to_string_lossy().to_string();
        let db = runtime
            .block_on(async { connect(&uri).execute().await })
            .map_err(|e| StoreError::classify(e.to_string(), &markers))?;
        info!("Opened LanceDB at {} (table '{}')", uri, table_name);
        Ok(Self { runtime, db, table_name: table_name.to_string(), dim, markers })
    }

    pub fn table_name(&self) -> &str { &self.table_name }

    fn fault(&self, err: impl Display) -> StoreError {
        StoreError::classify(err.to_string(), &self.markers)
    }

    async fn open_table(&self) -> Result<Option<Table>, StoreError> {
        let names = self.db.table_names().execute().await.map_err(|e| self.fault(e))?;
        if !names.contains(&self.table_name) { return Ok(None); }
        let table = self.db.open_table(&self.table_name).execute().await.map_err(|e| self.fault(e))?;
        Ok(Some(table))
    }

    fn chunks_to_record_batch(&self, chunks: &[Chunk]) -> Result<RecordBatch, StoreError> {
        let mut ids = Vec::with_capacity(chunks.len());
        let mut texts = Vec::with_capacity(chunks.len());
        let mut metadatas = Vec::with_capacity(chunks.len());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.embedding.len() != self.dim {
                return Err(StoreError::Backend(format!(
                    "chunk {} has dimension {}, table expects {}",
                    chunk.id,
                    chunk.embedding.len(),
                    self.dim
                )));
            }
            ids.push(chunk.id.clone());
            texts.push(chunk.text.clone());
            metadatas.push(serde_json::to_string(&chunk.metadata).map_err(|e| StoreError::Backend(e.to_string()))?);
            vectors.push(Some(chunk.embedding.iter().map(|&x| Some(x)).collect()));
        }
        RecordBatch::try_new(
            build_arrow_schema(self.dim),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(metadatas)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
                    vectors.into_iter(),
                    self.dim as i32,
                )),
            ],
        )
        .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| StoreError::Backend(format!("missing {name} column")))
}

fn parse_metadata(id: &str, raw: &str) -> ChunkMetadata {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Unreadable metadata for {}: {}", id, e);
        ChunkMetadata::default()
    })
}

impl VectorStore for LanceVectorStore {
    fn query_nearest(&self, embedding: &[f32], k: usize) -> Result<Vec<Candidate>, StoreError> {
        if k == 0 { return Ok(Vec::new()); }
        let batches: Vec<RecordBatch> = self.runtime.block_on(async {
            let Some(table) = self.open_table().await? else { return Ok(Vec::new()) };
            let stream = table
                .vector_search(embedding.to_vec())
                .map_err(|e| self.fault(e))?
                .distance_type(DistanceType::Cosine)
                .limit(k)
                .execute()
                .await
                .map_err(|e| self.fault(e))?;
            stream.try_collect::<Vec<_>>().await.map_err(|e| self.fault(e))
        })?;

        let mut hits = Vec::new();
        for batch in &batches {
            let ids = string_column(batch, "id")?;
            let texts = string_column(batch, "text")?;
            let metas = string_column(batch, "metadata")?;
            let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
            for i in 0..batch.num_rows() {
                let score = distances.map_or(0.0, |d| 1.0 - d.value(i));
                let id = ids.value(i);
                hits.push(Candidate::new(id, texts.value(i), parse_metadata(id, metas.value(i)), score));
            }
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        debug!("LanceDB vector search: {} results", hits.len());
        Ok(hits)
    }

    fn upsert(&self, chunks: &[Chunk]) -> Result<(), StoreError> {
        if chunks.is_empty() { return Ok(()); }
        let record_batch = self.chunks_to_record_batch(chunks)?;
        let schema = record_batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
        self.runtime.block_on(async {
            match self.open_table().await? {
                Some(table) => {
                    let mut mi = table.merge_insert(&["id"]);
                    mi.when_matched_update_all(None).when_not_matched_insert_all();
                    mi.execute(reader).await.map_err(|e| self.fault(e))?;
                }
                None => {
                    self.db.create_table(&self.table_name, reader).execute().await.map_err(|e| self.fault(e))?;
                }
            }
            Ok::<(), StoreError>(())
        })?;
        debug!("Upserted {} chunks into '{}'", chunks.len(), self.table_name);
        Ok(())
    }

    fn get_all(&self) -> Result<Corpus, StoreError> {
        let batches: Vec<RecordBatch> = self.runtime.block_on(async {
            let Some(table) = self.open_table().await? else { return Ok(Vec::new()) };
            let stream = table
                .query()
                .select(Select::columns(&["id", "text", "metadata"]))
                .execute()
                .await
                .map_err(|e| self.fault(e))?;
            stream.try_collect::<Vec<_>>().await.map_err(|e| self.fault(e))
        })?;

        let (mut texts, mut ids, mut metadatas) = (Vec::new(), Vec::new(), Vec::new());
        for batch in &batches {
            let id_col = string_column(batch, "id")?;
            let text_col = string_column(batch, "text")?;
            let meta_col = string_column(batch, "metadata")?;
            for i in 0..batch.num_rows() {
                let id = id_col.value(i);
                ids.push(id.to_string());
                texts.push(text_col.value(i).to_string());
                metadatas.push(parse_metadata(id, meta_col.value(i)));
            }
        }
        Corpus::new(texts, ids, metadatas).map_err(|e| StoreError::Backend(e.to_string()))
    }
}
