use anyhow::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::BooleanQuery;
use tantivy::schema::Value;
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use ragdb_core::types::{Candidate, Corpus};

use crate::tantivy_utils::{build_schema, register_tokenizer, LexicalFields};

struct Bm25Engine {
	index: Index,
	reader: IndexReader,
	fields: LexicalFields,
}

impl Bm25Engine {
	fn build(corpus: &Corpus) -> Result<Self> {
		let (schema, fields) = build_schema();
		let index = Index::create_in_ram(schema);
		register_tokenizer(&index);
		let mut writer: IndexWriter = index.writer_with_num_threads(1, 50_000_000)?;
		for (pos, text) in corpus.texts().iter().enumerate() {
			writer.add_document(doc!(
				fields.position => pos as u64,
				fields.text => text.as_str(),
			))?;
		}
		writer.commit()?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self { index, reader, fields })
	}

	/// Query tokens produced by the same analyzer the corpus was indexed with.
	fn query_terms(&self, query: &str) -> Result<Vec<Term>> {
		let mut analyzer = self.index.tokenizer_for_field(self.fields.text)?;
		let mut stream = analyzer.token_stream(query);
		let mut terms = Vec::new();
		stream.process(&mut |token| terms.push(Term::from_field_text(self.fields.text, &token.text)));
		Ok(terms)
	}
}

/// Immutable view of the keyword index: the corpus and the scoring structure
/// built over it. Never mutated after construction.
pub struct LexicalSnapshot {
	corpus: Corpus,
	engine: Option<Bm25Engine>,
}

impl LexicalSnapshot {
	/// Disabled snapshot: every query answers with no candidates.
	pub fn empty() -> Self { Self { corpus: Corpus::default(), engine: None } }

	pub fn build(corpus: Corpus) -> Result<Self> {
		if corpus.is_empty() {
			info!("No chunks provided for BM25 index; keyword search disabled");
			return Ok(Self::empty());
		}
		info!("Building BM25 keyword index for {} chunks", corpus.len());
		let engine = Bm25Engine::build(&corpus)?;
		Ok(Self { corpus, engine: Some(engine) })
	}

	pub fn is_built(&self) -> bool { self.engine.is_some() }
	pub fn corpus(&self) -> &Corpus { &self.corpus }
	pub fn len(&self) -> usize { self.corpus.len() }
	pub fn is_empty(&self) -> bool { self.corpus.is_empty() }

	/// Top `k` chunks by BM25 score, best first. Chunks scoring zero or below
	/// share no term with the query and are never returned.
	pub fn query(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
		let Some(engine) = &self.engine else { return Ok(Vec::new()) };
		if k == 0 { return Ok(Vec::new()); }
		let terms = engine.query_terms(query)?;
		if terms.is_empty() { return Ok(Vec::new()); }

		let searcher = engine.reader.searcher();
		let top_docs = searcher.search(&BooleanQuery::new_multiterms_query(terms), &TopDocs::with_limit(k))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			if score <= 0.0 { continue; }
			let doc: TantivyDocument = searcher.doc(addr)?;
			let Some(pos) = doc.get_first(engine.fields.position).and_then(|v| v.as_u64()) else { continue };
			if let Some(candidate) = self.corpus.candidate(pos as usize, score) { hits.push(candidate); }
		}
		debug!("BM25 search for '{}': {} results", query, hits.len());
		Ok(hits)
	}
}

/// Process-wide keyword index. Readers clone the current snapshot pointer and
/// query it lock-free; `rebuild` builds a new snapshot off to the side and
/// publishes it with one pointer swap, so a reader sees either the old or the
/// new corpus in full.
pub struct LexicalIndex {
	current: RwLock<Arc<LexicalSnapshot>>,
}

impl Default for LexicalIndex {
	fn default() -> Self { Self { current: RwLock::new(Arc::new(LexicalSnapshot::empty())) } }
}

impl LexicalIndex {
	pub fn new() -> Self { Self::default() }

	pub fn build(corpus: Corpus) -> Result<Self> {
		Ok(Self { current: RwLock::new(Arc::new(LexicalSnapshot::build(corpus)?)) })
	}

	/// Replace the whole index. On error the previous snapshot stays published.
	pub fn rebuild(&self, corpus: Corpus) -> Result<()> {
		let fresh = Arc::new(LexicalSnapshot::build(corpus)?);
		let previous = std::mem::replace(&mut *self.current.write(), fresh);
		debug!("Swapped BM25 snapshot ({} -> {} chunks)", previous.len(), self.len());
		Ok(())
	}

	pub fn snapshot(&self) -> Arc<LexicalSnapshot> { Arc::clone(&self.current.read()) }

	pub fn query(&self, query: &str, k: usize) -> Result<Vec<Candidate>> { self.snapshot().query(query, k) }

	pub fn is_built(&self) -> bool { self.current.read().is_built() }
	pub fn len(&self) -> usize { self.current.read().len() }
	pub fn is_empty(&self) -> bool { self.len() == 0 }
}
