use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ragdb_core::config::Config;
use ragdb_core::types::ChunkInput;
use ragdb_hybrid::{render_context, Answerability, ConfidenceGate, HybridSearcher, RetrievalContext, NO_CONTEXT};

const USAGE: &str = "Usage: ragdb <ingest <chunks.jsonl> | query [--json] \"<question>\">";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

/// One JSON object per line: `{ "id"?, "text", "metadata" }`.
fn read_chunks(path: &Path) -> anyhow::Result<Vec<ChunkInput>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut chunks = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let chunk: ChunkInput = serde_json::from_str(&line).with_context(|| format!("{}:{}", path.display(), n + 1))?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

fn ingest(searcher: &HybridSearcher, path: &Path) -> anyhow::Result<()> {
    let chunks = read_chunks(path)?;
    println!("Ingesting {} chunks from {}", chunks.len(), path.display());
    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")?
            .progress_chars("#>-"),
    );
    let stored = searcher.ingest_with_progress(chunks, |n| pb.inc(n as u64))?;
    pb.finish_and_clear();
    println!("✅ Ingest complete ({} chunks, keyword index {} chunks)", stored, searcher.context().lexical().len());
    Ok(())
}

fn query(searcher: &HybridSearcher, gate: ConfidenceGate, question: &str, as_json: bool) -> anyhow::Result<()> {
    searcher.seed_lexical_from_store()?;
    let report = searcher.search(question);
    let verdict = gate.assess(&report.results);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "report": report, "answerability": verdict }))?);
        return Ok(());
    }

    println!("🔍 {} results for \"{}\" ({:?})", report.results.len(), question, report.status);
    for (i, r) in report.results.iter().enumerate() {
        println!("\n  {}. confidence={:.0}%  score={:.4}  source={}  chunk={}", i + 1, r.confidence * 100.0, r.score, r.source, r.chunk_id);
        if !r.metadata.image_paths.is_empty() { println!("     🖼  {}", r.metadata.image_paths.join(", ")); }
        println!("     📝 {}", r.document);
    }
    match verdict {
        Answerability::Answerable => {
            let context = render_context(&report.results, 3).unwrap_or_else(|| NO_CONTEXT.to_string());
            println!("\n--- context ---\n{context}");
        }
        Answerability::LowConfidence { top } => {
            println!("\n⚠️  Low confidence ({:.0}% < {:.0}%): not enough relevant information to answer.", top * 100.0, gate.threshold() * 100.0);
        }
        Answerability::NoMatches => println!("\n{NO_CONTEXT}"),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let (cmd, args) = parse_args();
    let gate = ConfidenceGate::from_settings(&config.retrieval()?);
    let ctx = Arc::new(RetrievalContext::from_config(&config)?);
    let searcher = HybridSearcher::new(ctx);
    info!("Storage: {:?}", config.storage()?);

    match cmd.as_str() {
        "ingest" => {
            let Some(path) = args.first().map(PathBuf::from) else { eprintln!("{USAGE}"); std::process::exit(1) };
            ingest(&searcher, &path)?;
        }
        "query" => {
            let as_json = args.iter().any(|a| a == "--json");
            let question = args.iter().filter(|a| !a.starts_with("--")).cloned().collect::<Vec<_>>().join(" ");
            if question.trim().is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
            query(&searcher, gate, &question, as_json)?;
        }
        _ => { eprintln!("Unknown command: {}\n{USAGE}", cmd); std::process::exit(1); }
    }
    Ok(())
}
