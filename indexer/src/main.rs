mod corpus;

use corpus::CorpusReader;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use pagesearch_core::persist::{index_size_bytes, list_partials, load_final, load_partial, save_final, save_partial, IndexPaths};
use pagesearch_core::{build_partials_into, merge_partials, BuilderConfig, PartialIndex, QueryEngine, DEFAULT_TOP_K};
use std::fs;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a TF-IDF inverted index over crawled pages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from crawl records (.json / .jsonl, file or directory)
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Documents per partial index
        #[arg(long, default_value_t = 10_000)]
        flush_every: usize,
        /// Flush early once this many postings are buffered
        #[arg(long)]
        max_postings: Option<usize>,
        /// Leave partial index segments on disk after merging
        #[arg(long, default_value_t = false)]
        keep_partials: bool,
    },
    /// Merge previously written partial index segments
    Merge {
        /// Directory holding a partials/ subdirectory
        #[arg(long)]
        partials: String,
        /// Output index directory
        #[arg(long)]
        output: String,
    },
    /// Print document count, unique tokens, and index size
    Report {
        #[arg(long, default_value = "./index")]
        index: String,
    },
    /// Run one query against a built index
    Search {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        k: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, flush_every, max_postings, keep_partials } => {
            let config = BuilderConfig { flush_every_docs: flush_every, max_buffered_postings: max_postings, ..BuilderConfig::default() };
            build_index(&input, &output, config, keep_partials)
        }
        Commands::Merge { partials, output } => merge_index(&partials, &output),
        Commands::Report { index } => report(&index),
        Commands::Search { index, query, k } => search(&index, &query, k),
    }
}

fn build_index(input: &str, output: &str, config: BuilderConfig, keep_partials: bool) -> Result<()> {
    let out_paths = IndexPaths::new(output);
    // Stale segments from an earlier build would be merged in otherwise.
    if out_paths.partials_dir().exists() {
        fs::remove_dir_all(out_paths.partials_dir())?;
    }

    let mut corpus = CorpusReader::open(Path::new(input));
    let mut written = 0usize;
    let consumed = build_partials_into(corpus.by_ref(), config, |part| {
        written += 1;
        save_partial(&out_paths.partial(written), &part)
    })?;
    if consumed == 0 {
        bail!("no crawl records found under {input}");
    }
    tracing::info!(records = consumed, partials = written, skipped = corpus.skipped(), "partial indexes written");

    merge_index(output, output)?;
    if !keep_partials {
        fs::remove_dir_all(out_paths.partials_dir())?;
    }
    report(output)
}

fn merge_index(partials: &str, output: &str) -> Result<()> {
    let files = list_partials(&IndexPaths::new(partials))?;
    if files.is_empty() {
        bail!("no partial index segments under {partials}");
    }
    let parts = files.iter().map(|f| load_partial(f)).collect::<Result<Vec<PartialIndex>, _>>()?;
    let index = merge_partials(&parts)?;

    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".into());
    save_final(&IndexPaths::new(output), &index, &created_at)?;
    tracing::info!(output, num_docs = index.num_docs, num_terms = index.num_terms(), "index build complete");
    Ok(())
}

fn report(index: &str) -> Result<()> {
    let paths = IndexPaths::new(index);
    let final_index = load_final(&paths)?;
    let size_kb = index_size_bytes(&paths)? as f64 / 1024.0;
    println!("Total Documents Indexed: {}", final_index.num_docs);
    println!("Unique Tokens: {}", final_index.num_terms());
    println!("Index Size: {size_kb:.2} KB");
    Ok(())
}

fn search(index: &str, query: &str, k: usize) -> Result<()> {
    let engine = QueryEngine::open(index)?;
    let hits = engine.search(query, k);
    if hits.is_empty() {
        println!("no results for {query:?}");
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!("{:>2}. {:.4}  {}", rank + 1, hit.score, hit.url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn build_survives_bad_records_and_cleans_up_segments() {
        let input = tempdir().unwrap();
        let mut bytes = b"{\"url\":\"http://x/1\",\"content\":\"<p>machine learning</p>\"}\n".to_vec();
        bytes.extend_from_slice(b"{\"url\":\"http://x/2\",\"content\":\"\xff\xfe\"}\n");
        bytes.extend_from_slice(b"{\"url\":\"http://x/3\",\"content\":\"deep learning\"}\n");
        fs::write(input.path().join("crawl.jsonl"), bytes).unwrap();
        let output = tempdir().unwrap();
        let out = output.path().to_string_lossy().to_string();

        let config = BuilderConfig { flush_every_docs: 1, batches_in_flight: 1, ..BuilderConfig::default() };
        build_index(&input.path().to_string_lossy(), &out, config, false).unwrap();

        let engine = QueryEngine::open(&out).unwrap();
        assert_eq!(engine.index().num_docs, 2);
        let urls: Vec<String> = engine.search("learning", 5).into_iter().map(|h| h.url).collect();
        assert_eq!(urls, vec!["http://x/1", "http://x/3"]);
        assert!(!IndexPaths::new(&out).partials_dir().exists());
    }

    #[test]
    fn keeps_one_segment_per_flush_when_asked() {
        let input = tempdir().unwrap();
        fs::write(input.path().join("crawl.jsonl"), "{\"url\":\"a\",\"content\":\"one\"}\n{\"url\":\"b\",\"content\":\"two\"}\n{\"url\":\"c\",\"content\":\"three\"}\n").unwrap();
        let output = tempdir().unwrap();
        let out = output.path().to_string_lossy().to_string();

        let config = BuilderConfig { flush_every_docs: 2, batches_in_flight: 1, ..BuilderConfig::default() };
        build_index(&input.path().to_string_lossy(), &out, config, true).unwrap();
        assert_eq!(list_partials(&IndexPaths::new(&out)).unwrap().len(), 2);
    }
}
