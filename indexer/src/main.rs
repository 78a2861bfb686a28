use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;
use wikisearch_core::codec::PostingReader;
use wikisearch_core::config::BLOCK_SIZE;
use wikisearch_core::persist::IndexPaths;
use wikisearch_core::store::LocalStore;
use wikisearch_core::tokenizer::tokenize;
use wikisearch_core::{bucket_id, DocId, IndexBuilder, IndexLayout, InvertedIndex};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: DocId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    anchors: Vec<String>,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and manage block-sharded inverted indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build body, title and anchor indexes from JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output store root
        #[arg(long)]
        output: String,
        /// Capacity of each posting block file, in bytes
        #[arg(long, default_value_t = BLOCK_SIZE)]
        block_size: usize,
        /// Stem tokens before indexing
        #[arg(long, default_value_t = false)]
        stem: bool,
        /// Delete existing indexes under the output root before flushing
        #[arg(long, default_value_t = false)]
        replace: bool,
    },
    /// Remove an index descriptor and all of its block files
    Delete {
        #[arg(long)]
        root: String,
        #[arg(long)]
        dir: String,
        #[arg(long)]
        name: String,
    },
    /// Print statistics and the posting list of one term
    Inspect {
        #[arg(long)]
        root: String,
        #[arg(long)]
        dir: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        term: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, block_size, stem, replace } => {
            build_indexes(&input, &output, block_size, stem, replace)
        }
        Commands::Delete { root, dir, name } => {
            let store = LocalStore::new(&root);
            let removed = InvertedIndex::delete(&store, &IndexPaths::new(dir, name))?;
            println!("removed descriptor and {removed} block files");
            Ok(())
        }
        Commands::Inspect { root, dir, name, term } => inspect(&root, IndexPaths::new(dir, name), &term),
    }
}

struct Builders {
    body: IndexBuilder,
    title: IndexBuilder,
    anchor: IndexBuilder,
    stem: bool,
}

impl Builders {
    fn ingest(&mut self, doc: InputDoc) -> Result<()> {
        self.body.add_document(doc.id, &tokenize(&doc.body, self.stem))?;
        self.title.add_document(doc.id, &tokenize(&doc.title, self.stem))?;
        // anchor text is indexed only for documents something links to
        if !doc.anchors.is_empty() {
            let tokens: Vec<String> = doc.anchors.iter().flat_map(|a| tokenize(a, self.stem)).collect();
            self.anchor.add_document(doc.id, &tokens)?;
        }
        Ok(())
    }
}

fn build_indexes(input: &str, output: &str, block_size: usize, stem: bool, replace: bool) -> Result<()> {
    let store = LocalStore::new(output);
    let mut builders = Builders {
        body: IndexBuilder::with_block_capacity(block_size),
        title: IndexBuilder::with_block_capacity(block_size),
        anchor: IndexBuilder::with_block_capacity(block_size),
        stem,
    };

    for file in input_files(Path::new(input)) {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            index_jsonl(&file, &mut builders)?;
        } else {
            index_json(&file, &mut builders)?;
        }
    }
    tracing::info!(num_docs = builders.body.num_docs(), "ingested documents");

    let layout = IndexLayout::default();
    if replace {
        for paths in [&layout.body, &layout.title, &layout.anchor] {
            InvertedIndex::delete(&store, paths)?;
        }
    }
    let Builders { body, title, anchor, .. } = builders;
    body.flush(&store, layout.body)?;
    title.flush(&store, layout.title)?;
    anchor.flush(&store, layout.anchor)?;

    tracing::info!(output, "index build complete");
    Ok(())
}

fn input_files(input_path: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }
    files
}

fn index_jsonl(file: &Path, builders: &mut Builders) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), line_no + 1))?;
        builders.ingest(doc)?;
    }
    Ok(())
}

fn index_json(file: &Path, builders: &mut Builders) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: InputDoc = serde_json::from_value(v)?;
                builders.ingest(doc)?;
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            builders.ingest(doc)?;
        }
        _ => {}
    }
    Ok(())
}

fn inspect(root: &str, paths: IndexPaths, term: &str) -> Result<()> {
    let store = LocalStore::new(root);
    let index = InvertedIndex::load(&store, paths)?;
    println!("docs: {}  terms: {}  block capacity: {}  built: {}",
        index.num_docs(), index.num_terms(), index.block_capacity(), index.created_at());
    println!("term {term:?}: df={} total={} bucket={}", index.df(term), index.term_total(term), bucket_id(term));
    if let Some(locs) = index.locations(term) {
        for loc in locs {
            println!("  {} @ {}", loc.block, loc.offset);
        }
    }
    let mut reader = PostingReader::new(&store);
    for p in index.read_posting_list(&mut reader, term)? {
        println!("  doc {} tf {}", p.doc_id, p.tf);
    }
    Ok(())
}
