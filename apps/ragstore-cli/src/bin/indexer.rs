//! Chunks a directory of `.txt` files into passages and writes them to the
//! configured store in batches.

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ragstore_core::chunking::{ChunkingConfig, DirectoryLoader, PassageSplitter};
use ragstore_core::config::Config;
use ragstore_core::types::PassageInput;
use ragstore_hybrid::RetrievalClient;

#[derive(Parser)]
#[command(name = "ragstore-indexer", version, about)]
struct Args {
    /// Directory walked for `.txt` files
    data_dir: PathBuf,

    /// Knowledge base the passages are stored under
    #[arg(long, default_value = "default")]
    kb: String,

    /// Only index the first N files
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long, default_value_t = 500)]
    chunk_chars: usize,

    #[arg(long, default_value_t = 50)]
    overlap_chars: usize,

    /// Passages embedded and written per store call
    #[arg(long, default_value_t = 64)]
    batch_size: usize,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    let mut client = RetrievalClient::from_settings(&settings)?;

    let splitter = PassageSplitter::new(ChunkingConfig { max_chars: args.chunk_chars, overlap_chars: args.overlap_chars })?;
    let mut loader = DirectoryLoader::new(splitter);
    if let Some(limit) = args.limit {
        loader = loader.with_limit(limit);
    }
    let passages = loader
        .load(&args.data_dir, &args.kb)
        .with_context(|| format!("reading {}", args.data_dir.display()))?;
    if passages.is_empty() {
        println!("No .txt content found under {}", args.data_dir.display());
        return Ok(());
    }

    let bar = ProgressBar::new(passages.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} passages ({eta})")?
            .progress_chars("=> "),
    );
    let mut written = 0;
    for batch in passages.chunks(args.batch_size.max(1)) {
        let inputs = batch.iter().cloned().map(PassageInput::from).collect();
        written += client.add_documents(inputs)?;
        bar.inc(batch.len() as u64);
    }
    bar.finish_and_clear();

    let stats = client.stats()?;
    info!(written, backend = %stats.backend, total = stats.passages, "indexing finished");
    println!("Indexed {} passages into knowledge base '{}' ({} stored in total)", written, args.kb, stats.passages);
    Ok(())
}
