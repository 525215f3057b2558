//! ragstore CLI: add, search and manage passages in the configured store.
//!
//! ```bash
//! ragstore add passages.jsonl
//! ragstore search "外滩开放时间" --kb travel --mode keywords --similarity 0.1
//! ragstore search "夜景" --kb travel --category sights
//! ragstore delete --document bund
//! ragstore stats
//! ```

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use ragstore_core::config::Config;
use ragstore_core::types::{DeleteScope, PassageInput, SearchMode};
use ragstore_hybrid::context::DEFAULT_MAX_PASSAGE_CHARS;
use ragstore_hybrid::{format_context, RetrievalClient};

#[derive(Parser)]
#[command(name = "ragstore", version, about)]
struct Cli {
    /// Config environment (`dev`, `test`, `prod`); defaults to `RUST_ENV`
    #[arg(long, global = true)]
    env: Option<String>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add passages from a JSONL file, one object per line
    Add { file: PathBuf },
    /// Search one or more knowledge bases
    Search(SearchArgs),
    /// Delete passages by knowledge base, document or paragraph
    Delete(DeleteArgs),
    /// Print a stored passage as JSON
    Get { paragraph_id: String },
    /// Make a passage searchable again
    Activate { paragraph_id: String },
    /// Hide a passage from search without deleting it
    Deactivate { paragraph_id: String },
    /// Print store counters
    Stats,
}

#[derive(Args)]
struct SearchArgs {
    query: String,

    /// Knowledge base to search; repeat for several
    #[arg(long = "kb", required = true)]
    knowledge_ids: Vec<String>,

    /// embedding, keywords or blend
    #[arg(long)]
    mode: Option<SearchMode>,

    #[arg(short = 'n', long)]
    top_n: Option<usize>,

    /// Minimum composite score in [0, 1]
    #[arg(long)]
    similarity: Option<f32>,

    /// Only search passages whose `meta.category` equals this value
    #[arg(long)]
    category: Option<String>,

    /// Output hits as JSON
    #[arg(long, conflicts_with = "context")]
    json: bool,

    /// Output hits as a numbered prompt context
    #[arg(long)]
    context: bool,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct DeleteArgs {
    #[arg(long)]
    knowledge: Option<String>,
    #[arg(long)]
    document: Option<String>,
    #[arg(long)]
    paragraph: Option<String>,
}

impl DeleteArgs {
    fn scope(self) -> anyhow::Result<DeleteScope> {
        match (self.knowledge, self.document, self.paragraph) {
            (Some(id), None, None) => Ok(DeleteScope::Knowledge(id)),
            (None, Some(id), None) => Ok(DeleteScope::Document(id)),
            (None, None, Some(id)) => Ok(DeleteScope::Paragraph(id)),
            _ => bail!("give exactly one of --knowledge, --document or --paragraph"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();

    let config = Config::load_for_env(cli.env.as_deref()).context("loading configuration")?;
    let settings = config.settings()?;
    let mut client = RetrievalClient::from_settings(&settings)?;

    match cli.command {
        Command::Add { file } => {
            let inputs = read_jsonl(&file)?;
            let count = client.add_documents(inputs)?;
            println!("Added {count} passages");
        }
        Command::Search(args) => run_search(&client, args)?,
        Command::Delete(args) => {
            let scope = args.scope()?;
            let label = scope.to_string();
            let removed = client.delete(scope)?;
            println!("Deleted {removed} passages ({label})");
        }
        Command::Get { paragraph_id } => match client.get(&paragraph_id)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record.passage)?),
            None => bail!("no passage with paragraph_id '{paragraph_id}'"),
        },
        Command::Activate { paragraph_id } => set_active(&mut client, &paragraph_id, true)?,
        Command::Deactivate { paragraph_id } => set_active(&mut client, &paragraph_id, false)?,
        Command::Stats => println!("{}", serde_json::to_string_pretty(&client.stats()?)?),
    }
    Ok(())
}

fn run_search(client: &RetrievalClient, args: SearchArgs) -> anyhow::Result<()> {
    let mut request = client.request(args.query, args.knowledge_ids);
    if let Some(mode) = args.mode {
        request.mode = mode;
    }
    if let Some(top_n) = args.top_n {
        request.top_n = top_n;
    }
    if args.similarity.is_some() {
        request.similarity = args.similarity;
    }
    if let Some(category) = args.category {
        request = request.with_category(category);
    }
    let effective = client.effective_mode(request.mode);
    let hits = client.search(request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else if args.context {
        println!("{}", format_context(&hits, DEFAULT_MAX_PASSAGE_CHARS));
    } else {
        println!("Found {} results ({effective})", hits.len());
        for (i, hit) in hits.iter().enumerate() {
            println!(
                "\n  {}. score={:.4}  id={}  kb={}  doc={}",
                i + 1,
                hit.similarity,
                hit.paragraph_id,
                hit.knowledge_id,
                hit.document_id
            );
            if let (Some(e), Some(k)) = (hit.embedding_score, hit.keyword_score) {
                println!("     embedding={e:.4}  keywords={k:.4}");
            }
            println!("     {}", hit.text);
        }
    }
    Ok(())
}

fn set_active(client: &mut RetrievalClient, paragraph_id: &str, active: bool) -> anyhow::Result<()> {
    if !client.set_active(paragraph_id, active)? {
        bail!("no passage with paragraph_id '{paragraph_id}'");
    }
    println!("{paragraph_id}: active={active}");
    Ok(())
}

fn read_jsonl(path: &Path) -> anyhow::Result<Vec<PassageInput>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut inputs = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let input: PassageInput = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: not a passage object", path.display(), n + 1))?;
        inputs.push(input);
    }
    Ok(inputs)
}
