mod config;
mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use dealscope_ai::{ExtractionService, FallbackService, OpenAiClient};
use dealscope_core::{
    Document, DocumentInfo, FileKind, PipelineStatus, RunConfig, classify, extract_text,
    group_documents, truncate_chars,
};
use dealscope_pipeline::{CancellationToken, Pipeline};
use dealscope_store::DuckStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "dealscope", version, about = "Venture financing document analysis")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify documents by filename, falling back to Word text.
    Classify {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Show how documents are bundled for Phase 1.
    Group {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Print the plain text of a Word document.
    Extract {
        file: PathBuf,
        /// Truncate to this many characters.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Run the three-phase analysis.
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,
    #[arg(long)]
    company_name: Option<String>,
    #[arg(long)]
    company_id: Option<String>,
    /// Analyse without persisting.
    #[arg(long)]
    dry_run: bool,
    /// Phase 1 window size.
    #[arg(long)]
    concurrency: Option<usize>,
    /// Print the final state as JSON instead of a report.
    #[arg(long)]
    json: bool,
    /// DuckDB file to persist into (overrides `store.path`).
    #[arg(long)]
    store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Classify { files, json } => cmd_classify(&files, json),
        Command::Group { files, json } => cmd_group(&files, json),
        Command::Extract { file, limit } => cmd_extract(&file, limit),
        Command::Analyze(args) => cmd_analyze(args).await,
    }
}

fn read_document(path: &Path) -> anyhow::Result<Document> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok(Document::new(filename, bytes)?)
}

fn read_documents(paths: &[PathBuf]) -> anyhow::Result<Vec<Document>> {
    paths.iter().map(|p| read_document(p)).collect()
}

fn word_text(doc: &Document) -> Option<String> {
    match doc.kind {
        FileKind::Word => extract_text(&doc.content, FileKind::Word).ok(),
        FileKind::Pdf => None,
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_classify(paths: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let rows: Vec<_> = read_documents(paths)?
        .iter()
        .map(|doc| {
            let text = word_text(doc);
            (doc.filename.clone(), classify(&doc.filename, text.as_deref()))
        })
        .collect();
    if json {
        let out: Vec<_> = rows
            .iter()
            .map(|(filename, c)| serde_json::json!({"filename": filename, "subtype": c.subtype, "category": c.category}))
            .collect();
        return print_json(&out);
    }
    display::print_classifications(&rows);
    Ok(())
}

fn cmd_group(paths: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let docs = read_documents(paths)?;
    let infos: Vec<DocumentInfo> = docs
        .iter()
        .enumerate()
        .map(|(i, d)| DocumentInfo::classify(i, &d.filename, None))
        .collect();
    let groups = group_documents(&infos);
    if json {
        return print_json(&groups);
    }
    display::print_groups(&groups);
    Ok(())
}

fn cmd_extract(path: &Path, limit: Option<usize>) -> anyhow::Result<()> {
    let doc = read_document(path)?;
    let text = extract_text(&doc.content, doc.kind)
        .with_context(|| format!("extracting text from {}", doc.filename))?;
    match limit {
        Some(limit) => println!("{}", truncate_chars(&text, limit)),
        None => println!("{text}"),
    }
    Ok(())
}

fn build_service(config: &AppConfig) -> anyhow::Result<Arc<dyn ExtractionService>> {
    let primary = OpenAiClient::new(&config.openai).context("configuring extraction service")?;
    let fallback = config
        .openai
        .fallback_model
        .as_deref()
        .filter(|m| !m.is_empty() && *m != config.openai.model)
        .map(|m| primary.with_model(m));
    let service: Arc<dyn ExtractionService> = match fallback {
        Some(fallback) => Arc::new(FallbackService::new(Arc::new(primary), Arc::new(fallback))),
        None => Arc::new(primary),
    };
    Ok(service)
}

async fn cmd_analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::load_with_dotenv().context("loading configuration")?;
    if let Some(concurrency) = args.concurrency {
        config.pipeline.concurrency = concurrency;
    }
    info!(
        model = %config.openai.model,
        fallback = config.openai.fallback_model.as_deref().unwrap_or("none"),
        concurrency = config.pipeline.concurrency,
        "configuration loaded"
    );

    let documents = read_documents(&args.files)?;
    let service = build_service(&config)?;
    let mut pipeline = Pipeline::new(service, config.prompt_provider()?, config.pipeline.clone());

    match args.store.or(config.store.path.clone()) {
        Some(path) if !args.dry_run => {
            let store = DuckStore::open_persistent(&path)
                .with_context(|| format!("opening store {}", path.display()))?;
            pipeline = pipeline.with_store(Arc::new(store));
        }
        Some(_) => eprintln!("  Dry run: results will not be persisted"),
        None => eprintln!("  No store configured: results will not be persisted"),
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Cancelling after the current step...");
            on_signal.cancel();
        }
    });

    let run_config = RunConfig {
        dry_run: args.dry_run,
        company_id: args.company_id,
        company_name: args.company_name,
    };
    let observer = display::ProgressPrinter::default();
    let state = pipeline
        .run_documents(&documents, run_config, &observer, &cancel)
        .await;

    if args.json {
        print_json(&state)?;
    } else {
        display::print_report(&state);
    }

    if state.status == PipelineStatus::Error {
        bail!(
            "analysis failed: {}",
            state.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
