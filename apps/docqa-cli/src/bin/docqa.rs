use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use docqa_cli::{collect_inputs, render_text};
use docqa_core::chunker::Chunker;
use docqa_core::config::{ChunkingSettings, Config};
use docqa_core::types::Document;
use docqa_hybrid::{render_prompt, HybridEngine};

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Hybrid retrieval over local documents")]
struct Cli {
    /// Config file; defaults to docqa.toml, docqa.<RUST_ENV>.toml and DOCQA_* variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest files into a fresh session and retrieve context for a question
    Ask {
        question: String,
        /// Text file to ingest (repeatable)
        #[arg(long = "file", short = 'f')]
        files: Vec<PathBuf>,
        /// Directory whose .txt/.md files are ingested
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Print the retrieval as JSON
        #[arg(long)]
        json: bool,
        /// Print the grounded-answer prompt instead of the bare context
        #[arg(long)]
        prompt: bool,
    },
    /// Show chunk boundaries for a file
    Chunks {
        file: PathBuf,
        #[arg(long)]
        target_size: Option<usize>,
        #[arg(long)]
        overlap: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::load()?,
    };
    let settings = config.settings()?;

    match cli.command {
        Command::Ask { question, files, dir, json, prompt } => {
            let inputs = collect_inputs(&files, dir.as_deref());
            anyhow::ensure!(!inputs.is_empty(), "nothing to ingest: pass --file and/or --dir");

            let engine = HybridEngine::from_settings(settings).await?;
            let session = engine.open_session();

            let pb = ProgressBar::new(inputs.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
                    .progress_chars("#>-"),
            );
            for path in &inputs {
                let filename = path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
                pb.set_message(filename.clone());
                match std::fs::read_to_string(path) {
                    Ok(text) => {
                        let report = engine.ingest(&session, &filename, &text).await?;
                        if !report.index.failed.is_empty() {
                            warn!(file = %filename, failed = report.index.failed.len(), "some chunks were not indexed");
                        }
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
                }
                pb.inc(1);
            }
            pb.finish_and_clear();

            let retrieval = engine.retrieve(&session, &question).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&retrieval)?);
            } else if prompt {
                println!("{}", render_prompt(&question, &retrieval.context));
            } else {
                print!("{}", render_text(&retrieval));
            }
        }
        Command::Chunks { file, target_size, overlap } => {
            let defaults = settings.chunking;
            let chunker = Chunker::new(ChunkingSettings {
                target_size: target_size.unwrap_or(defaults.target_size),
                overlap: overlap.unwrap_or(defaults.overlap),
            })?;
            let text = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let document = Document::new("session_local", &file.display().to_string(), text);
            for chunk in chunker.chunk_document(&document) {
                let page = chunk.page_number.map(|p| format!(" page {p}")).unwrap_or_default();
                let preview: String = chunk.text.chars().take(60).collect::<String>().replace('\n', " ");
                println!("#{:<4} {:>7}..{:<7}{page}  {preview}", chunk.sequence_index, chunk.char_start, chunk.char_end);
            }
        }
    }
    Ok(())
}
