use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pdfchunk_core::config::DEFAULT_CHUNK_SIZE;
use pdfchunk_core::{part_key, ChunkReport, StorageEvent};
use pdfchunk_extract::{extractor_for_path, PdfTextExtractor};
use pdfchunk_observability::{init_tracing, AppMetrics};
use pdfchunk_pipeline::DocumentProcessor;
use pdfchunk_storage::DocumentStorage;
use serde::Serialize;
use walkdir::WalkDir;

#[derive(Debug, Parser)]
#[command(name = "pdfchunk")]
#[command(about = "Split PDF documents into size-bounded text chunks")]
struct Cli {
    /// Maximum characters per chunk.
    #[arg(long, global = true, env = "PDFCHUNK_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    limit: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chunk one document; prints JSON unless --out-dir is given.
    Chunk {
        path: PathBuf,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Print the normalized text of one document.
    Normalize { path: PathBuf },
    /// Chunk every PDF below a directory.
    Batch {
        dir: PathBuf,
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Replay a bucket notification against local directories.
    Invoke {
        #[arg(long)]
        event: PathBuf,
        /// Buckets are directories below this root.
        #[arg(long, default_value = "data")]
        root: PathBuf,
        #[arg(long, env = "PDFCHUNK_OUTPUT_BUCKET", default_value = "my-pdf-output-bucket")]
        output_bucket: String,
    },
}

#[derive(Debug, Serialize)]
struct BatchEntry {
    source: String,
    num_chunks: usize,
    total_characters: usize,
    parts: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("pdfchunk_cli");
    let cli = Cli::parse();

    if cli.limit == 0 {
        bail!("--limit must be a positive number of characters");
    }

    match cli.command {
        Command::Chunk { path, out_dir } => {
            let report = chunk_file(&path, cli.limit)?;
            match out_dir {
                Some(out_dir) => {
                    let name = file_name(&path)?;
                    let parts = write_parts(&out_dir, &name, &report)?;
                    println!("{}", serde_json::to_string_pretty(&parts)?);
                }
                None => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
        Command::Normalize { path } => {
            let bytes = read_file(&path)?;
            let raw = extractor_for_path(&path)
                .extract_text(&bytes)
                .with_context(|| format!("failed extracting text from {}", path.display()))?;
            println!("{}", pdfchunk_text::normalize(&raw));
        }
        Command::Batch { dir, out_dir } => {
            let entries = run_batch(&dir, &out_dir, cli.limit)?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Command::Invoke {
            event,
            root,
            output_bucket,
        } => {
            let raw = fs::read_to_string(&event)
                .with_context(|| format!("failed reading event {}", event.display()))?;
            let event: StorageEvent =
                serde_json::from_str(&raw).context("event is not a storage notification")?;

            let processor = processor(Arc::new(PdfTextExtractor), cli.limit);
            let storage = DocumentStorage::local(root);
            let summary = processor
                .handle_storage_event(&event, &storage, &output_bucket)
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

fn processor(extractor: Arc<dyn pdfchunk_extract::TextExtractor>, limit: usize) -> DocumentProcessor {
    DocumentProcessor::new(extractor, limit, AppMetrics::shared())
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed reading {}", path.display()))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToString::to_string)
        .with_context(|| format!("{} has no usable file name", path.display()))
}

fn chunk_file(path: &Path, limit: usize) -> Result<ChunkReport> {
    let bytes = read_file(path)?;
    processor(extractor_for_path(path), limit)
        .process_bytes(&bytes)
        .with_context(|| format!("failed processing {}", path.display()))
}

fn write_parts(out_dir: &Path, source_key: &str, report: &ChunkReport) -> Result<Vec<String>> {
    let mut written = Vec::with_capacity(report.num_chunks);
    for (idx, chunk) in report.chunks.iter().enumerate() {
        let target = out_dir.join(part_key(source_key, idx + 1));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
        fs::write(&target, chunk).with_context(|| format!("failed writing {}", target.display()))?;
        written.push(target.display().to_string());
    }
    Ok(written)
}

fn run_batch(dir: &Path, out_dir: &Path, limit: usize) -> Result<Vec<BatchEntry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
    {
        let path = entry.path();
        let rel_path = path
            .strip_prefix(dir)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| path.to_string_lossy().to_string());

        let report = chunk_file(path, limit)?;
        let parts = write_parts(out_dir, &rel_path, &report)?;
        entries.push(BatchEntry {
            source: rel_path,
            num_chunks: report.num_chunks,
            total_characters: report.total_characters,
            parts,
        });
    }

    Ok(entries)
}
