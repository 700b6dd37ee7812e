use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use docuhelper::{
    config,
    extraction::DocumentFormat,
    logging,
    processing::{IngestionError, IngestionResult, IngestionService},
};
use serde_json::{Value, json};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "docuhelper-ingest",
    about = "Extract, summarize, chunk, and embed documents, printing one JSON result per file"
)]
struct Cli {
    /// Declared type for every file (pdf, docx, txt); inferred from the extension when omitted.
    #[arg(long = "type", value_name = "TYPE")]
    declared_type: Option<String>,
    /// Include embedding vectors in the output.
    #[arg(long)]
    include_embeddings: bool,
    /// Pretty-print JSON output.
    #[arg(long)]
    pretty: bool,
    /// Load models before the first document instead of lazily.
    #[arg(long)]
    warm_up: bool,
    /// Files or directories to ingest; directories are walked recursively.
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing();

    let service =
        IngestionService::from_config(config).context("failed to initialize ingestion service")?;
    if cli.warm_up {
        service.warm_up().await.context("model warm-up failed")?;
    }

    let files = collect_files(&cli.paths);
    tracing::info!(files = files.len(), "Starting ingestion");

    let mut failures = 0usize;
    for file in &files {
        let declared_type = cli
            .declared_type
            .clone()
            .unwrap_or_else(|| extension_of(file));
        let document = match service.ingest(file, &declared_type).await {
            Ok(result) => render_result(file, &result, cli.include_embeddings)?,
            Err(error) => {
                failures += 1;
                render_error(file, &error)
            }
        };
        let line = if cli.pretty {
            serde_json::to_string_pretty(&document)?
        } else {
            serde_json::to_string(&document)?
        };
        println!("{line}");
    }

    let snapshot = service.metrics_snapshot();
    tracing::info!(
        metrics = %serde_json::to_string(&snapshot)?,
        "Ingestion metrics"
    );

    if failures > 0 {
        bail!("{failures} of {} documents failed to ingest", files.len());
    }
    Ok(())
}

/// Expand directories into the supported files beneath them, in a stable order.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            if DocumentFormat::from_path(entry.path()).is_ok() {
                files.push(entry.into_path());
            } else {
                tracing::debug!(path = %entry.path().display(), "Skipping unsupported file");
            }
        }
    }
    files
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

fn render_result(path: &Path, result: &IngestionResult, include_embeddings: bool) -> Result<Value> {
    let mut value = serde_json::to_value(result).context("failed to serialize result")?;
    if !include_embeddings {
        if let Some(chunks) = value.get_mut("chunks").and_then(Value::as_array_mut) {
            for chunk in chunks.iter_mut().filter_map(Value::as_object_mut) {
                chunk.remove("embedding");
            }
        }
    }
    Ok(json!({ "path": path.display().to_string(), "result": value }))
}

fn render_error(path: &Path, error: &IngestionError) -> Value {
    json!({
        "path": path.display().to_string(),
        "error": {
            "kind": error.kind(),
            "message": error.user_message(),
            "detail": error.to_string(),
        }
    })
}
