use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use finrag_core::{
    CharacterNgramEmbedder, DistanceMetric, Embedder, IngestionOptions, OllamaConfig,
    OllamaEmbedder, StoreConfig, VectorStore, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_OLLAMA_MODEL,
    DEFAULT_OLLAMA_URL, DEFAULT_TOP_K, MINILM_DIMENSIONS,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "finrag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding index.json and documents.json
    #[arg(long, env = "FINRAG_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Embedding backend
    #[arg(long, env = "FINRAG_EMBEDDER", value_enum, default_value_t = EmbedderKind::Ollama)]
    embedder: EmbedderKind,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Ollama embedding model
    #[arg(long, env = "FINRAG_EMBEDDING_MODEL", default_value = DEFAULT_OLLAMA_MODEL)]
    embedding_model: String,

    /// Vector length produced by the Ollama model
    #[arg(long, env = "FINRAG_EMBEDDING_DIMENSIONS", default_value_t = MINILM_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Texts sent per embedding request
    #[arg(long, env = "FINRAG_EMBEDDING_BATCH", default_value_t = 64)]
    embedding_batch: usize,

    /// Chunk length in characters
    #[arg(long, env = "FINRAG_CHUNK_SIZE", default_value_t = 500)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "FINRAG_CHUNK_OVERLAP", default_value_t = 50)]
    chunk_overlap: usize,

    /// Distance used by the index; only applies to a newly created store
    #[arg(long, env = "FINRAG_METRIC", value_enum, default_value_t = MetricArg::Cosine)]
    metric: MetricArg,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest every PDF in a folder and save the store.
    Ingest {
        /// Folder that contains the PDFs (not searched recursively).
        #[arg(long, default_value = "data")]
        dir: PathBuf,
    },
    /// Search the store and print ranked passages with their sources.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of passages to return.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        k: usize,
        /// Print results as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print what the saved store contains.
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// Hashed character trigrams, no model needed
    Hash,
    /// Local Ollama server
    Ollama,
    /// In-process all-MiniLM-L6-v2 (requires the `fastembed` feature)
    Fastembed,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Cosine,
    L2,
}

impl From<MetricArg> for DistanceMetric {
    fn from(value: MetricArg) -> Self {
        match value {
            MetricArg::Cosine => DistanceMetric::Cosine,
            MetricArg::L2 => DistanceMetric::L2,
        }
    }
}

impl Cli {
    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            data_dir: self.data_dir.clone(),
            metric: self.metric.into(),
            ingestion: IngestionOptions {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
                ..IngestionOptions::default()
            },
            ..StoreConfig::default()
        }
    }

    fn build_embedder(&self) -> anyhow::Result<Arc<dyn Embedder>> {
        match self.embedder {
            EmbedderKind::Hash => Ok(Arc::new(CharacterNgramEmbedder {
                dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            })),
            EmbedderKind::Ollama => {
                let embedder = OllamaEmbedder::new(OllamaConfig {
                    base_url: self.ollama_url.clone(),
                    model: self.embedding_model.clone(),
                    dimensions: self.embedding_dimensions,
                    batch_size: self.embedding_batch,
                })?;
                Ok(Arc::new(embedder))
            }
            EmbedderKind::Fastembed => fastembed_embedder(),
        }
    }
}

#[cfg(feature = "fastembed")]
fn fastembed_embedder() -> anyhow::Result<Arc<dyn Embedder>> {
    Ok(Arc::new(finrag_core::FastEmbedder::new()?))
}

#[cfg(not(feature = "fastembed"))]
fn fastembed_embedder() -> anyhow::Result<Arc<dyn Embedder>> {
    anyhow::bail!("this build has no fastembed support; rebuild with --features fastembed")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let embedder = cli.build_embedder()?;

    info!(
        version = app_version,
        model = embedder.model_name(),
        data_dir = %cli.data_dir.display(),
        started_at = %Utc::now().to_rfc3339(),
        "finrag boot"
    );

    let store = VectorStore::open(cli.store_config(), embedder).await?;

    match cli.command {
        Command::Ingest { dir } => {
            let report = store.load_documents_from_directory(&dir).await?;

            for file in &report.ingested {
                println!(
                    "{} chunks from {} ({} of {} pages with text)",
                    file.keys.len(),
                    file.path.display(),
                    file.non_empty_pages,
                    file.total_pages
                );
            }

            if !report.skipped_files.is_empty() {
                warn!(
                    "skipped_files={} for folder={}",
                    report.skipped_files.len(),
                    dir.display()
                );
                for skipped in &report.skipped_files {
                    println!("skipped {}: {}", skipped.path.display(), skipped.reason);
                }
            }

            store.save().await?;
            println!(
                "{} chunks ingested, {} stored at {}",
                report.chunk_count(),
                store.len().await,
                Utc::now().to_rfc3339()
            );
        }
        Command::Search { query, k, json } => {
            let results = store.search(&query, k).await?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "results": results }))?
                );
                return Ok(());
            }

            println!("query: {query}");
            if results.is_empty() {
                println!("no results");
            }
            for (rank, result) in results.iter().enumerate() {
                println!(
                    "[{}] score={:.4} distance={:.4} id={} source={}",
                    rank + 1,
                    result.score,
                    result.distance,
                    result.embedding_id,
                    result.source_label
                );
                println!("{}\n", result.content);
            }
        }
        Command::Stats => {
            let stats = store.stats().await;
            println!("chunks: {}", stats.chunks);
            println!("dimension: {}", stats.dimension);
            println!("metric: {}", stats.metric);
            println!("model: {}", stats.model);
            println!("sources: {}", stats.sources.len());
            for source in stats.sources {
                println!("  {source}");
            }
        }
    }

    Ok(())
}
