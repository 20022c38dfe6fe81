use crate::embeddings::Embedder;
use crate::error::{IngestError, PersistenceError, SearchError};
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::ingest::{chunk_folder, ParsedPdf, SkippedPdf};
use crate::models::{DraftChunk, SearchResult, StoreConfig, StoreStats};
use crate::persistence::{load_collection, Snapshot};
use crate::store::Collection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Clone)]
pub struct IngestedPdf {
    pub path: PathBuf,
    pub checksum: String,
    pub total_pages: u32,
    pub non_empty_pages: usize,
    pub keys: Vec<u64>,
}

/// Per-file outcome of a directory ingestion. The caller decides whether
/// skipped files are acceptable.
#[derive(Debug, Default)]
pub struct IngestionReport {
    pub ingested: Vec<IngestedPdf>,
    pub skipped_files: Vec<SkippedPdf>,
}

impl IngestionReport {
    pub fn chunk_count(&self) -> usize {
        self.ingested.iter().map(|file| file.keys.len()).sum()
    }
}

/// Retrieval context shared by every caller. Writers (ingestion, load, save)
/// take the write lock; searches share the read lock.
pub struct VectorStore {
    config: StoreConfig,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn PdfExtractor>,
    collection: RwLock<Collection>,
}

impl VectorStore {
    pub fn new(config: StoreConfig, embedder: Arc<dyn Embedder>) -> Self {
        let collection = Collection::new(embedder.dimensions(), config.metric);
        Self {
            config,
            embedder,
            extractor: Arc::new(LopdfExtractor),
            collection: RwLock::new(collection),
        }
    }

    /// Loads persisted state when both artifacts exist and starts empty when
    /// neither does. A lone artifact is an error so that a later `save`
    /// cannot overwrite it.
    pub async fn open(
        config: StoreConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, PersistenceError> {
        let store = Self::new(config, embedder);
        match store.load().await {
            Ok(()) => {}
            Err(error) if error.is_not_found() => {
                if any_artifact_exists(&store.config).await? {
                    return Err(error);
                }
                info!(data_dir = %store.config.data_dir.display(), "no saved vector store, starting empty");
            }
            Err(error) => return Err(error),
        }
        Ok(store)
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PdfExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub async fn len(&self) -> usize {
        self.collection.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.collection.read().await.is_empty()
    }

    pub async fn stats(&self) -> StoreStats {
        let collection = self.collection.read().await;
        StoreStats {
            chunks: collection.len(),
            sources: collection.sources(),
            dimension: collection.dimension(),
            metric: collection.metric(),
            model: self.embedder.model_name().to_string(),
        }
    }

    /// Ingests every PDF directly inside `directory`, appending to what is
    /// already stored. Each file's chunks become visible to searches in one
    /// step. Nothing is saved implicitly.
    pub async fn load_documents_from_directory(
        &self,
        directory: impl AsRef<Path>,
    ) -> Result<IngestionReport, IngestError> {
        let folder = directory.as_ref().to_path_buf();
        let options = self.config.ingestion.clone();
        let extractor = Arc::clone(&self.extractor);

        let folder_chunks = tokio::task::spawn_blocking(move || {
            chunk_folder(&folder, &options, extractor.as_ref())
        })
        .await??;

        let mut report = IngestionReport {
            ingested: Vec::with_capacity(folder_chunks.parsed.len()),
            skipped_files: folder_chunks.skipped,
        };

        for parsed in folder_chunks.parsed {
            let path = parsed.path.clone();
            match self.ingest_parsed(parsed).await {
                Ok(ingested) => {
                    info!(
                        path = %ingested.path.display(),
                        chunks = ingested.keys.len(),
                        "pdf ingested"
                    );
                    report.ingested.push(ingested);
                }
                Err(error) => {
                    warn!(path = %path.display(), reason = %error, "skipped pdf");
                    report.skipped_files.push(SkippedPdf {
                        path,
                        reason: error.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    async fn ingest_parsed(&self, parsed: ParsedPdf) -> Result<IngestedPdf, SearchError> {
        let ParsedPdf {
            path,
            checksum,
            total_pages,
            non_empty_pages,
            chunks,
        } = parsed;

        let keys = self.add_documents(chunks).await?;

        Ok(IngestedPdf {
            path,
            checksum,
            total_pages,
            non_empty_pages,
            keys,
        })
    }

    /// Embeds and appends arbitrary chunks, returning their keys.
    pub async fn add_documents(&self, drafts: Vec<DraftChunk>) -> Result<Vec<u64>, SearchError> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let contents = drafts
            .iter()
            .map(|draft| draft.content.clone())
            .collect::<Vec<_>>();
        let vectors = self.embedder.embed_batch(&contents).await?;

        self.collection.write().await.append(drafts, vectors)
    }

    /// Up to `k` chunks, best first. An empty store yields no results for any
    /// query; a blank query against a populated store is rejected.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, SearchError> {
        if k == 0 || self.is_empty().await {
            return Ok(Vec::new());
        }

        if query.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let query_vector = self.embedder.embed(query).await?;
        let results = self.collection.read().await.search(&query_vector, k)?;

        debug!(query, k, hits = results.len(), "search completed");
        Ok(results)
    }

    pub async fn save(&self) -> Result<(), PersistenceError> {
        let collection = self.collection.write().await;
        Snapshot::capture(&collection)?.write(&self.config).await
    }

    /// Replaces in-memory state with what is on disk.
    pub async fn load(&self) -> Result<(), PersistenceError> {
        let mut collection = self.collection.write().await;
        let loaded = load_collection(&self.config, self.embedder.dimensions()).await?;
        if loaded.metric() != self.config.metric {
            warn!(
                stored = %loaded.metric(),
                requested = %self.config.metric,
                "saved store keeps its own distance metric"
            );
        }
        *collection = loaded;
        Ok(())
    }
}

async fn any_artifact_exists(config: &StoreConfig) -> Result<bool, PersistenceError> {
    for path in [config.index_path(), config.documents_path()] {
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| PersistenceError::Io { path: path.clone(), source })?;
        if exists {
            return Ok(true);
        }
    }
    Ok(false)
}
