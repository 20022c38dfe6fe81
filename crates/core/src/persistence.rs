use crate::error::PersistenceError;
use crate::index::FlatIndex;
use crate::models::{Chunk, DistanceMetric, StoreConfig};
use crate::store::Collection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct IndexArtifact {
    format_version: u32,
    dimension: usize,
    metric: DistanceMetric,
    saved_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    key: u64,
    vector: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DocumentsArtifact {
    format_version: u32,
    saved_at: DateTime<Utc>,
    chunks: Vec<Chunk>,
}

/// Serialized bytes of both artifacts, produced while the caller still holds
/// the collection.
pub struct Snapshot {
    index: Vec<u8>,
    documents: Vec<u8>,
}

impl Snapshot {
    pub fn capture(collection: &Collection) -> Result<Self, PersistenceError> {
        let saved_at = Utc::now();

        let index = IndexArtifact {
            format_version: FORMAT_VERSION,
            dimension: collection.dimension(),
            metric: collection.metric(),
            saved_at,
            entries: collection
                .index()
                .entries()
                .map(|(key, vector)| IndexEntry {
                    key,
                    vector: vector.to_vec(),
                })
                .collect(),
        };

        let documents = DocumentsArtifact {
            format_version: FORMAT_VERSION,
            saved_at,
            chunks: collection.chunks().cloned().collect(),
        };

        Ok(Self {
            index: serde_json::to_vec(&index)?,
            documents: serde_json::to_vec(&documents)?,
        })
    }

    /// Each artifact is written to a `.tmp` sibling and renamed into place.
    /// The pair as a whole is not replaced atomically.
    pub async fn write(&self, config: &StoreConfig) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|source| io_error(&config.data_dir, source))?;

        write_replacing(&config.index_path(), &self.index).await?;
        write_replacing(&config.documents_path(), &self.documents).await?;

        info!(
            data_dir = %config.data_dir.display(),
            index_bytes = self.index.len(),
            documents_bytes = self.documents.len(),
            "vector store saved"
        );
        Ok(())
    }
}

async fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let staging = staging_path(path);
    tokio::fs::write(&staging, bytes)
        .await
        .map_err(|source| io_error(&staging, source))?;
    tokio::fs::rename(&staging, path)
        .await
        .map_err(|source| io_error(path, source))?;
    debug!(path = %path.display(), "artifact written");
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Reads both artifacts back into a collection whose dimension must match
/// `expected_dimension`.
pub async fn load_collection(
    config: &StoreConfig,
    expected_dimension: usize,
) -> Result<Collection, PersistenceError> {
    let index_path = config.index_path();
    let documents_path = config.documents_path();

    for path in [&index_path, &documents_path] {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|source| io_error(path, source))?
        {
            return Err(PersistenceError::NotFound(path.clone()));
        }
    }

    let index_bytes = tokio::fs::read(&index_path)
        .await
        .map_err(|source| io_error(&index_path, source))?;
    let documents_bytes = tokio::fs::read(&documents_path)
        .await
        .map_err(|source| io_error(&documents_path, source))?;

    let index: IndexArtifact = serde_json::from_slice(&index_bytes)?;
    let documents: DocumentsArtifact = serde_json::from_slice(&documents_bytes)?;

    let collection = assemble(index, documents, expected_dimension)?;
    info!(
        chunks = collection.len(),
        data_dir = %config.data_dir.display(),
        "vector store loaded"
    );
    Ok(collection)
}

fn assemble(
    index: IndexArtifact,
    documents: DocumentsArtifact,
    expected_dimension: usize,
) -> Result<Collection, PersistenceError> {
    for version in [index.format_version, documents.format_version] {
        if version != FORMAT_VERSION {
            return Err(PersistenceError::Corrupt(format!(
                "unsupported format version {version}"
            )));
        }
    }

    if index.dimension != expected_dimension {
        return Err(PersistenceError::DimensionMismatch {
            expected: expected_dimension,
            stored: index.dimension,
        });
    }

    let mut chunks = BTreeMap::new();
    for chunk in documents.chunks {
        if let Some(duplicate) = chunks.insert(chunk.embedding_id, chunk) {
            return Err(PersistenceError::Corrupt(format!(
                "duplicate document key {}",
                duplicate.embedding_id
            )));
        }
    }

    let index_keys = index
        .entries
        .iter()
        .map(|entry| entry.key)
        .collect::<BTreeSet<_>>();
    if index_keys.len() != index.entries.len() {
        return Err(PersistenceError::Corrupt(
            "duplicate keys in index artifact".to_string(),
        ));
    }
    if !index_keys.iter().eq(chunks.keys()) {
        return Err(PersistenceError::Corrupt(format!(
            "index holds {} vectors but documents hold {} chunks with different keys",
            index_keys.len(),
            chunks.len()
        )));
    }

    let mut flat = FlatIndex::new(index.dimension, index.metric);
    let entries = index
        .entries
        .into_iter()
        .map(|entry| (entry.key, entry.vector))
        .collect::<Vec<_>>();
    flat.add(&entries)
        .map_err(|error| PersistenceError::Corrupt(error.to_string()))?;

    Ok(Collection::from_parts(flat, chunks))
}

fn io_error(path: &Path, source: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, DraftChunk};
    use tempfile::tempdir;

    fn sample_collection() -> Collection {
        let mut collection = Collection::new(3, DistanceMetric::Cosine);
        let mut metadata = ChunkMetadata::new("Example-PLC-Annual-Report-2021.pdf");
        metadata.company = Some("Example".to_string());
        metadata.year = Some("2021".to_string());
        metadata.page = Some(1);
        metadata.total_pages = Some(3);

        collection
            .append(
                vec![
                    DraftChunk::new("Total assets rose.", metadata.clone()),
                    DraftChunk::new("Dividend held.", metadata),
                ],
                vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
            )
            .expect("valid append");
        collection
    }

    #[tokio::test]
    async fn save_then_load_round_trips() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config = StoreConfig::with_data_dir(dir.path().join("data"));
        let collection = sample_collection();

        Snapshot::capture(&collection)?.write(&config).await?;
        let loaded = load_collection(&config, 3).await?;

        assert_eq!(loaded.len(), collection.len());
        assert_eq!(loaded.index().len(), collection.index().len());
        assert_eq!(
            loaded.chunks().cloned().collect::<Vec<_>>(),
            collection.chunks().cloned().collect::<Vec<_>>()
        );
        assert!(!staging_path(&config.index_path()).exists());
        Ok(())
    }

    #[tokio::test]
    async fn missing_artifact_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config = StoreConfig::with_data_dir(dir.path());

        let result = load_collection(&config, 3).await;
        assert!(matches!(result, Err(PersistenceError::NotFound(_))));

        Snapshot::capture(&sample_collection())?.write(&config).await?;
        std::fs::remove_file(config.documents_path())?;

        let result = load_collection(&config, 3).await;
        assert!(matches!(result, Err(ref error) if error.is_not_found()));
        Ok(())
    }

    #[tokio::test]
    async fn desynchronized_artifacts_are_corrupt() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config = StoreConfig::with_data_dir(dir.path());
        Snapshot::capture(&sample_collection())?.write(&config).await?;

        let mut smaller = Collection::new(3, DistanceMetric::Cosine);
        smaller.append(
            vec![DraftChunk::new("only one", ChunkMetadata::new("x.pdf"))],
            vec![vec![0.0, 0.0, 1.0]],
        )?;
        let snapshot = Snapshot::capture(&smaller)?;
        std::fs::write(config.documents_path(), &snapshot.documents)?;

        let result = load_collection(&config, 3).await;
        assert!(matches!(result, Err(PersistenceError::Corrupt(_))));
        Ok(())
    }

    #[tokio::test]
    async fn dimension_change_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config = StoreConfig::with_data_dir(dir.path());
        Snapshot::capture(&sample_collection())?.write(&config).await?;

        let result = load_collection(&config, 384).await;
        assert!(matches!(
            result,
            Err(PersistenceError::DimensionMismatch {
                expected: 384,
                stored: 3
            })
        ));
        Ok(())
    }
}
