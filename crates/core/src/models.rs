use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Labels attached to every chunk. `source` is the bare file name; the
/// remaining fields are inferred from the file name and page position.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ChunkMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Human-readable citation, e.g. `Example 2021 annual report, page 3 of 3`.
    pub fn source_label(&self) -> String {
        let mut label = match (&self.company, &self.year) {
            (Some(company), Some(year)) => format!("{company} {year} annual report"),
            (Some(company), None) => format!("{company} annual report ({})", self.source),
            (None, Some(year)) => format!("{} ({year})", self.source),
            (None, None) => self.source.clone(),
        };

        match (self.page, self.total_pages) {
            (Some(page), Some(total)) => label.push_str(&format!(", page {page} of {total}")),
            (Some(page), None) => label.push_str(&format!(", page {page}")),
            _ => {}
        }

        label
    }
}

/// A chunk waiting for its key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl DraftChunk {
    pub fn new(content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub(crate) fn into_chunk(self, embedding_id: u64) -> Chunk {
        Chunk {
            content: self.content,
            metadata: self.metadata,
            embedding_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub embedding_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub embedding_id: u64,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub source_label: String,
    /// Raw distance under the index metric; lower is closer.
    pub distance: f32,
    /// `1 / (1 + distance)`; higher is better and always in `(0, 1]`.
    pub score: f32,
}

impl SearchResult {
    pub(crate) fn from_chunk(chunk: &Chunk, distance: f32) -> Self {
        Self {
            embedding_id: chunk.embedding_id,
            content: chunk.content.clone(),
            metadata: chunk.metadata.clone(),
            source_label: chunk.metadata.source_label(),
            distance,
            score: similarity_from_distance(distance),
        }
    }
}

pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    L2,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => f.write_str("cosine"),
            DistanceMetric::L2 => f.write_str("l2"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            min_chunk_chars: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub index_file: String,
    pub documents_file: String,
    pub metric: DistanceMetric,
    pub ingestion: IngestionOptions,
}

impl StoreConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index_file)
    }

    pub fn documents_path(&self) -> PathBuf {
        self.data_dir.join(&self.documents_file)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            index_file: "index.json".to_string(),
            documents_file: "documents.json".to_string(),
            metric: DistanceMetric::default(),
            ingestion: IngestionOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub chunks: usize,
    pub sources: Vec<String>,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_label_includes_company_year_and_page() {
        let metadata = ChunkMetadata {
            source: "Example-PLC-Annual-Report-2021.pdf".to_string(),
            company: Some("Example".to_string()),
            year: Some("2021".to_string()),
            page: Some(3),
            total_pages: Some(3),
            extra: BTreeMap::new(),
        };

        assert_eq!(metadata.source_label(), "Example 2021 annual report, page 3 of 3");
    }

    #[test]
    fn source_label_falls_back_to_file_name() {
        let metadata = ChunkMetadata::new("notes.pdf");
        assert_eq!(metadata.source_label(), "notes.pdf");
    }

    #[test]
    fn score_is_monotonic_in_distance() {
        assert_eq!(similarity_from_distance(0.0), 1.0);
        assert!(similarity_from_distance(0.2) > similarity_from_distance(0.7));
        assert!(similarity_from_distance(5.0) > 0.0);
    }

    #[test]
    fn metadata_omits_missing_fields_when_serialized() {
        let json = serde_json::to_value(ChunkMetadata::new("a.pdf")).expect("serializable");
        assert_eq!(json, serde_json::json!({ "source": "a.pdf" }));
    }
}
