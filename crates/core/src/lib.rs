pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod metadata;
pub mod models;
pub mod persistence;
pub mod retrieval;
pub mod store;

pub use chunking::{normalize_page_text, ChunkingConfig, TextSplitter};
#[cfg(feature = "fastembed")]
pub use embeddings::FastEmbedder;
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OllamaConfig, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL, MINILM_DIMENSIONS,
};
pub use error::{IngestError, PersistenceError, SearchError};
pub use extractor::{extract_page_texts, ExtractedPdf, LopdfExtractor, PageText, PdfExtractor};
pub use index::FlatIndex;
pub use ingest::{
    chunk_folder, chunk_pdf, digest_file, discover_pdf_files, FolderChunks, ParsedPdf, SkippedPdf,
};
pub use metadata::{infer_document_labels, DocumentLabels};
pub use models::{
    Chunk, ChunkMetadata, DistanceMetric, DraftChunk, IngestionOptions, SearchResult, StoreConfig,
    StoreStats,
};
pub use retrieval::{IngestedPdf, IngestionReport, VectorStore, DEFAULT_TOP_K};
pub use store::Collection;
