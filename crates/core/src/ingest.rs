use crate::chunking::{normalize_page_text, ChunkingConfig, TextSplitter};
use crate::error::IngestError;
use crate::extractor::PdfExtractor;
use crate::metadata::infer_document_labels;
use crate::models::{DraftChunk, IngestionOptions};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// PDFs directly inside `folder`, sorted by path. Subdirectories are not
/// visited.
pub fn discover_pdf_files(folder: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !folder.is_dir() {
        return Err(IngestError::InvalidArgument(format!(
            "not a directory: {}",
            folder.display()
        )));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    Ok(files)
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// One PDF split into labelled chunks, not yet embedded.
#[derive(Debug, Clone)]
pub struct ParsedPdf {
    pub path: PathBuf,
    pub checksum: String,
    pub total_pages: u32,
    pub non_empty_pages: usize,
    pub chunks: Vec<DraftChunk>,
}

#[derive(Debug, Clone)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct FolderChunks {
    pub parsed: Vec<ParsedPdf>,
    pub skipped: Vec<SkippedPdf>,
}

pub fn chunk_pdf(
    path: &Path,
    extractor: &dyn PdfExtractor,
    splitter: &TextSplitter,
) -> Result<ParsedPdf, IngestError> {
    let source = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;

    let checksum = digest_file(path)?;
    let labels = infer_document_labels(source)?;
    let extracted = extractor.extract(path)?;

    let mut chunks = Vec::new();
    let mut non_empty_pages = 0;

    for page in &extracted.pages {
        let normalized = normalize_page_text(&page.text);
        if normalized.is_empty() {
            continue;
        }
        non_empty_pages += 1;

        for content in splitter.split(&normalized) {
            chunks.push(DraftChunk::new(
                content,
                labels.page_metadata(source, page.number, extracted.total_pages),
            ));
        }
    }

    Ok(ParsedPdf {
        path: path.to_path_buf(),
        checksum,
        total_pages: extracted.total_pages,
        non_empty_pages,
        chunks,
    })
}

/// Best effort: a PDF that cannot be read is recorded in `skipped` and the
/// rest of the folder is still processed.
pub fn chunk_folder(
    folder: &Path,
    options: &IngestionOptions,
    extractor: &dyn PdfExtractor,
) -> Result<FolderChunks, IngestError> {
    let splitter = TextSplitter::new(ChunkingConfig::from(options))?;
    let files = discover_pdf_files(folder)?;

    if files.is_empty() {
        warn!(folder = %folder.display(), "no pdf files found");
    }

    let mut report = FolderChunks::default();

    for path in files {
        match chunk_pdf(&path, extractor, &splitter) {
            Ok(parsed) => {
                info!(
                    path = %path.display(),
                    pages = parsed.non_empty_pages,
                    chunks = parsed.chunks.len(),
                    "pdf chunked"
                );
                report.parsed.push(parsed);
            }
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipped pdf");
                report.skipped.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(report)
}
