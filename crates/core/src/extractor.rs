use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Text of the readable pages of one PDF. `total_pages` counts every page,
/// including the blank ones left out of `pages`.
#[derive(Debug, Clone)]
pub struct ExtractedPdf {
    pub total_pages: u32,
    pub pages: Vec<PageText>,
}

pub trait PdfExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<ExtractedPdf, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedPdf, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let page_numbers = document.get_pages().into_keys().collect::<Vec<_>>();
        let total_pages = u32::try_from(page_numbers.len()).unwrap_or(u32::MAX);

        let mut pages = Vec::new();
        for page_no in page_numbers {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(ExtractedPdf { total_pages, pages })
    }
}

pub fn extract_page_texts(path: &Path) -> Result<ExtractedPdf, IngestError> {
    LopdfExtractor.extract(path)
}
