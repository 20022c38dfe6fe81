use crate::error::IngestError;
use crate::models::ChunkMetadata;
use regex::Regex;
use std::path::Path;

/// Tokens that end the company part of an annual-report file name.
const REPORT_KEYWORDS: [&str; 9] = [
    "plc",
    "annual",
    "report",
    "accounts",
    "financial",
    "statements",
    "integrated",
    "results",
    "ar",
];

const YEAR_PATTERN: &str = r"(?:^|[^0-9])((?:19|20)[0-9]{2})(?:[^0-9]|$)";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentLabels {
    pub company: Option<String>,
    pub year: Option<String>,
}

impl DocumentLabels {
    pub fn page_metadata(&self, source: &str, page: u32, total_pages: u32) -> ChunkMetadata {
        ChunkMetadata {
            source: source.to_string(),
            company: self.company.clone(),
            year: self.year.clone(),
            page: Some(page),
            total_pages: Some(total_pages),
            ..ChunkMetadata::default()
        }
    }
}

/// Derives company and year from a file name such as
/// `Example-PLC-Annual-Report-2021.pdf`. Document content is never consulted.
pub fn infer_document_labels(file_name: &str) -> Result<DocumentLabels, IngestError> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);

    let year_re = Regex::new(YEAR_PATTERN)?;

    // Years separated by a single dash (2020-2021) share a delimiter, so scan
    // token by token rather than over the whole stem.
    let year = stem
        .split(is_name_delimiter)
        .filter_map(|token| year_re.captures(token))
        .filter_map(|capture| capture.get(1).map(|found| found.as_str().to_string()))
        .last();

    let company_tokens = stem
        .split(is_name_delimiter)
        .filter(|token| !token.is_empty())
        .take_while(|token| !is_report_keyword(token) && !year_re.is_match(token))
        .collect::<Vec<_>>();

    let company = if company_tokens.is_empty() {
        None
    } else {
        Some(company_tokens.join(" "))
    };

    Ok(DocumentLabels { company, year })
}

fn is_name_delimiter(ch: char) -> bool {
    matches!(ch, '-' | '_' | ' ' | '.')
}

fn is_report_keyword(token: &str) -> bool {
    let lowered = token.to_lowercase();
    REPORT_KEYWORDS.iter().any(|keyword| *keyword == lowered)
}
