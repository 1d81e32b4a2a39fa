use std::fs;
use std::path::Path;

use crate::error::RagError;

/// Extracted text of a single page, numbered from 1.
#[derive(Clone, Debug, PartialEq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

const FORM_FEED: char = '\u{000C}';

pub fn extract_pages(path: &Path) -> Result<Vec<PageText>, RagError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => extract_pdf(path),
        "txt" | "md" => {
            let text = fs::read_to_string(path)
                .map_err(|e| RagError::Extraction(format!("{}: {}", path.display(), e)))?;
            Ok(split_text_pages(&text))
        }
        other => Err(RagError::Extraction(format!(
            "unsupported file type '.{}' (expected .pdf, .txt or .md)",
            other
        ))),
    }
}

/// Pages of a plain text document are separated by form feeds.
pub fn split_text_pages(text: &str) -> Vec<PageText> {
    text.split(FORM_FEED)
        .enumerate()
        .map(|(idx, page)| PageText {
            number: idx as u32 + 1,
            text: page.to_string(),
        })
        .collect()
}

fn extract_pdf(path: &Path) -> Result<Vec<PageText>, RagError> {
    let doc = lopdf::Document::load(path)
        .map_err(|e| RagError::Extraction(format!("{}: {}", path.display(), e)))?;
    let mut pages = Vec::new();
    for number in doc.get_pages().into_keys() {
        let text = doc
            .extract_text(&[number])
            .map_err(|e| RagError::Extraction(format!("{} page {}: {}", path.display(), number, e)))?;
        pages.push(PageText { number, text });
    }
    Ok(pages)
}
