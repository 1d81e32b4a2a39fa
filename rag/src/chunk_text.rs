use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::extract_text::PageText;

/// A fixed-width slice of a page, tagged with where it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_document: String,
    pub page_number: u32,
    pub uploader: String,
}

/// Slices `text` into windows of `size` characters. Slices are verbatim: no trimming,
/// no attempt to respect word or sentence boundaries.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![];
    }
    if size == 0 {
        return vec![text.to_string()];
    }
    let overlap = if overlap >= size { 0 } else { overlap };

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let chars: Vec<char> = text.chars().collect();
    let len_chars = chars.len();

    while start < len_chars {
        let end = (start + size).min(len_chars);
        chunks.push(chars[start..end].iter().collect());
        if end == len_chars {
            break;
        }
        start = end - overlap;
    }

    chunks
}

/// Chunks every non-blank page of a document.
pub fn chunk_pages(pages: &[PageText], source_document: &str, uploader: &str, cfg: &Config) -> Vec<Chunk> {
    let mut out = Vec::new();
    for page in pages {
        if page.text.trim().is_empty() {
            continue;
        }
        for text in chunk_text(&page.text, cfg.chunk_size, cfg.chunk_overlap) {
            out.push(Chunk {
                text,
                source_document: source_document.to_string(),
                page_number: page.number,
                uploader: uploader.to_string(),
            });
        }
    }
    out
}
