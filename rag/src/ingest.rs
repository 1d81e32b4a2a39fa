use std::fs;
use std::path::{Component, Path};

use tracing::info;

use crate::chunk_text::chunk_pages;
use crate::config::Config;
use crate::error::RagError;
use crate::extract_text::extract_pages;
use crate::store_chunks::ChunkStore;

#[derive(Clone, Debug, PartialEq)]
pub struct IngestReport {
    pub document: String,
    pub pages: usize,
    pub chunks: usize,
}

/// Store key for an upload: `"{title} ({uploader}){ext}"`. The same uploader
/// reusing a title replaces the earlier upload.
pub fn document_name(title: &str, uploader: &str, source: &Path) -> String {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    format!("{} ({}){}", title.trim(), uploader, ext)
}

/// Extracts, chunks and stores one document, and keeps a copy of the file
/// under the uploads directory. A failed extraction leaves the store untouched.
pub fn ingest_document(
    cfg: &Config,
    store: &ChunkStore,
    title: &str,
    uploader: &str,
    source: &Path,
) -> Result<IngestReport, RagError> {
    if title.trim().is_empty() {
        return Err(RagError::Validation("A document title is required.".to_string()));
    }
    let name = document_name(title, uploader, source);
    if !is_plain_file_name(&name) {
        return Err(RagError::Validation(
            "Document titles cannot contain '/' or '\\'.".to_string(),
        ));
    }
    let uploads = cfg.uploads_dir();
    let target = uploads.join(&name);
    if target.parent() != Some(uploads.as_path()) {
        return Err(RagError::Validation(format!("'{}' is not a valid document name.", name)));
    }

    let pages = extract_pages(source)?;
    let chunks = chunk_pages(&pages, &name, uploader, cfg);

    fs::create_dir_all(&uploads)?;
    if !same_file(source, &target) {
        fs::copy(source, &target)?;
    }

    let report = IngestReport {
        document: name.clone(),
        pages: pages.len(),
        chunks: chunks.len(),
    };
    store.replace_document(&name, chunks)?;
    info!(document = %report.document, pages = report.pages, chunks = report.chunks, "document ingested");
    Ok(report)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// A single normal path component with no separators of either platform.
fn is_plain_file_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
