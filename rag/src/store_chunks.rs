use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chunk_text::Chunk;
use crate::error::RagError;
use crate::store_json::{load_or_default, lock, save};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredDocument {
    name: String,
    chunks: Vec<Chunk>,
}

/// Layouts `lectures.json` has been written in.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLayout {
    Ordered(Vec<StoredDocument>),
    /// Object keyed by file name with `{text, page, file, lecturer}` chunks.
    Keyed(BTreeMap<String, Vec<KeyedChunk>>),
}

impl Default for StoredLayout {
    fn default() -> Self {
        StoredLayout::Ordered(vec![])
    }
}

#[derive(Deserialize)]
struct KeyedChunk {
    text: String,
    page: u32,
    file: Option<String>,
    lecturer: Option<String>,
}

impl StoredLayout {
    fn into_documents(self) -> Vec<StoredDocument> {
        match self {
            StoredLayout::Ordered(documents) => documents,
            StoredLayout::Keyed(files) => files
                .into_iter()
                .map(|(name, chunks)| StoredDocument {
                    chunks: chunks
                        .into_iter()
                        .map(|c| Chunk {
                            text: c.text,
                            source_document: c.file.unwrap_or_else(|| name.clone()),
                            page_number: c.page,
                            uploader: c.lecturer.unwrap_or_default(),
                        })
                        .collect(),
                    name,
                })
                .collect(),
        }
    }
}

/// Document summary for listings.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentInfo {
    pub name: String,
    pub uploader: Option<String>,
    pub chunk_count: usize,
}

/// File-backed chunk store keyed by document name. Documents keep their
/// insertion order, which is also the tie-break order during retrieval.
/// A file in the older keyed layout loads in name order and is rewritten as an
/// ordered list on the next save.
pub struct ChunkStore {
    path: PathBuf,
    documents: Mutex<Vec<StoredDocument>>,
}

impl ChunkStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let documents = load_or_default::<StoredLayout>(&path).into_documents();
        info!(path = %path.display(), documents = documents.len(), "chunk store loaded");
        Self {
            path,
            documents: Mutex::new(documents),
        }
    }

    /// Swaps in the full chunk set for `name`. A re-upload keeps the document's
    /// original position; a new document goes to the end.
    pub fn replace_document(&self, name: &str, chunks: Vec<Chunk>) -> Result<(), RagError> {
        let mut documents = lock(&self.documents);
        let mut next = documents.clone();
        match next.iter_mut().find(|d| d.name == name) {
            Some(existing) => existing.chunks = chunks,
            None => next.push(StoredDocument {
                name: name.to_string(),
                chunks,
            }),
        }
        save(&self.path, &next)?;
        *documents = next;
        Ok(())
    }

    /// Every chunk, in document insertion order then slice order.
    pub fn all_chunks(&self) -> Vec<Chunk> {
        lock(&self.documents)
            .iter()
            .flat_map(|d| d.chunks.iter().cloned())
            .collect()
    }

    pub fn document_chunks(&self, name: &str) -> Option<Vec<Chunk>> {
        lock(&self.documents)
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.chunks.clone())
    }

    pub fn documents(&self) -> Vec<DocumentInfo> {
        lock(&self.documents)
            .iter()
            .map(|d| DocumentInfo {
                name: d.name.clone(),
                uploader: d.chunks.first().map(|c| c.uploader.clone()),
                chunk_count: d.chunks.len(),
            })
            .collect()
    }
}
