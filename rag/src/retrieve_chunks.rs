use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

use crate::chunk_text::Chunk;
use crate::embed_chunks::Embedder;
use crate::embed_query::embed_query;
use crate::error::RagError;
use crate::store_json::lock;

/// One ranked chunk for a single query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryResult {
    pub chunk_text: String,
    pub similarity_score: f32,
    pub source_document: String,
    pub page_number: u32,
}

/// Cosine similarity over the common prefix of `a` and `b`; zero when either side has no
/// length or the vectors hold non-finite values.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0f32;
    let mut na = 0f32;
    let mut nb = 0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let score = dot / (na.sqrt() * nb.sqrt());
    if score.is_finite() {
        score.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Indices and scores of the `k` best vectors, best first. Equal scores keep input order.
pub fn rank(query: &[f32], vectors: &[Vec<f32>], k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(idx, v)| (idx, cosine_similarity(query, v)))
        .collect();
    // sort_by is stable, so ties stay in corpus order.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    scored
}

/// Embeds queries and corpus chunks with one embedder and ranks by cosine similarity.
/// Chunk vectors are cached by text across calls; texts that left the corpus are evicted.
pub struct Retriever {
    embedder: Box<dyn Embedder>,
    cache: Mutex<HashMap<String, Vec<f32>>>,
}

impl Retriever {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn retrieve(&self, chunks: &[Chunk], query: &str, k: usize) -> Result<Vec<QueryResult>, RagError> {
        if chunks.is_empty() || k == 0 {
            return Ok(vec![]);
        }
        let vectors = self.chunk_vectors(chunks)?;
        let query_vec = embed_query(self.embedder.as_ref(), query)?;
        let ranked = rank(&query_vec, &vectors, k);
        debug!(query, candidates = chunks.len(), returned = ranked.len(), "ranked chunks");

        Ok(ranked
            .into_iter()
            .map(|(idx, score)| {
                let chunk = &chunks[idx];
                QueryResult {
                    chunk_text: chunk.text.clone(),
                    similarity_score: score,
                    source_document: chunk.source_document.clone(),
                    page_number: chunk.page_number,
                }
            })
            .collect())
    }

    fn chunk_vectors(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut cache = lock(&self.cache);
        let mut missing: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for chunk in chunks {
            if !cache.contains_key(&chunk.text) && seen.insert(chunk.text.as_str()) {
                missing.push(chunk.text.clone());
            }
        }
        if !missing.is_empty() {
            let vectors = self.embedder.embed(&missing)?;
            if vectors.len() != missing.len() {
                return Err(RagError::Decode(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    missing.len()
                )));
            }
            cache.extend(missing.into_iter().zip(vectors));
        }
        let live: HashSet<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        cache.retain(|text, _| live.contains(text.as_str()));
        Ok(chunks
            .iter()
            .map(|c| cache.get(&c.text).cloned().unwrap_or_default())
            .collect())
    }
}
