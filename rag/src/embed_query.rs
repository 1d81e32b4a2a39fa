use crate::embed_chunks::Embedder;
use crate::error::RagError;

pub fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, RagError> {
    let vecs = embedder.embed(&[text.to_string()])?;
    Ok(vecs.into_iter().next().unwrap_or_default())
}
