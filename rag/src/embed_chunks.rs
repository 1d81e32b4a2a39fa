use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::config::Config;
use crate::error::RagError;
use crate::http::post_json;

const EMBED_TIMEOUT: Duration = Duration::from_secs(120);

/// Turns texts into vectors in one shared space. Queries and chunks must go through
/// the same embedder for their similarity to mean anything.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Serialize)]
struct EmbedLegacyRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Embedder backed by a local Ollama server.
pub struct OllamaEmbedder {
    url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            url: cfg.ollama_url.trim_end_matches('/').to_string(),
            model: cfg.embed_model.clone(),
        }
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        embed_texts(&self.url, &self.model, texts)
    }
}

pub fn embed_texts(base_url: &str, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
    if texts.is_empty() {
        return Ok(vec![]);
    }
    let url = format!("{}/api/embed", base_url);
    let req = EmbedRequest { model, input: texts };
    match post_json::<Value, _>(&url, &req, EMBED_TIMEOUT) {
        Ok(res) => parse_embeddings(res),
        Err(err) => {
            warn!(error = %err, "batch embed failed, retrying with legacy endpoint");
            // The legacy endpoint only takes one prompt per call.
            let url = format!("{}/api/embeddings", base_url);
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                let req = EmbedLegacyRequest { model, prompt: text };
                let res = post_json::<Value, _>(&url, &req, EMBED_TIMEOUT)?;
                out.extend(parse_embeddings(res)?);
            }
            Ok(out)
        }
    }
}

fn parse_embeddings(value: Value) -> Result<Vec<Vec<f32>>, RagError> {
    if let Some(embeddings) = value.get("embeddings") {
        return parse_embeddings_value(embeddings);
    }
    if let Some(embedding) = value.get("embedding") {
        return parse_embeddings_value(embedding);
    }
    Err(RagError::Decode("no embeddings in response".to_string()))
}

fn parse_embeddings_value(value: &Value) -> Result<Vec<Vec<f32>>, RagError> {
    let Some(arr) = value.as_array() else {
        return Err(RagError::Decode("invalid embeddings format".to_string()));
    };
    if arr.is_empty() {
        return Ok(vec![]);
    }
    if arr[0].is_array() {
        return arr.iter().map(parse_vec).collect();
    }
    Ok(vec![parse_vec(value)?])
}

fn parse_vec(value: &Value) -> Result<Vec<f32>, RagError> {
    let arr = value
        .as_array()
        .ok_or_else(|| RagError::Decode("embedding is not an array".to_string()))?;
    let mut out = Vec::with_capacity(arr.len());
    for v in arr {
        let n = v
            .as_f64()
            .ok_or_else(|| RagError::Decode("embedding value is not a number".to_string()))?;
        out.push(n as f32);
    }
    Ok(out)
}
