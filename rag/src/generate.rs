use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::RagError;
use crate::http::post_text;

/// A text-generation service. Any error means "unavailable" to the caller.
pub trait Generator: Send + Sync {
    fn model(&self) -> &str;
    fn generate(&self, prompt: &str) -> Result<String, RagError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Generator backed by a local Ollama server's `/api/generate`.
pub struct OllamaGenerator {
    url: String,
    model: String,
    timeout: Duration,
}

impl OllamaGenerator {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            url: format!("{}/api/generate", cfg.ollama_url.trim_end_matches('/')),
            model: cfg.chat_model.clone(),
            timeout: Duration::from_secs(cfg.generation_timeout_secs),
        }
    }
}

impl Generator for OllamaGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let req = GenerateRequest {
            model: &self.model,
            prompt,
        };
        let body = post_text(&self.url, &req, self.timeout)?;
        Ok(parse_generation_body(&body))
    }
}

/// Joins the pieces of a generation response in arrival order.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    out: String,
}

impl ResponseAccumulator {
    pub fn push_value(&mut self, value: &Value) {
        if let Some(text) = fragment_text(value) {
            self.out.push_str(text);
        }
    }

    /// Lines that are not JSON are kept as they are, one per line.
    pub fn push_raw(&mut self, line: &str) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        self.out.push_str(line);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Parses either a single JSON object or newline-delimited JSON objects. Each
/// fragment is read from `response`, then `text`, then `message.content`.
pub fn parse_generation_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let mut acc = ResponseAccumulator::default();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        acc.push_value(&value);
        return acc.finish();
    }
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => acc.push_value(&value),
            Err(_) => acc.push_raw(line),
        }
    }
    acc.finish()
}

fn fragment_text(value: &Value) -> Option<&str> {
    if let Some(text) = value.as_str() {
        return Some(text);
    }
    value
        .get("response")
        .and_then(Value::as_str)
        .or_else(|| value.get("text").and_then(Value::as_str))
        .or_else(|| {
            value
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(Value::as_str)
        })
}
