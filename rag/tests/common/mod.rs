#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rag::{Chunk, Config, Embedder, Encyclopedia, Generator, Lookup, Notifier, RagError, Services};

const DIMS: usize = 64;

/// Bag-of-words embedder: each lowercase word is hashed into one of 64 buckets.
#[derive(Clone, Default)]
pub struct WordEmbedder {
    pub calls: Arc<AtomicUsize>,
    pub texts_embedded: Arc<AtomicUsize>,
}

impl WordEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }
}

pub fn embed_words(text: &str) -> Vec<f32> {
    let mut v = vec![0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hash: u32 = 2166136261;
        for b in word.to_lowercase().bytes() {
            hash ^= b as u32;
            hash = hash.wrapping_mul(16777619);
        }
        v[hash as usize % DIMS] += 1.0;
    }
    v
}

impl Embedder for WordEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| embed_words(t)).collect())
    }
}

pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Err(RagError::Http {
            url: "http://localhost:11434/api/embed".to_string(),
            message: "connection refused".to_string(),
        })
    }
}

/// Generator that either replies with fixed text or fails, recording every prompt.
#[derive(Clone)]
pub struct ScriptedGenerator {
    reply: Option<String>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            prompts: Arc::default(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reply: None,
            prompts: Arc::default(),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log lock").clone()
    }
}

impl Generator for ScriptedGenerator {
    fn model(&self) -> &str {
        "test-model"
    }

    fn generate(&self, prompt: &str) -> Result<String, RagError> {
        self.prompts.lock().expect("prompt log lock").push(prompt.to_string());
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => Err(RagError::Http {
                url: "http://localhost:11434/api/generate".to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct ScriptedEncyclopedia {
    outcome: Option<Lookup>,
    pub lookups: Arc<AtomicUsize>,
}

impl ScriptedEncyclopedia {
    pub fn returning(outcome: Lookup) -> Self {
        Self {
            outcome: Some(outcome),
            lookups: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            outcome: None,
            lookups: Arc::default(),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Encyclopedia for ScriptedEncyclopedia {
    fn lookup(&self, _topic: &str) -> Result<Lookup, RagError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.outcome
            .clone()
            .ok_or_else(|| RagError::Http {
                url: "https://en.wikipedia.org/w/api.php".to_string(),
                message: "timed out".to_string(),
            })
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("notifier lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_admin(&self, subject: &str, body: &str) -> Result<(), RagError> {
        self.sent
            .lock()
            .expect("notifier lock")
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

pub fn chunk(text: &str, document: &str, page: u32) -> Chunk {
    Chunk {
        text: text.to_string(),
        source_document: document.to_string(),
        page_number: page,
        uploader: "drsmith".to_string(),
    }
}

pub fn services(generator: ScriptedGenerator, encyclopedia: ScriptedEncyclopedia) -> Services {
    Services {
        embedder: Box::new(WordEmbedder::default()),
        generator: Box::new(generator),
        encyclopedia: Box::new(encyclopedia),
        notifier: Box::new(RecordingNotifier::default()),
    }
}

pub fn test_config(data_dir: &std::path::Path) -> Config {
    Config::with_data_dir(data_dir)
}

/// One request as the fake server saw it: method, path with query, body.
#[derive(Clone, Debug)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

type Handler = dyn Fn(&SeenRequest) -> (u16, String) + Send + Sync;

/// Minimal HTTP/1.1 server on a loopback port. Every response closes the connection.
pub struct FakeServer {
    pub url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl FakeServer {
    pub fn start(handler: impl Fn(&SeenRequest) -> (u16, String) + Send + Sync + 'static) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let url = format!("http://{}", listener.local_addr().expect("local addr"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let handler: Arc<Handler> = Arc::new(handler);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                serve_one(stream, handler.as_ref(), &log);
            }
        });
        Self { url, seen }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().expect("request log").clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

fn serve_one(stream: std::net::TcpStream, handler: &Handler, log: &Mutex<Vec<SeenRequest>>) {
    use std::io::{BufRead, BufReader, Read, Write};

    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0u8; content_length];
    if reader.read_exact(&mut body).is_err() {
        return;
    }

    let request = SeenRequest {
        method,
        path,
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    let (status, reply) = handler(&request);
    log.lock().expect("request log").push(request);

    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        reply.len(),
        reply
    );
    let mut stream = stream;
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// Config whose Ollama and Wikipedia endpoints both point at `base_url`.
pub fn served_config(data_dir: &std::path::Path, base_url: &str) -> Config {
    let mut cfg = Config::with_data_dir(data_dir);
    cfg.ollama_url = base_url.to_string();
    cfg.wiki_url = base_url.to_string();
    cfg.generation_timeout_secs = 5;
    cfg.wiki_timeout_secs = 5;
    cfg
}
