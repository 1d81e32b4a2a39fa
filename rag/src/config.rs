use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

const DEFAULT_SYSTEM_PROMPT: &str = "You are ChronoBOT, a study assistant. Answer the question using only the provided context. \
If the context does not contain enough information to answer, say explicitly that the provided material is insufficient.";

#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub ollama_url: String,
    pub embed_model: String,
    pub chat_model: String,
    pub generation_enabled: bool,
    pub generation_timeout_secs: u64,
    pub system_prompt: String,
    pub wiki_url: String,
    pub wiki_timeout_secs: u64,
    pub wiki_sentences: usize,
    pub admin: AdminConfig,
}

/// Administrator credentials and contact address.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub admin_user: String,
    pub admin_pass: String,
    pub admin_email: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            admin_user: "admin".to_string(),
            admin_pass: "admin123".to_string(),
            admin_email: "admin@example.com".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            log_dir: PathBuf::from("./logs"),
            chunk_size: 500,
            chunk_overlap: 0,
            top_k: 3,
            ollama_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            chat_model: "llama3.2".to_string(),
            generation_enabled: true,
            generation_timeout_secs: 60,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            wiki_url: "https://en.wikipedia.org".to_string(),
            wiki_timeout_secs: 10,
            wiki_sentences: 3,
            admin: AdminConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        // Load .env if present so model and admin settings work without manual `source .env`.
        let _ = dotenvy::dotenv();
        let defaults = Self::default();
        let config_file = env::var("CHRONOBOT_CONFIG").unwrap_or_else(|_| "config.json".to_string());
        let mut admin = load_admin_file(Path::new(&config_file));
        if let Ok(v) = env::var("ADMIN_USER") {
            admin.admin_user = v;
        }
        if let Ok(v) = env::var("ADMIN_PASS") {
            admin.admin_pass = v;
        }
        if let Ok(v) = env::var("ADMIN_EMAIL") {
            admin.admin_email = v;
        }

        Self {
            data_dir: env::var("CHRONOBOT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            log_dir: env::var("CHRONOBOT_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            chunk_size: parse_var("RAG_CHUNK_SIZE").unwrap_or(defaults.chunk_size),
            chunk_overlap: parse_var("RAG_CHUNK_OVERLAP").unwrap_or(defaults.chunk_overlap),
            top_k: parse_var("RAG_TOP_K").unwrap_or(defaults.top_k),
            ollama_url: env::var("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            embed_model: env::var("OLLAMA_EMBED_MODEL").unwrap_or(defaults.embed_model),
            chat_model: env::var("OLLAMA_CHAT_MODEL").unwrap_or(defaults.chat_model),
            generation_enabled: parse_var("GENERATION_ENABLED").unwrap_or(defaults.generation_enabled),
            generation_timeout_secs: parse_var("GENERATION_TIMEOUT_SECS")
                .unwrap_or(defaults.generation_timeout_secs),
            system_prompt: env::var("RAG_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            wiki_url: env::var("WIKI_URL").unwrap_or(defaults.wiki_url),
            wiki_timeout_secs: parse_var("WIKI_TIMEOUT_SECS").unwrap_or(defaults.wiki_timeout_secs),
            wiki_sentences: parse_var("WIKI_SENTENCES").unwrap_or(defaults.wiki_sentences),
            admin,
        }
    }

    /// Builds a config whose stores all live under `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }

    pub fn lectures_path(&self) -> PathBuf {
        self.data_dir.join("lectures.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("history.json")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Reads the optional admin override file. Missing or unreadable files yield the defaults.
fn load_admin_file(path: &Path) -> AdminConfig {
    let Ok(raw) = fs::read_to_string(path) else {
        return AdminConfig::default();
    };
    match serde_json::from_str::<AdminConfig>(&raw) {
        Ok(admin) => admin,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable config file");
            AdminConfig::default()
        }
    }
}
