mod accounts;
mod assistant;
mod build_prompt;
mod chunk_text;
mod compose_answer;
mod config;
mod embed_chunks;
mod embed_query;
mod encyclopedia;
mod error;
mod extract_text;
mod generate;
mod history;
mod http;
mod ingest;
mod notify;
mod retrieve_chunks;
mod session;
mod store_chunks;
mod store_json;

pub use accounts::{
    hash_password, validate_signup, verify_password, Account, AccountError, AccountStore, PendingLecturer, Role,
    SignupForm, SignupOutcome,
};
pub use assistant::{Assistant, Services};
pub use build_prompt::{build_grounded_prompt, build_open_prompt, format_context};
pub use chunk_text::{chunk_pages, chunk_text, Chunk};
pub use compose_answer::{Answer, AnswerComposer, SourceLabel, NO_CONTENT_ANSWER};
pub use config::{AdminConfig, Config};
pub use embed_chunks::{Embedder, OllamaEmbedder};
pub use encyclopedia::{first_sentences, interpret_summary, Article, Encyclopedia, Lookup, PageSummary, Wikipedia};
pub use error::RagError;
pub use extract_text::{extract_pages, split_text_pages, PageText};
pub use generate::{parse_generation_body, Generator, OllamaGenerator, ResponseAccumulator};
pub use history::{HistoryEntry, HistoryLog};
pub use ingest::{document_name, ingest_document, IngestReport};
pub use notify::{LogNotifier, Notifier};
pub use retrieve_chunks::{cosine_similarity, rank, QueryResult, Retriever};
pub use session::{Session, SessionUser, RECENT_QUERIES};
pub use store_chunks::{ChunkStore, DocumentInfo};
