use std::path::Path;

use tracing::{info, warn};

use crate::accounts::{AccountError, AccountStore, PendingLecturer, Role, SignupForm, SignupOutcome};
use crate::compose_answer::{Answer, AnswerComposer};
use crate::config::Config;
use crate::embed_chunks::{Embedder, OllamaEmbedder};
use crate::encyclopedia::{Encyclopedia, Wikipedia};
use crate::error::RagError;
use crate::generate::{Generator, OllamaGenerator};
use crate::history::{HistoryEntry, HistoryLog};
use crate::ingest::{ingest_document, IngestReport};
use crate::notify::{LogNotifier, Notifier};
use crate::retrieve_chunks::Retriever;
use crate::session::{Session, SessionUser, RECENT_QUERIES};
use crate::store_chunks::{ChunkStore, DocumentInfo};

/// External services the assistant talks to.
pub struct Services {
    pub embedder: Box<dyn Embedder>,
    pub generator: Box<dyn Generator>,
    pub encyclopedia: Box<dyn Encyclopedia>,
    pub notifier: Box<dyn Notifier>,
}

impl Services {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            embedder: Box::new(OllamaEmbedder::from_config(cfg)),
            generator: Box::new(OllamaGenerator::from_config(cfg)),
            encyclopedia: Box::new(Wikipedia::from_config(cfg)),
            notifier: Box::new(LogNotifier::new(cfg.admin.admin_email.clone())),
        }
    }
}

/// Owns the stores and services and runs one interaction at a time on behalf
/// of a [`Session`].
pub struct Assistant {
    cfg: Config,
    accounts: AccountStore,
    chunks: ChunkStore,
    history: HistoryLog,
    retriever: Retriever,
    composer: AnswerComposer,
    notifier: Box<dyn Notifier>,
}

impl Assistant {
    pub fn open(cfg: Config) -> Self {
        let services = Services::from_config(&cfg);
        Self::with_services(cfg, services)
    }

    pub fn with_services(cfg: Config, services: Services) -> Self {
        let composer = AnswerComposer::new(
            services.generator,
            services.encyclopedia,
            cfg.system_prompt.clone(),
            cfg.generation_enabled,
        );
        Self {
            accounts: AccountStore::open(cfg.users_path()),
            chunks: ChunkStore::open(cfg.lectures_path()),
            history: HistoryLog::open(cfg.history_path()),
            retriever: Retriever::new(services.embedder),
            composer,
            notifier: services.notifier,
            cfg,
        }
    }

    pub fn signup(&self, form: &SignupForm) -> Result<SignupOutcome, RagError> {
        let outcome = self.accounts.signup(form)?;
        if outcome == SignupOutcome::PendingApproval {
            let body = format!(
                "A new lecturer '{}' has registered.\nEmail: {}",
                form.username,
                form.email.as_deref().unwrap_or_default()
            );
            // The account exists either way; a failed notice is only logged.
            if let Err(err) = self
                .notifier
                .notify_admin("New Lecturer Registration Pending Approval", &body)
            {
                warn!(error = %err, "admin notification failed");
            }
        }
        Ok(outcome)
    }

    pub fn login(&self, session: &mut Session, role: Role, username: &str, password: &str) -> Result<(), RagError> {
        let account = self.accounts.login(role, username, password)?;
        session.selected_role = role;
        session.recent_queries = self.history.recent(&account.username, RECENT_QUERIES);
        session.user = Some(SessionUser {
            username: account.username,
            role: account.role,
        });
        info!(username, %role, "logged in");
        Ok(())
    }

    pub fn logout(&self, session: &mut Session) {
        if let Some(user) = session.user.take() {
            info!(username = %user.username, "logged out");
        }
        session.recent_queries.clear();
    }

    pub fn admin_login(&self, session: &mut Session, username: &str, password: &str) -> Result<(), RagError> {
        let admin = &self.cfg.admin;
        if username != admin.admin_user || password != admin.admin_pass {
            return Err(AccountError::InvalidAdminCredentials.into());
        }
        session.admin = true;
        info!("admin logged in");
        Ok(())
    }

    pub fn admin_logout(&self, session: &mut Session) {
        session.admin = false;
    }

    pub fn pending_lecturers(&self, session: &Session) -> Result<Vec<PendingLecturer>, RagError> {
        require_admin(session)?;
        Ok(self.accounts.pending_lecturers())
    }

    pub fn approve_lecturer(&self, session: &Session, username: &str) -> Result<(), RagError> {
        require_admin(session)?;
        self.accounts.approve_lecturer(username)?;
        Ok(())
    }

    pub fn reject_lecturer(&self, session: &Session, username: &str) -> Result<(), RagError> {
        require_admin(session)?;
        self.accounts.reject_lecturer(username)?;
        Ok(())
    }

    /// Uploads a document as the logged-in lecturer.
    pub fn upload(&self, session: &Session, title: &str, path: &Path) -> Result<IngestReport, RagError> {
        let uploader = require_role(session, Role::Lecturer)?;
        ingest_document(&self.cfg, &self.chunks, title, uploader, path)
    }

    pub fn documents(&self) -> Vec<DocumentInfo> {
        self.chunks.documents()
    }

    /// Answers a student's question and records it in their history.
    pub fn ask(&self, session: &mut Session, question: &str) -> Result<Answer, RagError> {
        let username = require_role(session, Role::Student)?.to_string();
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::Validation("Please enter a question.".to_string()));
        }

        let corpus = self.chunks.all_chunks();
        let results = match self.retriever.retrieve(&corpus, question, self.cfg.top_k) {
            Ok(results) => results,
            Err(err) => {
                warn!(error = %err, "retrieval failed, continuing without local context");
                vec![]
            }
        };
        let answer = self.composer.compose(question, &results);

        self.history
            .append(&username, question, &answer.text, answer.source_label().as_deref())?;
        session.remember_query(question);
        Ok(answer)
    }

    pub fn history(&self, session: &Session) -> Result<Vec<HistoryEntry>, RagError> {
        let username = session
            .username()
            .ok_or_else(|| RagError::Forbidden("Please log in first.".to_string()))?;
        Ok(self.history.entries(username))
    }
}

fn require_admin(session: &Session) -> Result<(), RagError> {
    if session.admin {
        Ok(())
    } else {
        Err(RagError::Forbidden("Admin login required.".to_string()))
    }
}

fn require_role(session: &Session, role: Role) -> Result<&str, RagError> {
    match &session.user {
        Some(user) if user.role == role => Ok(user.username.as_str()),
        Some(_) => Err(RagError::Forbidden(match role {
            Role::Student => "Only students can ask questions.".to_string(),
            Role::Lecturer => "Only lecturers can upload documents.".to_string(),
        })),
        None => Err(RagError::Forbidden("Please log in first.".to_string())),
    }
}
