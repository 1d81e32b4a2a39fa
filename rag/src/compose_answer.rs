use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::build_prompt::{build_grounded_prompt, build_open_prompt};
use crate::encyclopedia::{Encyclopedia, Lookup};
use crate::generate::Generator;
use crate::retrieve_chunks::QueryResult;

pub const NO_CONTENT_ANSWER: &str = "No relevant content found for your question.";

/// Where an answer came from.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceLabel {
    Generated {
        model: String,
        grounded_on: Vec<(String, u32)>,
    },
    Excerpt {
        document: String,
        page: u32,
    },
    Encyclopedia {
        title: String,
        url: String,
    },
}

impl fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLabel::Generated { model, grounded_on } if grounded_on.is_empty() => {
                write!(f, "Source: {} (general knowledge, no course material matched)", model)
            }
            SourceLabel::Generated { model, grounded_on } => {
                let refs: Vec<String> = grounded_on
                    .iter()
                    .map(|(doc, page)| format!("{} (Page {})", doc, page))
                    .collect();
                write!(f, "Source: {} grounded on {}", model, refs.join(", "))
            }
            SourceLabel::Excerpt { document, page } => write!(f, "Source: {} (Page {})", document, page),
            SourceLabel::Encyclopedia { title, url } => write!(f, "Source: Wikipedia - {} ({})", title, url),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// `None` only for the no-content sentinel.
    pub source: Option<SourceLabel>,
    /// Encyclopedia disambiguation candidates, when the topic was ambiguous.
    pub candidates: Vec<String>,
}

impl Answer {
    fn sourced(text: String, source: SourceLabel) -> Self {
        Self {
            text,
            source: Some(source),
            candidates: vec![],
        }
    }

    pub fn no_content(candidates: Vec<String>) -> Self {
        Self {
            text: NO_CONTENT_ANSWER.to_string(),
            source: None,
            candidates,
        }
    }

    pub fn is_no_content(&self) -> bool {
        self.source.is_none()
    }

    pub fn source_label(&self) -> Option<String> {
        self.source.as_ref().map(ToString::to_string)
    }
}

/// Picks one answer strategy per question: grounded generation, then the raw
/// best excerpt, then (with no local hits) open generation, the encyclopedia and
/// finally the sentinel. Never fails.
pub struct AnswerComposer {
    generator: Box<dyn Generator>,
    encyclopedia: Box<dyn Encyclopedia>,
    system_prompt: String,
    generation_enabled: bool,
}

impl AnswerComposer {
    pub fn new(
        generator: Box<dyn Generator>,
        encyclopedia: Box<dyn Encyclopedia>,
        system_prompt: impl Into<String>,
        generation_enabled: bool,
    ) -> Self {
        Self {
            generator,
            encyclopedia,
            system_prompt: system_prompt.into(),
            generation_enabled,
        }
    }

    pub fn compose(&self, question: &str, results: &[QueryResult]) -> Answer {
        match results.first() {
            Some(best) => self.grounded(question, results).unwrap_or_else(|| {
                info!(document = %best.source_document, page = best.page_number, "answering with raw excerpt");
                Answer::sourced(
                    best.chunk_text.clone(),
                    SourceLabel::Excerpt {
                        document: best.source_document.clone(),
                        page: best.page_number,
                    },
                )
            }),
            None => self.external(question),
        }
    }

    fn grounded(&self, question: &str, results: &[QueryResult]) -> Option<Answer> {
        let prompt = build_grounded_prompt(&self.system_prompt, question, results);
        let text = self.try_generate(&prompt)?;
        info!(model = self.generator.model(), excerpts = results.len(), "answering with grounded generation");
        Some(Answer::sourced(
            text,
            SourceLabel::Generated {
                model: self.generator.model().to_string(),
                grounded_on: results
                    .iter()
                    .map(|r| (r.source_document.clone(), r.page_number))
                    .collect(),
            },
        ))
    }

    fn external(&self, question: &str) -> Answer {
        if let Some(text) = self.try_generate(&build_open_prompt(question)) {
            info!(model = self.generator.model(), "answering with open generation");
            return Answer::sourced(
                text,
                SourceLabel::Generated {
                    model: self.generator.model().to_string(),
                    grounded_on: vec![],
                },
            );
        }

        match self.encyclopedia.lookup(question) {
            Ok(Lookup::Found(article)) => Answer::sourced(
                article.summary,
                SourceLabel::Encyclopedia {
                    title: article.title,
                    url: article.url,
                },
            ),
            Ok(Lookup::Disambiguation(candidates)) => {
                info!(question, candidates = candidates.len(), "encyclopedia topic is ambiguous");
                Answer::no_content(candidates)
            }
            Ok(Lookup::NotFound) => {
                info!(question, "no encyclopedia page found");
                Answer::no_content(vec![])
            }
            Err(err) => {
                warn!(error = %err, "encyclopedia lookup failed");
                Answer::no_content(vec![])
            }
        }
    }

    /// Empty output counts as a failure so the caller falls through.
    fn try_generate(&self, prompt: &str) -> Option<String> {
        if !self.generation_enabled {
            return None;
        }
        match self.generator.generate(prompt) {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                warn!(model = self.generator.model(), "generation returned no text");
                None
            }
            Err(err) => {
                warn!(error = %err, "generation endpoint unavailable");
                None
            }
        }
    }
}
