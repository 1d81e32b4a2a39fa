use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::RagError;
use crate::http::{get_json, get_raw};

const MAX_CANDIDATES: usize = 5;

/// A short encyclopedia article summary.
#[derive(Clone, Debug, PartialEq)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub summary: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    Found(Article),
    /// The topic matched several articles; holds candidate titles.
    Disambiguation(Vec<String>),
    NotFound,
}

pub trait Encyclopedia: Send + Sync {
    fn lookup(&self, topic: &str) -> Result<Lookup, RagError>;
}

#[derive(Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
pub struct PageSummary {
    #[serde(rename = "type", default)]
    kind: String,
    title: String,
    #[serde(default)]
    extract: String,
    content_urls: Option<ContentUrls>,
}

#[derive(Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrl>,
}

#[derive(Deserialize)]
struct PageUrl {
    page: String,
}

/// Wikipedia client: a title search followed by the REST page summary.
pub struct Wikipedia {
    base_url: String,
    timeout: Duration,
    sentences: usize,
}

impl Wikipedia {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            base_url: cfg.wiki_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(cfg.wiki_timeout_secs),
            sentences: cfg.wiki_sentences,
        }
    }

    fn search(&self, topic: &str) -> Result<Vec<String>, RagError> {
        let limit = MAX_CANDIDATES.to_string();
        let url = Url::parse_with_params(
            &format!("{}/w/api.php", self.base_url),
            &[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", topic),
                ("srlimit", limit.as_str()),
                ("format", "json"),
            ],
        )
        .map_err(|e| RagError::http(&self.base_url, e.to_string()))?;
        let res = get_json::<SearchResponse>(url.as_str(), self.timeout)?;
        Ok(res
            .query
            .map(|q| q.search.into_iter().map(|h| h.title).collect())
            .unwrap_or_default())
    }

    fn summary(&self, title: &str) -> Result<Option<PageSummary>, RagError> {
        let mut url = Url::parse(&format!("{}/api/rest_v1/page/summary/", self.base_url))
            .map_err(|e| RagError::http(&self.base_url, e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| RagError::http(&self.base_url, "base url cannot hold a path"))?
            .pop_if_empty()
            .push(&title.replace(' ', "_"));
        let res = get_raw(url.as_str(), self.timeout)?;
        if res.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !res.status.is_success() {
            return Err(RagError::http(url.as_str(), format!("GET failed: {}", res.status)));
        }
        let summary = serde_json::from_str::<PageSummary>(&res.body)
            .map_err(|e| RagError::Decode(format!("summary for {}: {}", title, e)))?;
        Ok(Some(summary))
    }
}

impl Encyclopedia for Wikipedia {
    fn lookup(&self, topic: &str) -> Result<Lookup, RagError> {
        let titles = self.search(topic)?;
        let Some(best) = titles.first() else {
            debug!(topic, "no encyclopedia search hits");
            return Ok(Lookup::NotFound);
        };
        let Some(summary) = self.summary(best)? else {
            return Ok(Lookup::NotFound);
        };
        let lookup = interpret_summary(summary, &titles, self.sentences);
        if let Lookup::Found(article) = &lookup {
            info!(topic, title = %article.title, "encyclopedia article found");
        }
        Ok(lookup)
    }
}

/// Maps a page summary onto a lookup outcome. `search_titles` supplies the
/// candidate list when the page turns out to be a disambiguation page.
pub fn interpret_summary(summary: PageSummary, search_titles: &[String], sentences: usize) -> Lookup {
    if summary.kind == "disambiguation" {
        let candidates = search_titles
            .iter()
            .filter(|t| **t != summary.title)
            .take(MAX_CANDIDATES)
            .cloned()
            .collect();
        return Lookup::Disambiguation(candidates);
    }
    let text = first_sentences(&summary.extract, sentences);
    if text.is_empty() {
        return Lookup::NotFound;
    }
    let url = summary
        .content_urls
        .and_then(|u| u.desktop)
        .map(|d| d.page)
        .unwrap_or_default();
    Lookup::Found(Article {
        title: summary.title,
        url,
        summary: text,
    })
}

/// Keeps the first `n` sentences. A sentence ends at `.`, `!` or `?` followed by
/// whitespace or the end of the text.
pub fn first_sentences(text: &str, n: usize) -> String {
    let text = text.trim();
    if n == 0 {
        return String::new();
    }
    let mut count = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                count += 1;
                if count == n {
                    return text[..idx + ch.len_utf8()].to_string();
                }
            }
        }
    }
    text.to_string()
}
