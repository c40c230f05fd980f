//! # Search Module
//!
//! Web search for the research agent. The [`SearchBackend`] trait is the
//! provider seam; [`JinaSearch`] is the production backend. [`WebSearchTool`]
//! sits on top and owns the query templates for each research subject, runs
//! them one after another and merges the results by URL.
//!
//! A failed query never reaches the caller: it is logged and treated as zero
//! results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Per-query cap for the person, company and investor templates
const TEMPLATE_RESULTS: usize = 5;

// =============================================================================
// CUSTOM ERROR TYPE
// =============================================================================
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unauthorized - check JINA_API_KEY")]
    Unauthorized,

    #[error("Rate limited by search provider, please wait")]
    RateLimited,

    #[error("Search failed with HTTP {0}: {1}")]
    Http(u16, String),

    #[error("Failed to parse search response: {0}")]
    Parse(String),
}

// =============================================================================
// SEARCH RESULT STRUCT
// =============================================================================
/// A single search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub content: String,
    pub url: String,
}

impl SearchResult {
    fn is_blank(&self) -> bool {
        self.title.is_empty() && self.content.is_empty() && self.url.is_empty()
    }
}

// =============================================================================
// BACKEND TRAIT
// =============================================================================
/// A search provider.
///
/// # Rust Concept: async-trait
///
/// Async functions in traits cannot be used through `dyn` without help.
/// `#[async_trait]` boxes the returned future so the agent can hold a
/// `Box<dyn SearchBackend>` and tests can swap in a fake.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchResult>, SearchError>;
}

// =============================================================================
// JINA BACKEND
// =============================================================================
/// Jina search API (`https://s.jina.ai/<query>`).
pub struct JinaSearch {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct JinaResponse {
    #[serde(default)]
    data: Vec<JinaItem>,
}

#[derive(Debug, Deserialize)]
struct JinaItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<JinaItem> for SearchResult {
    fn from(item: JinaItem) -> Self {
        let content = item
            .content
            .filter(|c| !c.trim().is_empty())
            .or(item.description)
            .unwrap_or_default();
        SearchResult {
            title: item.title,
            content,
            url: item.url,
        }
    }
}

impl JinaSearch {
    pub fn new(config: &Config) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key: config.jina_api_key.clone(),
            base_url: config.search_base_url.clone(),
        })
    }

    fn endpoint(&self, query: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(query)
        )
    }
}

#[async_trait]
impl SearchBackend for JinaSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let url = self.endpoint(query);
        debug!(url = %url, "Fetching search results");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => SearchError::Unauthorized,
                429 => SearchError::RateLimited,
                code => SearchError::Http(code, body),
            });
        }

        let body = response.text().await?;
        let mut results = parse_response(&body)?;
        results.truncate(max_results);
        Ok(results)
    }
}

/// Parse a provider body: JSON when it looks like JSON, the line-oriented text
/// format otherwise.
fn parse_response(body: &str) -> Result<Vec<SearchResult>, SearchError> {
    if body.trim_start().starts_with('{') {
        let parsed: JinaResponse =
            serde_json::from_str(body).map_err(|e| SearchError::Parse(e.to_string()))?;
        return Ok(parsed.data.into_iter().map(SearchResult::from).collect());
    }
    Ok(parse_text_response(body))
}

/// Text format: a `**title**` line opens a result, an `http...` line is its
/// URL and anything else is appended to its content.
fn parse_text_response(body: &str) -> Vec<SearchResult> {
    let mut results = Vec::new();
    let mut current = SearchResult::default();

    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if line.contains("**") {
            if !current.is_blank() {
                results.push(std::mem::take(&mut current));
            }
            current.title = line.trim_matches('*').trim().to_string();
        } else if line.starts_with("http") {
            current.url = line.trim().to_string();
        } else {
            current.content.push_str(line);
            current.content.push(' ');
        }
    }

    if !current.is_blank() {
        results.push(current);
    }

    results
}

// =============================================================================
// QUERY TEMPLATES
// =============================================================================
fn person_queries(name: &str, company: Option<&str>) -> Vec<String> {
    let mut queries = vec![
        format!("\"{}\" bio profile", name),
        format!("\"{}\" background experience", name),
    ];
    if let Some(company) = company {
        queries.push(format!("\"{}\" \"{}\"", name, company));
    }
    queries
}

fn company_queries(company: &str) -> Vec<String> {
    vec![
        format!("\"{}\" company about", company),
        format!("\"{}\" business model", company),
        format!("\"{}\" funding investment", company),
    ]
}

fn social_queries(name: &str) -> Vec<String> {
    vec![
        format!("\"{}\" twitter tweet", name),
        format!("\"{}\" blog post article", name),
        format!("\"{}\" linkedin post", name),
        format!("\"{}\" medium article", name),
    ]
}

fn investor_queries(name: &str, firm: &str) -> Vec<String> {
    vec![
        format!("\"{}\" \"{}\" portfolio investments", name, firm),
        format!("\"{}\" investment thesis", name),
        format!("\"{}\" portfolio companies", firm),
        format!("\"{}\" investment focus areas", firm),
    ]
}

/// Keep the first result seen for each URL, in order. Results without a URL
/// are dropped.
pub fn deduplicate_results(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen_urls = HashSet::new();
    results
        .into_iter()
        .filter(|r| !r.url.is_empty() && seen_urls.insert(r.url.clone()))
        .collect()
}

// =============================================================================
// WEB SEARCH TOOL
// =============================================================================
/// Runs templated queries for a research subject against a [`SearchBackend`].
pub struct WebSearchTool {
    backend: Box<dyn SearchBackend>,
    max_results: usize,
    max_social_results: usize,
}

impl WebSearchTool {
    pub fn new(backend: Box<dyn SearchBackend>, config: &Config) -> Self {
        Self {
            backend,
            max_results: config.max_search_results,
            max_social_results: config.max_social_results,
        }
    }

    /// Run one query. `None` uses the configured default limit.
    ///
    /// Errors are logged and come back as an empty list.
    pub async fn search(&self, query: &str, max_results: Option<usize>) -> Vec<SearchResult> {
        let limit = max_results.unwrap_or(self.max_results);
        info!(query = %query, limit, "Performing web search");

        match self.backend.search(query, limit).await {
            Ok(mut results) => {
                results.truncate(limit);
                if results.is_empty() {
                    warn!(query = %query, "No search results found");
                } else {
                    info!(query = %query, count = results.len(), "Search completed");
                }
                results
            }
            Err(e) => {
                warn!(query = %query, error = %e, "Search failed, continuing without results");
                Vec::new()
            }
        }
    }

    pub async fn search_person(&self, name: &str, company: Option<&str>) -> Vec<SearchResult> {
        self.run_queries(&person_queries(name, company), TEMPLATE_RESULTS)
            .await
    }

    pub async fn search_company(&self, company: &str) -> Vec<SearchResult> {
        self.run_queries(&company_queries(company), TEMPLATE_RESULTS)
            .await
    }

    pub async fn search_social_content(&self, name: &str) -> Vec<SearchResult> {
        self.run_queries(&social_queries(name), self.max_social_results)
            .await
    }

    pub async fn search_investor(&self, name: &str, firm: &str) -> Vec<SearchResult> {
        self.run_queries(&investor_queries(name, firm), TEMPLATE_RESULTS)
            .await
    }

    /// Queries run strictly in sequence.
    async fn run_queries(&self, queries: &[String], per_query: usize) -> Vec<SearchResult> {
        let mut all_results = Vec::new();
        for query in queries {
            all_results.extend(self.search(query, Some(per_query)).await);
        }
        let merged = deduplicate_results(all_results);
        debug!(queries = queries.len(), unique = merged.len(), "Merged query results");
        merged
    }
}
