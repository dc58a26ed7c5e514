//! Page summaries from Wikipedia
//!
//! The query is resolved to a page title with `opensearch`, then the
//! plain-text intro is fetched with `prop=extracts`, limited to the
//! requested number of sentences by the API itself. Article links come
//! back in the same request and become the options of a
//! disambiguation page.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

/// Errors from the page-summary provider
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("Page not found.")]
    NotFound,

    #[error("Disambiguation error: {}", .0.join(", "))]
    Disambiguation(Vec<String>),

    #[error("Wikipedia request failed: {0}")]
    Transport(String),

    #[error("Wikipedia returned HTTP {0}")]
    Http(u16),
}

impl From<reqwest::Error> for SummaryError {
    fn from(e: reqwest::Error) -> Self {
        SummaryError::Transport(e.to_string())
    }
}

/// Summarizes the page best matching a query
pub trait PageSummary: Send {
    fn summarize(&self, query: &str, sentences: usize, language: &str)
        -> Result<String, SummaryError>;
}

/// MediaWiki action API client
pub struct WikipediaClient {
    timeout: Duration,
}

impl WikipediaClient {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(15),
        }
    }

    fn api_url(language: &str) -> String {
        format!("https://{}.wikipedia.org/w/api.php", language)
    }
}

impl Default for WikipediaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSummary for WikipediaClient {
    fn summarize(
        &self,
        query: &str,
        sentences: usize,
        language: &str,
    ) -> Result<String, SummaryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("deskmate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let api = Self::api_url(language);

        let response = client
            .get(&api)
            .query(&[
                ("action", "opensearch"),
                ("search", query),
                ("limit", "10"),
                ("namespace", "0"),
                ("format", "json"),
            ])
            .send()?;
        if !response.status().is_success() {
            return Err(SummaryError::Http(response.status().as_u16()));
        }
        let candidates = parse_search_titles(&response.json::<Value>()?);
        let title = candidates.first().ok_or(SummaryError::NotFound)?;
        debug!(%query, %title, candidates = candidates.len(), "resolved page title");

        let sentences = sentences.max(1).to_string();
        let response = client
            .get(&api)
            .query(&[
                ("action", "query"),
                ("prop", "extracts|pageprops|links"),
                ("plnamespace", "0"),
                ("pllimit", "max"),
                ("exsentences", sentences.as_str()),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title.as_str()),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .send()?;
        if !response.status().is_success() {
            return Err(SummaryError::Http(response.status().as_u16()));
        }

        parse_extract(&response.json::<Value>()?, &candidates)
    }
}

/// Titles from an opensearch response: `[query, [titles], [descs], [urls]]`
fn parse_search_titles(payload: &Value) -> Vec<String> {
    payload
        .get(1)
        .and_then(Value::as_array)
        .map(|titles| {
            titles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_extract(payload: &Value, candidates: &[String]) -> Result<String, SummaryError> {
    let page = payload
        .pointer("/query/pages/0")
        .ok_or(SummaryError::NotFound)?;

    if page.get("missing").and_then(Value::as_bool).unwrap_or(false) {
        return Err(SummaryError::NotFound);
    }

    if page.pointer("/pageprops/disambiguation").is_some() {
        let title = page.get("title").and_then(Value::as_str).unwrap_or_default();
        let mut options: Vec<String> = page
            .get("links")
            .and_then(Value::as_array)
            .map(|links| {
                links
                    .iter()
                    .filter_map(|link| link.get("title").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        // Link-less pages still offer the other search hits
        if options.is_empty() {
            options = candidates
                .iter()
                .filter(|candidate| candidate.as_str() != title)
                .cloned()
                .collect();
        }
        return Err(SummaryError::Disambiguation(options));
    }

    let extract = page
        .get("extract")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if extract.is_empty() {
        return Err(SummaryError::NotFound);
    }
    Ok(extract.to_string())
}
