//! Top headlines from NewsAPI

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Errors from the news provider
#[derive(Debug, thiserror::Error)]
pub enum NewsError {
    #[error("News API key is not configured (set {0}).")]
    MissingApiKey(String),

    #[error("Failed to fetch news.")]
    Http(u16),

    #[error("Failed to fetch news.")]
    Transport(String),
}

/// One headline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct HeadlinesResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

/// Fetches current headlines
pub trait NewsProvider: Send {
    fn top_headlines(&self, api_key: &str, country: &str) -> Result<Vec<Article>, NewsError>;
}

/// NewsAPI `top-headlines` client
pub struct NewsApiClient {
    endpoint: String,
}

impl NewsApiClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl NewsProvider for NewsApiClient {
    fn top_headlines(&self, api_key: &str, country: &str) -> Result<Vec<Article>, NewsError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("deskmate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NewsError::Transport(e.to_string()))?;

        let response = client
            .get(&self.endpoint)
            .query(&[("country", country), ("apiKey", api_key)])
            .send()
            .map_err(|e| NewsError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "news request rejected");
            return Err(NewsError::Http(response.status().as_u16()));
        }

        let body: HeadlinesResponse = response
            .json()
            .map_err(|e| NewsError::Transport(e.to_string()))?;
        debug!(articles = body.articles.len(), "headlines fetched");
        Ok(body.articles)
    }
}

/// Render headlines as numbered popup text
pub fn format_headlines(articles: &[Article]) -> String {
    if articles.is_empty() {
        return "No articles found.".to_string();
    }

    let mut text = String::new();
    for (idx, article) in articles.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", idx + 1, article.title));
        text.push_str(&format!(
            "   {}\n",
            article.description.as_deref().unwrap_or_default()
        ));
        text.push_str(&format!("   Read more: {}\n\n", article.url));
    }
    text
}
