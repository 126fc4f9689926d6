//! Web search tool backed by the Tavily search API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::core::config::SearchConfig;
use crate::core::{Result, Snippet, TwinError};

/// A search capability the registry can expose to the model
#[async_trait]
pub trait SearchTool: Send + Sync {
    /// Run `query`, returning at most `max_results` snippets
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Snippet>>;
}

/// Tavily REST client
pub struct TavilySearch {
    client: Client,
    endpoint: Url,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f64>,
}

impl From<SearchHit> for Snippet {
    fn from(hit: SearchHit) -> Self {
        Snippet {
            title: hit.title,
            url: hit.url,
            content: hit.content,
            score: hit.score,
        }
    }
}

impl TavilySearch {
    /// Create a client from configuration, reading the API key from the environment
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        Self::new(&config.base_url, config.api_key()?)
    }

    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(base_url)
            .and_then(|u| u.join("search"))
            .map_err(|e| TwinError::config(format!("Invalid search endpoint {}: {}", base_url, e)))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl SearchTool for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Snippet>> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&SearchRequest {
                query,
                max_results,
                search_depth: "basic",
            })
            .send()
            .await
            .map_err(|e| TwinError::tool(format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TwinError::tool(format!(
                "Search API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| TwinError::tool(format!("Failed to parse search response: {}", e)))?;

        Ok(parsed
            .results
            .into_iter()
            .take(max_results)
            .map(Snippet::from)
            .collect())
    }
}
