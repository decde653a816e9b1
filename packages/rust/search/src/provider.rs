//! Search provider seam and the Google Custom Search JSON API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use dossier_shared::{DossierError, Result, SearchProviderConfig};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("Dossier/", env!("CARGO_PKG_VERSION"));

/// The Custom Search API rejects `num` outside 1..=10.
const MAX_RESULTS_PER_REQUEST: usize = 10;

/// Longest error body we carry into an error message.
const ERROR_BODY_LIMIT: usize = 200;

/// A raw search hit as returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Check credentials before a run starts. Failure is run-fatal.
    fn ensure_configured(&self) -> Result<()>;

    /// Run one query, returning at most `max_results` hits in provider order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

// ---------------------------------------------------------------------------
// Google Custom Search
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CustomSearchResponse {
    /// Absent when the query matched nothing.
    #[serde(default)]
    items: Vec<CustomSearchItem>,
}

#[derive(Debug, Deserialize)]
struct CustomSearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

/// Client for the Google Custom Search JSON API.
pub struct GoogleSearchProvider {
    config: SearchProviderConfig,
    client: Client,
}

impl GoogleSearchProvider {
    /// Build a client. Credentials are checked later by [`SearchProvider::ensure_configured`].
    pub fn new(config: SearchProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DossierError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn ensure_configured(&self) -> Result<()> {
        self.config.validate()
    }

    #[instrument(skip_all, fields(query = %query))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let num = max_results.clamp(1, MAX_RESULTS_PER_REQUEST).to_string();

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("cx", self.config.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DossierError::Network(format!("search request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DossierError::Network(format!("failed to read search body: {e}")))?;

        if !status.is_success() {
            return Err(DossierError::Provider {
                status: status.as_u16(),
                message: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        let parsed = parse_response(&body)?;
        debug!(hits = parsed.len(), "search response parsed");

        Ok(parsed.into_iter().take(max_results).collect())
    }
}

/// Decode a Custom Search body into hits.
fn parse_response(body: &str) -> Result<Vec<SearchHit>> {
    let parsed: CustomSearchResponse = serde_json::from_str(body)
        .map_err(|e| DossierError::InvalidResponse(format!("malformed search payload: {e}")))?;

    Ok(parsed
        .items
        .into_iter()
        .map(|item| SearchHit {
            title: item.title,
            snippet: item.snippet,
            link: item.link,
        })
        .collect())
}

/// Cut `text` to at most `max_chars` characters.
fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
