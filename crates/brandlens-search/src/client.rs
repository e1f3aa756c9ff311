//! HTTP client for the `OpenAI` Responses API with the web-search tool.
//!
//! [`SearchClient::check`] is the entry point used by mention checks: it never
//! fails and turns any upstream error into a degraded [`MentionOutcome`], so a
//! failed search still produces a record.

use std::time::Duration;

use chrono::{Datelike, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use serde_json::{json, Value};

use crate::citations::{extract_answer_text, extract_citations};
use crate::error::SearchError;
use crate::mention::{extract_evidence, infer_mention, mention_position};
use crate::prompts::{fallback_queries, onboarding_prompt, parse_query_lines};
use crate::retry::retry_with_backoff;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BACKOFF_BASE_SECS: u64 = 2;
const ERROR_BODY_LIMIT: usize = 500;

/// Evidence stored when the search call itself failed.
pub const SEARCH_FAILED_EVIDENCE: &str = "Search failed";

/// Result of one brand/query check.
#[derive(Debug, Clone, Serialize)]
pub struct MentionOutcome {
    pub mentioned: bool,
    pub evidence: String,
    pub position: Option<i32>,
    pub source_urls: Vec<String>,
    /// Full response envelope, or `{"error": ...}` when the search failed.
    pub raw_output: Value,
    /// `true` when the search call failed and the outcome is the degraded default.
    pub search_failed: bool,
}

impl MentionOutcome {
    /// Classifies a successful response envelope.
    #[must_use]
    pub fn from_envelope(brand: &str, envelope: Value) -> Self {
        let text = extract_answer_text(&envelope);
        let mentioned = infer_mention(&text, brand);
        Self {
            mentioned,
            evidence: extract_evidence(&text, brand),
            position: if mentioned {
                mention_position(&text, brand)
            } else {
                None
            },
            source_urls: extract_citations(&envelope),
            raw_output: envelope,
            search_failed: false,
        }
    }

    /// The outcome recorded when the upstream search failed.
    #[must_use]
    pub fn failed(error: &SearchError) -> Self {
        Self {
            mentioned: false,
            evidence: SEARCH_FAILED_EVIDENCE.to_string(),
            position: None,
            source_urls: Vec::new(),
            raw_output: json!({ "error": error.to_string() }),
            search_failed: true,
        }
    }
}

/// Client for the Responses API.
///
/// Use [`SearchClient::new`] for production or [`SearchClient::with_base_url`]
/// to point at a mock server in tests.
#[derive(Clone)]
pub struct SearchClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl SearchClient {
    /// Creates a client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Result<Self, SearchError> {
        Self::with_base_url(api_key, model, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`SearchError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        api_key: &str,
        model: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| SearchError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            base_url: parsed,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
        })
    }

    /// Overrides the retry policy for transient failures.
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, backoff_base_secs: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_secs = backoff_base_secs;
        self
    }

    /// Asks the model `query` with web search enabled and classifies the
    /// answer for `brand`. Never fails; upstream errors yield
    /// [`MentionOutcome::failed`].
    pub async fn check(&self, brand: &str, query: &str) -> MentionOutcome {
        let body = json!({
            "model": self.model,
            "input": query,
            "tools": [{ "type": "web_search_preview" }],
        });

        match self.respond(&body).await {
            Ok(envelope) => {
                let outcome = MentionOutcome::from_envelope(brand, envelope);
                tracing::debug!(
                    brand,
                    mentioned = outcome.mentioned,
                    sources = outcome.source_urls.len(),
                    "search check completed"
                );
                outcome
            }
            Err(err) => {
                tracing::warn!(brand, error = %err, "search check failed; recording degraded result");
                MentionOutcome::failed(&err)
            }
        }
    }

    /// Suggests `count` search queries worth tracking for a new brand.
    ///
    /// Falls back to templated queries when the model call fails or returns
    /// nothing usable.
    pub async fn suggest_queries(&self, brand: &str, industry: &str, count: usize) -> Vec<String> {
        let body = json!({
            "model": self.model,
            "input": onboarding_prompt(brand, industry, count),
        });

        let year = Utc::now().year();
        match self.respond(&body).await {
            Ok(envelope) => {
                let mut queries = parse_query_lines(&extract_answer_text(&envelope));
                queries.truncate(count);
                if queries.is_empty() {
                    tracing::warn!(brand, "model returned no usable queries; using templates");
                    return fallback_queries(brand, industry, count, year);
                }
                queries
            }
            Err(err) => {
                tracing::warn!(brand, error = %err, "query suggestion failed; using templates");
                fallback_queries(brand, industry, count, year)
            }
        }
    }

    /// POSTs `body` to `/v1/responses` with retries and returns the envelope.
    ///
    /// # Errors
    ///
    /// - [`SearchError::MissingApiKey`] if no key is configured.
    /// - [`SearchError::RateLimited`] / [`SearchError::UnexpectedStatus`] on non-2xx.
    /// - [`SearchError::Http`] on network failure.
    /// - [`SearchError::Deserialize`] if the body is not JSON.
    pub async fn respond(&self, body: &Value) -> Result<Value, SearchError> {
        if self.api_key.trim().is_empty() {
            return Err(SearchError::MissingApiKey);
        }
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            self.post_once(body)
        })
        .await
    }

    fn responses_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("{}v1/responses", self.base_url.path()));
        url
    }

    async fn post_once(&self, body: &Value) -> Result<Value, SearchError> {
        let response = self
            .client
            .post(self.responses_url())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0);
            return Err(SearchError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SearchError::UnexpectedStatus {
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| SearchError::Deserialize {
            context: "responses".to_string(),
            source: e,
        })
    }
}
