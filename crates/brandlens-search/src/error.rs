use thiserror::Error;

/// Errors returned by the search API client.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429 from the search API.
    #[error("rate limited by search API (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// Any other non-2xx status. `body` is truncated.
    #[error("unexpected HTTP status {status} from search API: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("search API key is not configured")]
    MissingApiKey,

    #[error("invalid search base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
