use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid HTTP method \"{0}\"")]
    InvalidMethod(String),

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Db(#[from] brandlens_db::DbError),
}
