use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub app_url: String,
    /// HS256 secret used to verify Supabase access tokens. Optional only in development.
    pub supabase_jwt_secret: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub search_model: String,
    pub search_timeout_secs: u64,
    pub search_max_retries: u32,
    pub search_backoff_base_secs: u64,
    pub contact_timeout_secs: u64,
    pub contact_user_agent: String,
    pub contact_delay_ms: u64,
    pub webhook_timeout_secs: u64,
    pub tracker_poll_cron: String,
    pub tracker_poll_delay_ms: u64,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_base_url: String,
    pub stripe_price_pro: Option<String>,
    pub stripe_price_business: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[redacted]");
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("app_url", &self.app_url)
            .field("database_url", &"[redacted]")
            .field("supabase_jwt_secret", &redact(&self.supabase_jwt_secret))
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("search_model", &self.search_model)
            .field("search_timeout_secs", &self.search_timeout_secs)
            .field("search_max_retries", &self.search_max_retries)
            .field("search_backoff_base_secs", &self.search_backoff_base_secs)
            .field("contact_timeout_secs", &self.contact_timeout_secs)
            .field("contact_user_agent", &self.contact_user_agent)
            .field("contact_delay_ms", &self.contact_delay_ms)
            .field("webhook_timeout_secs", &self.webhook_timeout_secs)
            .field("tracker_poll_cron", &self.tracker_poll_cron)
            .field("tracker_poll_delay_ms", &self.tracker_poll_delay_ms)
            .field("stripe_secret_key", &redact(&self.stripe_secret_key))
            .field("stripe_webhook_secret", &redact(&self.stripe_webhook_secret))
            .field("stripe_base_url", &self.stripe_base_url)
            .field("stripe_price_pro", &self.stripe_price_pro)
            .field("stripe_price_business", &self.stripe_price_business)
            .finish()
    }
}

impl AppConfig {
    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self.env, Environment::Development)
    }
}
