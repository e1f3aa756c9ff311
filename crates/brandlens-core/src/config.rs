use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_CONTACT_USER_AGENT: &str = "BrandLens-ContactBot/1.0 (+https://brandlens.app/bot)";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be driven by a plain
/// `HashMap` in tests.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("BRANDLENS_ENV", "development"))?;

    let supabase_jwt_secret = optional("SUPABASE_JWT_SECRET");
    if supabase_jwt_secret.is_none() && env != Environment::Development {
        return Err(ConfigError::MissingEnvVar("SUPABASE_JWT_SECRET".to_string()));
    }

    let bind_addr = parse("BRANDLENS_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("BRANDLENS_LOG_LEVEL", "info");
    let app_url = or_default("BRANDLENS_APP_URL", "http://localhost:3000")
        .trim_end_matches('/')
        .to_string();

    let db_max_connections = parse_u32("BRANDLENS_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("BRANDLENS_DB_MIN_CONNECTIONS", "1")?;
    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "BRANDLENS_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        });
    }
    let db_acquire_timeout_secs = parse_u64("BRANDLENS_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let openai_api_key = optional("OPENAI_API_KEY");
    let openai_base_url = or_default("OPENAI_BASE_URL", "https://api.openai.com");
    let search_model = or_default("BRANDLENS_SEARCH_MODEL", "gpt-4o-mini");
    let search_timeout_secs = parse_u64("BRANDLENS_SEARCH_TIMEOUT_SECS", "60")?;
    let search_max_retries = parse_u32("BRANDLENS_SEARCH_MAX_RETRIES", "2")?;
    let search_backoff_base_secs = parse_u64("BRANDLENS_SEARCH_BACKOFF_BASE_SECS", "2")?;

    let contact_timeout_secs = parse_u64("BRANDLENS_CONTACT_TIMEOUT_SECS", "10")?;
    let contact_user_agent = or_default("BRANDLENS_CONTACT_USER_AGENT", DEFAULT_CONTACT_USER_AGENT);
    let contact_delay_ms = parse_u64("BRANDLENS_CONTACT_DELAY_MS", "1000")?;

    let webhook_timeout_secs = parse_u64("BRANDLENS_WEBHOOK_TIMEOUT_SECS", "10")?;

    let tracker_poll_cron = or_default("BRANDLENS_TRACKER_POLL_CRON", "0 */5 * * * *");
    let tracker_poll_delay_ms = parse_u64("BRANDLENS_TRACKER_POLL_DELAY_MS", "1000")?;

    let stripe_secret_key = optional("STRIPE_SECRET_KEY");
    let stripe_webhook_secret = optional("STRIPE_WEBHOOK_SECRET");
    let stripe_base_url = or_default("STRIPE_BASE_URL", "https://api.stripe.com");
    let stripe_price_pro = optional("STRIPE_PRICE_PRO");
    let stripe_price_business = optional("STRIPE_PRICE_BUSINESS");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        app_url,
        supabase_jwt_secret,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        openai_api_key,
        openai_base_url,
        search_model,
        search_timeout_secs,
        search_max_retries,
        search_backoff_base_secs,
        contact_timeout_secs,
        contact_user_agent,
        contact_delay_ms,
        webhook_timeout_secs,
        tracker_poll_cron,
        tracker_poll_delay_ms,
        stripe_secret_key,
        stripe_webhook_secret,
        stripe_base_url,
        stripe_price_pro,
        stripe_price_business,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "BRANDLENS_ENV".to_string(),
            reason: format!("expected development, test, or production, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
