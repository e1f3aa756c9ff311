//! Command handlers for the CLI.
//!
//! `check`, `suggest` and `contacts` talk to external services only and
//! print their results. `poll` runs the same tracker pass as the server's
//! scheduler against the configured database.

use std::time::Duration;

use brandlens_core::AppConfig;
use brandlens_scraper::{ContactExtractor, ExtractedContact};
use brandlens_search::MentionOutcome;
use brandlens_server::checks::{search_client, CheckService};
use brandlens_webhooks::Dispatcher;
use sqlx::PgPool;

pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let pool_config = brandlens_db::PoolConfig::from_app_config(config);
    Ok(brandlens_db::connect_pool(&config.database_url, pool_config).await?)
}

/// One-line summary of a check for terminal output.
pub(crate) fn format_outcome(brand: &str, outcome: &MentionOutcome) -> String {
    let mut out = if outcome.search_failed {
        format!("{brand}: search failed")
    } else if outcome.mentioned {
        match outcome.position {
            Some(position) => format!("{brand}: mentioned (position {position})"),
            None => format!("{brand}: mentioned"),
        }
    } else {
        format!("{brand}: not mentioned")
    };
    out.push_str(&format!("\n  evidence: {}", outcome.evidence));
    for url in &outcome.source_urls {
        out.push_str(&format!("\n  source: {url}"));
    }
    out
}

/// Most useful identifying field of a contact for the table view.
pub(crate) fn contact_summary(contact: &ExtractedContact) -> String {
    let handle = contact
        .email
        .as_deref()
        .or(contact.phone.as_deref())
        .or(contact.linkedin_url.as_deref())
        .or(contact.twitter_url.as_deref())
        .or(contact.author_name.as_deref())
        .unwrap_or("-");
    format!(
        "{:>3}  {:<13} {:<40} {}",
        contact.confidence,
        contact.extraction_method.as_str(),
        handle,
        contact.source_url
    )
}

/// Runs a single mention check and prints the outcome.
///
/// # Errors
///
/// Returns an error if the search client cannot be built or the outcome
/// cannot be serialised. A failed search is printed, not returned.
pub(crate) async fn run_check(
    config: &AppConfig,
    brand: &str,
    query: &str,
    json: bool,
) -> anyhow::Result<()> {
    if config.openai_api_key.is_none() {
        eprintln!("warning: OPENAI_API_KEY is not set; the check will fail");
    }
    let outcome = search_client(config)?.check(brand, query).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", format_outcome(brand, &outcome));
    }
    Ok(())
}

/// Prints suggested queries, one per line.
///
/// # Errors
///
/// Returns an error if the search client cannot be built.
pub(crate) async fn run_suggest(
    config: &AppConfig,
    brand: &str,
    industry: &str,
    count: usize,
) -> anyhow::Result<()> {
    let queries = search_client(config)?
        .suggest_queries(brand, industry, count.clamp(1, 10))
        .await;
    for query in queries {
        println!("{query}");
    }
    Ok(())
}

/// Extracts contacts from `urls` one page at a time and prints them.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub(crate) async fn run_contacts(
    config: &AppConfig,
    urls: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let extractor = ContactExtractor::new(config.contact_timeout_secs, &config.contact_user_agent)
        .map_err(|e| anyhow::anyhow!("failed to build contact extractor: {e}"))?;
    let contacts = extractor
        .extract_batch(urls, Duration::from_millis(config.contact_delay_ms))
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&contacts)?);
        return Ok(());
    }
    if contacts.is_empty() {
        println!("no contacts found");
        return Ok(());
    }
    println!("conf  method        contact                                  source");
    for contact in &contacts {
        println!("{}", contact_summary(contact));
    }
    Ok(())
}

/// Checks every due tracker once, waiting for webhook deliveries before
/// returning so the process can exit cleanly.
///
/// # Errors
///
/// Returns an error if a client cannot be built or due trackers cannot be listed.
pub(crate) async fn run_poll(pool: PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::new(pool.clone(), config.webhook_timeout_secs)?;
    let checks = CheckService::new(pool, search_client(config)?, dispatcher).waiting_for_webhooks();

    let summary = checks
        .poll_due_trackers(Duration::from_millis(config.tracker_poll_delay_ms))
        .await?;
    println!(
        "due {}, checked {}, skipped {}, failed {}",
        summary.due, summary.checked, summary.skipped, summary.failed
    );
    Ok(())
}
