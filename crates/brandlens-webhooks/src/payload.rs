//! Webhook payload rendering: custom templates with `{{placeholder}}`
//! substitution, or the default `{event, timestamp, data}` envelope.

use std::sync::LazyLock;

use brandlens_core::MentionEvent;
use brandlens_db::MentionRow;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// The mention data carried in a webhook's `data` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookMention {
    pub id: Option<Uuid>,
    pub tracker_id: Option<Uuid>,
    pub brand: String,
    pub query: String,
    pub mentioned: bool,
    pub position: Option<i32>,
    pub evidence: String,
    pub source_urls: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl From<&MentionRow> for WebhookMention {
    fn from(row: &MentionRow) -> Self {
        Self {
            id: Some(row.id),
            tracker_id: row.tracker_id,
            brand: row.brand.clone(),
            query: row.query.clone(),
            mentioned: row.mentioned,
            position: row.position,
            evidence: row.evidence.clone(),
            source_urls: row.source_urls.clone(),
            checked_at: row.created_at,
        }
    }
}

impl WebhookMention {
    /// Synthetic mention used by test deliveries.
    #[must_use]
    pub fn sample(now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            tracker_id: None,
            brand: "Acme".to_string(),
            query: "best anvil brands".to_string(),
            mentioned: true,
            position: Some(1),
            evidence: "1. Acme: the classic anvil maker".to_string(),
            source_urls: vec!["https://reviews.example.net/anvils".to_string()],
            checked_at: now,
        }
    }
}

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid regex"));

/// Escapes `value` for insertion inside a JSON string literal.
fn json_escaped(value: &str) -> String {
    let quoted = serde_json::to_string(value).unwrap_or_default();
    quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or_default()
        .to_string()
}

fn render_template(template: &Value, mention: &WebhookMention, timestamp: &str) -> Option<Value> {
    // A string template holds raw JSON text, so placeholders may sit outside quotes.
    let text = match template {
        Value::String(raw) => raw.clone(),
        other => serde_json::to_string(other).ok()?,
    };
    let position = mention
        .position
        .map_or_else(|| "null".to_string(), |p| p.to_string());

    // Single pass: substituted values are never scanned for placeholders again.
    let rendered = PLACEHOLDER_RE.replace_all(&text, |caps: &Captures<'_>| match &caps[1] {
        "brand" => json_escaped(&mention.brand),
        "query" => json_escaped(&mention.query),
        "mentioned" => mention.mentioned.to_string(),
        "position" => position.clone(),
        "evidence" => json_escaped(&mention.evidence),
        "timestamp" => timestamp.to_string(),
        _ => caps[0].to_string(),
    });

    serde_json::from_str(&rendered).ok()
}

/// Builds the JSON body for one delivery.
///
/// With a template, placeholders are substituted into the template's JSON
/// text and the result re-parsed; a template that no longer parses (or a
/// `null` template) falls back to the default envelope. A string template is
/// taken as the JSON text itself.
#[must_use]
pub fn build_payload(
    template: Option<&Value>,
    event: MentionEvent,
    mention: &WebhookMention,
    now: DateTime<Utc>,
) -> Value {
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

    if let Some(template) = template.filter(|t| !t.is_null()) {
        if let Some(rendered) = render_template(template, mention, &timestamp) {
            return rendered;
        }
        tracing::debug!(event = %event, "payload template did not render to JSON, using default");
    }

    json!({
        "event": event.as_str(),
        "timestamp": timestamp,
        "data": mention,
    })
}
