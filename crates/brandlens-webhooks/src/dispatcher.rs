//! Delivery of one event to every qualifying integration, with per-attempt
//! logging and stats bookkeeping.

use std::time::{Duration, Instant};

use brandlens_core::{IntegrationLogStatus, MentionEvent};
use brandlens_db::{
    insert_integration_log, list_active_webhooks_for, record_delivery_failure,
    record_delivery_success, IntegrationRow, NewIntegrationLog,
};
use chrono::Utc;
use reqwest::{header, Client, Method};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::WebhookError;
use crate::filter::should_deliver;
use crate::payload::{build_payload, WebhookMention};
use crate::signing::{authorization_header, sign_payload, EVENT_HEADER, SIGNATURE_HEADER};

pub const WEBHOOK_USER_AGENT: &str = "BrandLens-Webhook/1.0";

const RESPONSE_BODY_LIMIT: usize = 1000;

/// Result of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl DeliveryOutcome {
    fn failed(error: String, duration_ms: u64) -> Self {
        Self {
            success: false,
            status_code: None,
            response_body: None,
            error: Some(error),
            duration_ms,
        }
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn request_method(configured: &str) -> Result<Method, WebhookError> {
    let configured = configured.trim();
    if configured.is_empty() {
        return Ok(Method::POST);
    }
    Method::from_bytes(configured.to_ascii_uppercase().as_bytes())
        .map_err(|_| WebhookError::InvalidMethod(configured.to_string()))
}

/// Webhook dispatcher shared by the API and the tracker scheduler.
#[derive(Clone)]
pub struct Dispatcher {
    pool: PgPool,
    client: Client,
}

impl Dispatcher {
    /// Creates a dispatcher whose requests time out after `timeout_secs`.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(pool: PgPool, timeout_secs: u64) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(WEBHOOK_USER_AGENT)
            .build()?;
        Ok(Self { pool, client })
    }

    /// Fire-and-forget dispatch: returns immediately, deliveries run on the runtime.
    pub fn trigger(
        &self,
        user_id: Uuid,
        event: MentionEvent,
        mention: WebhookMention,
        team_id: Option<Uuid>,
    ) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher
                .trigger_and_wait(user_id, event, &mention, team_id)
                .await;
        });
    }

    /// Delivers `event` to every qualifying integration concurrently and
    /// waits for all of them. Returns one outcome per attempted integration.
    pub async fn trigger_and_wait(
        &self,
        user_id: Uuid,
        event: MentionEvent,
        mention: &WebhookMention,
        team_id: Option<Uuid>,
    ) -> Vec<(Uuid, DeliveryOutcome)> {
        let integrations = match list_active_webhooks_for(&self.pool, user_id, team_id).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(%user_id, event = %event, error = %e, "failed to load integrations");
                return Vec::new();
            }
        };

        let handles: Vec<_> = integrations
            .into_iter()
            .filter(|integration| should_deliver(integration, event, mention))
            .map(|integration| {
                let dispatcher = self.clone();
                let mention = mention.clone();
                tokio::spawn(async move {
                    let outcome = dispatcher.deliver(&integration, event, &mention).await;
                    (integration.id, outcome)
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(result) => outcomes.push(result),
                Err(e) => tracing::error!(error = %e, "webhook delivery task panicked"),
            }
        }
        outcomes
    }

    /// Sends a synthetic `test` event to `integration`, bypassing its filters.
    pub async fn send_test(&self, integration: &IntegrationRow) -> DeliveryOutcome {
        let mention = WebhookMention::sample(Utc::now());
        self.deliver(integration, MentionEvent::Test, &mention)
            .await
    }

    /// Renders, sends and records one delivery.
    pub async fn deliver(
        &self,
        integration: &IntegrationRow,
        event: MentionEvent,
        mention: &WebhookMention,
    ) -> DeliveryOutcome {
        let payload = build_payload(
            integration.payload_template.as_ref(),
            event,
            mention,
            Utc::now(),
        );
        let outcome = self.send(integration, event, &payload).await;
        self.record(integration, event, &payload, &outcome).await;
        outcome
    }

    /// Performs the HTTP request only; nothing is recorded.
    pub async fn send(
        &self,
        integration: &IntegrationRow,
        event: MentionEvent,
        payload: &Value,
    ) -> DeliveryOutcome {
        let started = Instant::now();
        match self.try_send(integration, event, payload).await {
            Ok((status, body)) => {
                let success = (200..300).contains(&status);
                DeliveryOutcome {
                    success,
                    status_code: Some(status),
                    response_body: Some(truncate_chars(&body, RESPONSE_BODY_LIMIT)),
                    error: (!success).then(|| format!("HTTP {status}")),
                    duration_ms: elapsed_ms(started),
                }
            }
            Err(e) => DeliveryOutcome::failed(e.to_string(), elapsed_ms(started)),
        }
    }

    async fn try_send(
        &self,
        integration: &IntegrationRow,
        event: MentionEvent,
        payload: &Value,
    ) -> Result<(u16, String), WebhookError> {
        let method = request_method(&integration.webhook_method)?;
        let body = serde_json::to_vec(payload)?;

        let mut request = self
            .client
            .request(method, &integration.webhook_url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(EVENT_HEADER, event.as_str());

        if let Some(auth) = integration
            .webhook_auth_header
            .as_deref()
            .and_then(authorization_header)
        {
            request = request.header(header::AUTHORIZATION, auth);
        }
        if let Some(secret) = integration
            .webhook_secret
            .as_deref()
            .filter(|s| !s.is_empty())
        {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body));
        }

        let response = request.body(body).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        Ok((status, text))
    }

    async fn record(
        &self,
        integration: &IntegrationRow,
        event: MentionEvent,
        payload: &Value,
        outcome: &DeliveryOutcome,
    ) {
        let status = if outcome.success {
            IntegrationLogStatus::Success
        } else {
            IntegrationLogStatus::Error
        };
        let log = NewIntegrationLog {
            integration_id: integration.id,
            event_type: event.as_str(),
            status: status.as_str(),
            status_code: outcome.status_code.map(i32::from),
            request_payload: payload,
            response_body: outcome.response_body.as_deref(),
            error_message: outcome.error.as_deref(),
            duration_ms: i32::try_from(outcome.duration_ms).unwrap_or(i32::MAX),
        };
        if let Err(e) = insert_integration_log(&self.pool, &log).await {
            tracing::warn!(integration_id = %integration.id, error = %e, "failed to write integration log");
        }

        if outcome.success {
            if let Err(e) = record_delivery_success(&self.pool, integration.id).await {
                tracing::warn!(integration_id = %integration.id, error = %e, "failed to record delivery success");
            }
            tracing::info!(integration_id = %integration.id, event = %event, "webhook delivered");
        } else {
            let error = outcome.error.as_deref().unwrap_or("delivery failed");
            match record_delivery_failure(&self.pool, integration.id, error).await {
                Ok(count) => tracing::warn!(
                    integration_id = %integration.id,
                    event = %event,
                    error_count = count,
                    error,
                    "webhook delivery failed"
                ),
                Err(e) => tracing::warn!(
                    integration_id = %integration.id,
                    error = %e,
                    "failed to record delivery failure"
                ),
            }
        }
    }
}
