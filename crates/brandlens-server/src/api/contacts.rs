//! Contact extraction batches and the saved contact list.

use std::time::Duration;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use brandlens_db::{ContactRow, NewContact};
use brandlens_scraper::ExtractedContact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::{CurrentUser, RequestId};

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

const DEFAULT_BATCH_SIZE: usize = 20;
const MAX_BATCH_SIZE: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub(super) struct ExtractRequest {
    /// Pages to scan; when absent, the caller's most recently cited sources.
    pub urls: Option<Vec<String>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ContactListQuery {
    pub min_confidence: Option<i16>,
    pub domain: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ExtractResponse {
    pub urls_processed: usize,
    pub contacts_found: usize,
    pub contacts_saved: usize,
    pub contacts: Vec<ExtractedContact>,
}

#[derive(Debug, Serialize)]
pub(super) struct ContactItem {
    pub id: Uuid,
    pub source_url: String,
    pub domain: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub twitter_url: Option<String>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
    pub author_name: Option<String>,
    pub company_name: Option<String>,
    pub extraction_method: String,
    pub confidence: i16,
    pub updated_at: DateTime<Utc>,
}

impl From<ContactRow> for ContactItem {
    fn from(row: ContactRow) -> Self {
        Self {
            id: row.id,
            source_url: row.source_url,
            domain: row.domain,
            email: row.email,
            phone: row.phone,
            linkedin_url: row.linkedin_url,
            twitter_url: row.twitter_url,
            facebook_url: row.facebook_url,
            instagram_url: row.instagram_url,
            author_name: row.author_name,
            company_name: row.company_name,
            extraction_method: row.extraction_method,
            confidence: row.confidence,
            updated_at: row.updated_at,
        }
    }
}

fn new_contact<'a>(user_id: Uuid, contact: &'a ExtractedContact) -> NewContact<'a> {
    NewContact {
        user_id,
        source_url: &contact.source_url,
        domain: &contact.domain,
        email: contact.email.as_deref(),
        phone: contact.phone.as_deref(),
        linkedin_url: contact.linkedin_url.as_deref(),
        twitter_url: contact.twitter_url.as_deref(),
        facebook_url: contact.facebook_url.as_deref(),
        instagram_url: contact.instagram_url.as_deref(),
        author_name: contact.author_name.as_deref(),
        company_name: contact.company_name.as_deref(),
        extraction_method: contact.extraction_method.as_str(),
        confidence: i16::from(contact.confidence),
    }
}

/// Trims, drops blanks and duplicates, keeps first-seen order.
fn dedupe_urls(urls: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls {
        let url = url.trim();
        if !url.is_empty() && !out.iter().any(|u| u == url) {
            out.push(url.to_string());
        }
    }
    out
}

/// POST /api/v1/contacts/extract: scans pages one by one and saves what it finds.
///
/// Pages that fail to load are skipped; the batch itself only fails on a
/// database error while loading the default URL list.
pub(super) async fn extract_contacts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<ExtractRequest>,
) -> Result<Json<ApiResponse<ExtractResponse>>, ApiError> {
    let rid = &req_id.0;
    let limit = body.limit.unwrap_or(DEFAULT_BATCH_SIZE);
    if !(1..=MAX_BATCH_SIZE).contains(&limit) {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("limit must be between 1 and {MAX_BATCH_SIZE}"),
        ));
    }

    let mut urls = match body.urls {
        Some(urls) => dedupe_urls(urls),
        None => {
            let recent = i64::try_from(limit).unwrap_or(i64::MAX);
            brandlens_db::recent_source_urls(&state.pool, user.id, recent)
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?
        }
    };
    urls.truncate(limit);

    let delay = Duration::from_millis(state.config.contact_delay_ms);
    let contacts = state.contacts.extract_batch(&urls, delay).await;

    let mut saved = 0usize;
    for contact in &contacts {
        match brandlens_db::upsert_contact(&state.pool, &new_contact(user.id, contact)).await {
            Ok(_) => saved += 1,
            Err(e) => tracing::warn!(
                source_url = %contact.source_url,
                error = %e,
                "failed to save extracted contact"
            ),
        }
    }

    tracing::info!(
        user_id = %user.id,
        urls = urls.len(),
        found = contacts.len(),
        saved,
        "contact extraction batch finished"
    );

    Ok(Json(ApiResponse::new(
        req_id.0,
        ExtractResponse {
            urls_processed: urls.len(),
            contacts_found: contacts.len(),
            contacts_saved: saved,
            contacts,
        },
    )))
}

/// GET /api/v1/contacts: best first.
pub(super) async fn list_contacts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ContactListQuery>,
) -> Result<Json<ApiResponse<Vec<ContactItem>>>, ApiError> {
    let min_confidence = params.min_confidence.unwrap_or(0).clamp(0, 100);
    let domain = params
        .domain
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    let rows = brandlens_db::list_contacts(
        &state.pool,
        user.id,
        min_confidence,
        domain,
        normalize_limit(params.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        rows.into_iter().map(ContactItem::from).collect(),
    )))
}
