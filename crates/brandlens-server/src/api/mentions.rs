use axum::{
    extract::{Query, State},
    Extension, Json,
};
use brandlens_db::MentionRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checks::{CheckError, CheckRequest};
use crate::middleware::{CurrentUser, RequestId};

use super::{
    ensure_team_member, map_db_error, normalize_limit, require_text, ApiError, ApiResponse,
    AppState,
};

pub(super) const MAX_BRAND_LEN: usize = 200;
pub(super) const MAX_QUERY_LEN: usize = 500;

#[derive(Debug, Deserialize)]
pub(super) struct CheckMentionRequest {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    pub tracker_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MentionListQuery {
    pub brand: Option<String>,
    pub tracker_id: Option<Uuid>,
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct MentionItem {
    pub id: Uuid,
    pub tracker_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub brand: String,
    pub query: String,
    pub mentioned: bool,
    pub evidence: String,
    pub position: Option<i32>,
    pub source_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MentionRow> for MentionItem {
    fn from(row: MentionRow) -> Self {
        Self {
            id: row.id,
            tracker_id: row.tracker_id,
            team_id: row.team_id,
            brand: row.brand,
            query: row.query,
            mentioned: row.mentioned,
            evidence: row.evidence,
            position: row.position,
            source_urls: row.source_urls,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CheckMentionResponse {
    #[serde(flatten)]
    pub mention: MentionItem,
    pub search_failed: bool,
    pub events: Vec<String>,
}

pub(super) fn map_check_error(req_id: String, error: &CheckError) -> ApiError {
    match error {
        CheckError::LimitReached { .. } => ApiError::new(req_id, "limit_reached", error.to_string()),
        CheckError::Db(e) => map_db_error(req_id, e),
    }
}

/// A tracker check always uses the tracker's own brand and query; a body
/// value that names something else is rejected.
fn ensure_matches_tracker(
    req_id: &str,
    field: &str,
    given: Option<&str>,
    stored: &str,
) -> Result<(), ApiError> {
    match given.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) if !value.eq_ignore_ascii_case(stored) => Err(ApiError::new(
            req_id,
            "validation_error",
            format!("{field} does not match the tracker"),
        )),
        _ => Ok(()),
    }
}

/// POST /api/v1/mentions/check: run a check now and record it.
///
/// Answers 200 with the stored record even when the search itself failed.
pub(super) async fn check_mention(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CheckMentionRequest>,
) -> Result<Json<ApiResponse<CheckMentionResponse>>, ApiError> {
    let rid = &req_id.0;

    let (brand, query, team_id) = match body.tracker_id {
        Some(tracker_id) => {
            let tracker = brandlens_db::get_tracker_for_user(&state.pool, tracker_id, user.id)
                .await
                .map_err(|e| map_db_error(rid.clone(), &e))?
                .ok_or_else(|| ApiError::new(rid, "not_found", "tracker not found"))?;
            ensure_matches_tracker(rid, "brand", body.brand.as_deref(), &tracker.brand)?;
            ensure_matches_tracker(rid, "query", body.query.as_deref(), &tracker.query)?;
            (tracker.brand, tracker.query, tracker.team_id)
        }
        None => {
            let brand = body.brand.as_deref().unwrap_or_default();
            let query = body.query.as_deref().unwrap_or_default();
            let brand = require_text(rid, "brand", brand, MAX_BRAND_LEN)?;
            let query = require_text(rid, "query", query, MAX_QUERY_LEN)?;
            if let Some(team_id) = body.team_id {
                ensure_team_member(&state, rid, user.id, team_id).await?;
            }
            (brand, query, body.team_id)
        }
    };

    let result = state
        .checks
        .run(CheckRequest {
            user_id: user.id,
            user_email: &user.email,
            team_id,
            tracker_id: body.tracker_id,
            brand: &brand,
            query: &query,
        })
        .await
        .map_err(|e| map_check_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        CheckMentionResponse {
            mention: MentionItem::from(result.mention),
            search_failed: result.search_failed,
            events: result.events.iter().map(ToString::to_string).collect(),
        },
    )))
}

/// GET /api/v1/mentions: newest first, keyset-paginated by `before`.
pub(super) async fn list_mentions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<MentionListQuery>,
) -> Result<Json<ApiResponse<Vec<MentionItem>>>, ApiError> {
    let brand = params
        .brand
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let rows = brandlens_db::list_mentions(
        &state.pool,
        user.id,
        brand,
        params.tracker_id,
        params.before,
        normalize_limit(params.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        rows.into_iter().map(MentionItem::from).collect(),
    )))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use brandlens_search::SEARCH_FAILED_EVIDENCE;
    use serde_json::json;
    use uuid::Uuid;

    use crate::api::test_support::{get, seed_profile, send_json, test_app};
    use crate::middleware::{DEV_USER_EMAIL, DEV_USER_ID};

    #[sqlx::test(migrations = "../../migrations")]
    async fn failed_search_is_still_recorded_with_ok_status(pool: sqlx::PgPool) {
        let (status, body) = send_json(
            test_app(pool.clone()),
            Method::POST,
            "/api/v1/mentions/check",
            &json!({"brand": "Acme", "query": "best anvil brands"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["mentioned"], false);
        assert_eq!(body["data"]["evidence"], SEARCH_FAILED_EVIDENCE);
        assert_eq!(body["data"]["search_failed"], true);
        assert_eq!(body["data"]["events"], json!(["mention.checked"]));

        let stored = brandlens_db::list_mentions(&pool, DEV_USER_ID, None, None, None, 10)
            .await
            .expect("list");
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].mentioned);
        assert_eq!(stored[0].evidence, SEARCH_FAILED_EVIDENCE);
        assert!(stored[0].raw_output["error"].is_string());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn blank_brand_is_rejected(pool: sqlx::PgPool) {
        let (status, body) = send_json(
            test_app(pool),
            Method::POST,
            "/api/v1/mentions/check",
            &json!({"brand": "  ", "query": "best anvil brands"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_tracker_is_not_found(pool: sqlx::PgPool) {
        let (status, _) = send_json(
            test_app(pool),
            Method::POST,
            "/api/v1/mentions/check",
            &json!({"brand": "Acme", "query": "q", "tracker_id": Uuid::new_v4()}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    async fn create_tracker(app: axum::Router) -> String {
        let (status, body) = send_json(
            app,
            Method::POST,
            "/api/v1/trackers",
            &json!({"brand": "Acme", "query": "best anvil brands"}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"]
            .as_str()
            .unwrap_or_else(|| panic!("tracker id missing: {body}"))
            .to_string()
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn tracker_check_records_the_tracker_brand_and_query(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let tracker_id = create_tracker(app.clone()).await;

        let (status, body) = send_json(
            app,
            Method::POST,
            "/api/v1/mentions/check",
            &json!({"tracker_id": tracker_id}),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["tracker_id"], tracker_id.as_str());
        assert_eq!(body["data"]["brand"], "Acme");
        assert_eq!(body["data"]["query"], "best anvil brands");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn tracker_check_rejects_a_different_brand(pool: sqlx::PgPool) {
        let app = test_app(pool.clone());
        let tracker_id = create_tracker(app.clone()).await;

        let (status, body) = send_json(
            app,
            Method::POST,
            "/api/v1/mentions/check",
            &json!({"brand": "Globex", "query": "unrelated", "tracker_id": tracker_id}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");

        let stored = brandlens_db::list_mentions(&pool, DEV_USER_ID, None, None, None, 10)
            .await
            .expect("list");
        assert!(stored.is_empty());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn monthly_quota_blocks_further_checks(pool: sqlx::PgPool) {
        seed_profile(&pool, DEV_USER_ID, DEV_USER_EMAIL, "free").await;
        sqlx::query(
            "INSERT INTO mentions (user_id, user_email, brand, query, mentioned, evidence, raw_output, source_urls) \
             SELECT $1, $2, 'Acme', 'q', false, 'No mention found', '{}'::jsonb, '{}' \
             FROM generate_series(1, 100)",
        )
        .bind(DEV_USER_ID)
        .bind(DEV_USER_EMAIL)
        .execute(&pool)
        .await
        .expect("seed mentions");

        let (status, body) = send_json(
            test_app(pool),
            Method::POST,
            "/api/v1/mentions/check",
            &json!({"brand": "Acme", "query": "q"}),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["code"], "limit_reached");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn list_filters_by_brand(pool: sqlx::PgPool) {
        let app = test_app(pool);
        for brand in ["Acme", "Globex"] {
            send_json(
                app.clone(),
                Method::POST,
                "/api/v1/mentions/check",
                &json!({"brand": brand, "query": "q"}),
            )
            .await;
        }

        let (status, body) = get(app, "/api/v1/mentions?brand=acme&limit=10").await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["data"].as_array().expect("array");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["brand"], "Acme");
    }
}
