//! Tracker CRUD. Trackers are visible to their owner and to members of the
//! team they are shared with; writes need the owner or a team admin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use brandlens_db::{NewTracker, TrackerRow, TrackerUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::{CurrentUser, RequestId};

use super::mentions::{MAX_BRAND_LEN, MAX_QUERY_LEN};
use super::{
    ensure_can_write, ensure_team_member, map_db_error, require_text, ApiError, ApiResponse,
    AppState,
};

const MIN_INTERVAL_MINUTES: i32 = 5;
const MAX_INTERVAL_MINUTES: i32 = 10_080;
const DEFAULT_INTERVAL_MINUTES: i32 = 1_440;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct CreateTrackerRequest {
    pub brand: String,
    pub query: String,
    pub interval_minutes: Option<i32>,
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateTrackerRequest {
    pub brand: Option<String>,
    pub query: Option<String>,
    pub interval_minutes: Option<i32>,
    pub active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct TrackerItem {
    pub id: Uuid,
    pub team_id: Option<Uuid>,
    pub owner_email: String,
    pub brand: String,
    pub query: String,
    pub interval_minutes: i32,
    pub active: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TrackerRow> for TrackerItem {
    fn from(row: TrackerRow) -> Self {
        Self {
            id: row.id,
            team_id: row.team_id,
            owner_email: row.user_email,
            brand: row.brand,
            query: row.query,
            interval_minutes: row.interval_minutes,
            active: row.active,
            last_checked_at: row.last_checked_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_interval(req_id: &str, minutes: i32) -> Result<i32, ApiError> {
    if (MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&minutes) {
        Ok(minutes)
    } else {
        Err(ApiError::new(
            req_id,
            "validation_error",
            format!(
                "interval_minutes must be between {MIN_INTERVAL_MINUTES} and {MAX_INTERVAL_MINUTES}"
            ),
        ))
    }
}

async fn load_tracker(
    state: &AppState,
    req_id: &str,
    tracker_id: Uuid,
    user_id: Uuid,
) -> Result<TrackerRow, ApiError> {
    brandlens_db::get_tracker_for_user(&state.pool, tracker_id, user_id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(req_id, "not_found", "tracker not found"))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/trackers
pub(super) async fn list_trackers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<TrackerItem>>>, ApiError> {
    let rows = brandlens_db::list_trackers_for_user(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        rows.into_iter().map(TrackerItem::from).collect(),
    )))
}

/// POST /api/v1/trackers: subject to the plan's tracker limit.
pub(super) async fn create_tracker(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateTrackerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TrackerItem>>), ApiError> {
    let rid = &req_id.0;
    let brand = require_text(rid, "brand", &body.brand, MAX_BRAND_LEN)?;
    let query = require_text(rid, "query", &body.query, MAX_QUERY_LEN)?;
    let interval_minutes =
        validate_interval(rid, body.interval_minutes.unwrap_or(DEFAULT_INTERVAL_MINUTES))?;
    if let Some(team_id) = body.team_id {
        ensure_team_member(&state, rid, user.id, team_id).await?;
    }

    let plan = brandlens_db::plan_for_user(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let owned = brandlens_db::count_trackers_for_user(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if owned >= plan.tracker_limit() {
        return Err(ApiError::new(
            rid,
            "limit_reached",
            format!(
                "the {plan} plan allows {} trackers; upgrade to add more",
                plan.tracker_limit()
            ),
        ));
    }

    let row = brandlens_db::create_tracker(
        &state.pool,
        &NewTracker {
            user_id: user.id,
            user_email: &user.email,
            team_id: body.team_id,
            brand: &brand,
            query: &query,
            interval_minutes,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(tracker_id = %row.id, user_id = %user.id, "tracker created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, TrackerItem::from(row))),
    ))
}

/// GET /api/v1/trackers/{id}
pub(super) async fn get_tracker(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(tracker_id): Path<Uuid>,
) -> Result<Json<ApiResponse<TrackerItem>>, ApiError> {
    let row = load_tracker(&state, &req_id.0, tracker_id, user.id).await?;
    Ok(Json(ApiResponse::new(req_id.0, TrackerItem::from(row))))
}

/// PATCH /api/v1/trackers/{id}: sparse update; `active: false` pauses polling.
pub(super) async fn update_tracker(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(tracker_id): Path<Uuid>,
    Json(body): Json<UpdateTrackerRequest>,
) -> Result<Json<ApiResponse<TrackerItem>>, ApiError> {
    let rid = &req_id.0;
    let tracker = load_tracker(&state, rid, tracker_id, user.id).await?;
    ensure_can_write(&state, rid, user.id, tracker.user_id, tracker.team_id).await?;

    let brand = body
        .brand
        .as_deref()
        .map(|b| require_text(rid, "brand", b, MAX_BRAND_LEN))
        .transpose()?;
    let query = body
        .query
        .as_deref()
        .map(|q| require_text(rid, "query", q, MAX_QUERY_LEN))
        .transpose()?;
    let interval_minutes = body
        .interval_minutes
        .map(|m| validate_interval(rid, m))
        .transpose()?;

    let row = brandlens_db::update_tracker(
        &state.pool,
        tracker_id,
        &TrackerUpdate {
            brand: brand.as_deref(),
            query: query.as_deref(),
            interval_minutes,
            active: body.active,
        },
    )
    .await
    .map_err(|e| match e {
        brandlens_db::DbError::NotFound => ApiError::new(rid, "not_found", "tracker not found"),
        other => map_db_error(rid.clone(), &other),
    })?;

    Ok(Json(ApiResponse::new(req_id.0, TrackerItem::from(row))))
}

/// DELETE /api/v1/trackers/{id}: past mention records are kept.
pub(super) async fn delete_tracker(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(tracker_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let rid = &req_id.0;
    let tracker = load_tracker(&state, rid, tracker_id, user.id).await?;
    ensure_can_write(&state, rid, user.id, tracker.user_id, tracker.team_id).await?;

    brandlens_db::delete_tracker(&state.pool, tracker_id)
        .await
        .map_err(|e| match e {
            brandlens_db::DbError::NotFound => ApiError::new(rid, "not_found", "tracker not found"),
            other => map_db_error(rid.clone(), &other),
        })?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use brandlens_core::TeamRole;
    use serde_json::json;
    use uuid::Uuid;

    use crate::api::test_support::{get, send_empty, send_json, test_app};
    use crate::middleware::DEV_USER_ID;

    #[sqlx::test(migrations = "../../migrations")]
    async fn tracker_lifecycle(pool: sqlx::PgPool) {
        let app = test_app(pool);

        let (status, body) = send_json(
            app.clone(),
            Method::POST,
            "/api/v1/trackers",
            &json!({"brand": " Acme ", "query": "best anvil brands", "interval_minutes": 60}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["brand"], "Acme");
        assert_eq!(body["data"]["active"], true);
        let id = body["data"]["id"].as_str().expect("id").to_string();

        let (status, body) = send_json(
            app.clone(),
            Method::PATCH,
            &format!("/api/v1/trackers/{id}"),
            &json!({"active": false, "interval_minutes": 30}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["active"], false);
        assert_eq!(body["data"]["interval_minutes"], 30);
        assert_eq!(body["data"]["query"], "best anvil brands");

        let (status, body) = get(app.clone(), "/api/v1/trackers").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

        let (status, _) = send_empty(app.clone(), Method::DELETE, &format!("/api/v1/trackers/{id}")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = get(app, &format!("/api/v1/trackers/{id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn interval_below_minimum_is_rejected(pool: sqlx::PgPool) {
        let (status, body) = send_json(
            test_app(pool),
            Method::POST,
            "/api/v1/trackers",
            &json!({"brand": "Acme", "query": "q", "interval_minutes": 1}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn free_plan_tracker_limit_is_enforced(pool: sqlx::PgPool) {
        let app = test_app(pool);
        for i in 0..3 {
            let (status, _) = send_json(
                app.clone(),
                Method::POST,
                "/api/v1/trackers",
                &json!({"brand": format!("Brand {i}"), "query": "q"}),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send_json(
            app,
            Method::POST,
            "/api/v1/trackers",
            &json!({"brand": "One too many", "query": "q"}),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["code"], "limit_reached");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn team_members_cannot_edit_without_admin_role(pool: sqlx::PgPool) {
        let owner = Uuid::new_v4();
        let team = brandlens_db::create_team(&pool, "Growth", owner, "owner@smallbiz.io")
            .await
            .expect("team");
        brandlens_db::create_invite(&pool, team.id, "dev@localhost", TeamRole::Member, "tok-m", owner)
            .await
            .expect("invite");
        brandlens_db::accept_invite(&pool, "tok-m", DEV_USER_ID, "dev@localhost")
            .await
            .expect("accept");
        let tracker = brandlens_db::create_tracker(
            &pool,
            &brandlens_db::NewTracker {
                user_id: owner,
                user_email: "owner@smallbiz.io",
                team_id: Some(team.id),
                brand: "Acme",
                query: "q",
                interval_minutes: 60,
            },
        )
        .await
        .expect("tracker");

        let app = test_app(pool);
        let (status, _) = get(app.clone(), &format!("/api/v1/trackers/{}", tracker.id)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send_json(
            app,
            Method::PATCH,
            &format!("/api/v1/trackers/{}", tracker.id),
            &json!({"active": false}),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn sharing_with_foreign_team_is_forbidden(pool: sqlx::PgPool) {
        let team = brandlens_db::create_team(&pool, "Other", Uuid::new_v4(), "x@smallbiz.io")
            .await
            .expect("team");
        let (status, _) = send_json(
            test_app(pool),
            Method::POST,
            "/api/v1/trackers",
            &json!({"brand": "Acme", "query": "q", "team_id": team.id}),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
