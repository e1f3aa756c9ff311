use axum::{extract::State, Extension, Json};
use brandlens_core::Plan;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::checks::month_start;
use crate::middleware::{CurrentUser, RequestId};

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct UsageResponse {
    pub plan: Plan,
    pub period_start: DateTime<Utc>,
    pub checks_used: i64,
    pub checks_limit: i64,
    pub trackers_used: i64,
    pub trackers_limit: i64,
}

/// GET /api/v1/usage: checks this calendar month (UTC) and owned trackers
/// against the plan's allowance.
pub(super) async fn get_usage(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UsageResponse>>, ApiError> {
    let rid = &req_id.0;
    let period_start = month_start(Utc::now());

    let plan = brandlens_db::plan_for_user(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let checks_used = brandlens_db::count_checks_since(&state.pool, user.id, period_start)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let trackers_used = brandlens_db::count_trackers_for_user(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        UsageResponse {
            plan,
            period_start,
            checks_used,
            checks_limit: plan.monthly_check_limit(),
            trackers_used,
            trackers_limit: plan.tracker_limit(),
        },
    )))
}
