use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::mentions::MAX_BRAND_LEN;
use super::{require_text, ApiError, ApiResponse, AppState};

const DEFAULT_QUERY_COUNT: usize = 5;
const MAX_QUERY_COUNT: usize = 10;
const MAX_INDUSTRY_LEN: usize = 100;

#[derive(Debug, Deserialize)]
pub(super) struct SuggestRequest {
    pub brand: String,
    #[serde(default)]
    pub industry: String,
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(super) struct SuggestResponse {
    pub brand: String,
    pub queries: Vec<String>,
}

/// POST /api/v1/onboarding/queries: starter queries for a new brand.
///
/// Never fails on the model side: template suggestions stand in when the
/// search provider is unavailable.
pub(super) async fn suggest_queries(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(_user): Extension<CurrentUser>,
    Json(body): Json<SuggestRequest>,
) -> Result<Json<ApiResponse<SuggestResponse>>, ApiError> {
    let rid = &req_id.0;
    let brand = require_text(rid, "brand", &body.brand, MAX_BRAND_LEN)?;
    let industry = body.industry.trim();
    if industry.chars().count() > MAX_INDUSTRY_LEN {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("industry must be at most {MAX_INDUSTRY_LEN} characters"),
        ));
    }
    let count = body
        .count
        .unwrap_or(DEFAULT_QUERY_COUNT)
        .clamp(1, MAX_QUERY_COUNT);

    let queries = state
        .checks
        .search()
        .suggest_queries(&brand, industry, count)
        .await;

    Ok(Json(ApiResponse::new(
        req_id.0,
        SuggestResponse { brand, queries },
    )))
}
