//! Post-login bootstrap called by the frontend after the OAuth redirect.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::{CurrentUser, RequestId};

use super::{ApiError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize)]
pub(super) struct BootstrapRequest {
    pub full_name: Option<String>,
    #[serde(default)]
    pub accept_invites: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct BootstrapResponse {
    pub user_id: Uuid,
    pub email: String,
    pub plan: String,
    /// `false` when the profile upsert failed; sign-in still succeeds.
    pub profile_ready: bool,
    pub joined_team_ids: Vec<Uuid>,
}

/// POST /api/v1/auth/bootstrap: ensure a profile exists and optionally join
/// teams the user was invited to.
pub(super) async fn bootstrap(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<BootstrapRequest>,
) -> Result<Json<ApiResponse<BootstrapResponse>>, ApiError> {
    let full_name = body
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let (plan, profile_ready) =
        match brandlens_db::upsert_profile(&state.pool, user.id, &user.email, full_name).await {
            Ok(profile) => (profile.plan().to_string(), true),
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "profile bootstrap failed");
                (brandlens_core::Plan::Free.to_string(), false)
            }
        };

    let mut joined_team_ids = Vec::new();
    if body.accept_invites && !user.email.is_empty() {
        match brandlens_db::list_pending_invites_for_email(&state.pool, &user.email).await {
            Ok(invites) => {
                for invite in invites {
                    match brandlens_db::accept_invite(&state.pool, &invite.token, user.id, &user.email)
                        .await
                    {
                        Ok(accepted) => joined_team_ids.push(accepted.team_id),
                        Err(e) => tracing::warn!(
                            invite_id = %invite.id,
                            error = %e,
                            "could not accept pending invite"
                        ),
                    }
                }
            }
            Err(e) => tracing::warn!(user_id = %user.id, error = %e, "failed to load pending invites"),
        }
    }

    Ok(Json(ApiResponse::new(
        req_id.0,
        BootstrapResponse {
            user_id: user.id,
            email: user.email,
            plan,
            profile_ready,
            joined_team_ids,
        },
    )))
}
