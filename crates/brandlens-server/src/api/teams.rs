//! Teams, memberships and email invites.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use brandlens_core::TeamRole;
use brandlens_db::{DbError, TeamInviteRow, TeamMemberRow, TeamRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::{CurrentUser, RequestId};

use super::{map_db_error, require_text, ApiError, ApiResponse, AppState};

const MAX_TEAM_NAME_LEN: usize = 100;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct TeamNameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct InviteRequest {
    pub email: String,
    pub role: Option<String>,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct TeamItem {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<TeamRow> for TeamItem {
    fn from(row: TeamRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            owner_id: row.owner_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct MemberItem {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

impl From<TeamMemberRow> for MemberItem {
    fn from(row: TeamMemberRow) -> Self {
        Self {
            user_id: row.user_id,
            email: row.email,
            role: row.role,
            joined_at: row.joined_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct TeamDetail {
    #[serde(flatten)]
    pub team: TeamItem,
    pub your_role: TeamRole,
    pub members: Vec<MemberItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct InviteItem {
    pub id: Uuid,
    pub team_id: Uuid,
    pub email: String,
    pub role: String,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    /// Link the invitee opens to join; carries the single-use token.
    pub accept_url: String,
    pub token: String,
}

impl InviteItem {
    fn new(row: TeamInviteRow, app_url: &str) -> Self {
        Self {
            accept_url: format!("{app_url}/invite/{}", row.token),
            id: row.id,
            team_id: row.team_id,
            email: row.email,
            role: row.role,
            status: row.status,
            expires_at: row.expires_at,
            token: row.token,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Hex of 32 random bytes.
fn generate_invite_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// The caller's role in `team_id`; non-members get 404 so team ids do not leak.
async fn caller_role(
    state: &AppState,
    req_id: &str,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<TeamRole, ApiError> {
    brandlens_db::member_role(&state.pool, team_id, user_id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(req_id, "not_found", "team not found"))
}

async fn require_manager(
    state: &AppState,
    req_id: &str,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<TeamRole, ApiError> {
    let role = caller_role(state, req_id, team_id, user_id).await?;
    if role.can_manage() {
        Ok(role)
    } else {
        Err(ApiError::new(
            req_id,
            "forbidden",
            "only team owners and admins can do that",
        ))
    }
}

fn team_not_found_or(req_id: &str, error: &DbError) -> ApiError {
    match error {
        DbError::NotFound => ApiError::new(req_id, "not_found", "team not found"),
        other => map_db_error(req_id.to_owned(), other),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/teams: teams the caller belongs to.
pub(super) async fn list_teams(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<TeamItem>>>, ApiError> {
    let rows = brandlens_db::list_teams_for_user(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(
        req_id.0,
        rows.into_iter().map(TeamItem::from).collect(),
    )))
}

/// POST /api/v1/teams: the caller becomes the owner.
pub(super) async fn create_team(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<TeamNameRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TeamItem>>), ApiError> {
    let rid = &req_id.0;
    let name = require_text(rid, "name", &body.name, MAX_TEAM_NAME_LEN)?;
    let team = brandlens_db::create_team(&state.pool, &name, user.id, &user.email)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(team_id = %team.id, owner_id = %user.id, "team created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, TeamItem::from(team))),
    ))
}

/// GET /api/v1/teams/{id}: team with its members.
pub(super) async fn get_team(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<ApiResponse<TeamDetail>>, ApiError> {
    let rid = &req_id.0;
    let your_role = caller_role(&state, rid, team_id, user.id).await?;
    let team = brandlens_db::get_team(&state.pool, team_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "team not found"))?;
    let members = brandlens_db::list_members(&state.pool, team_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        TeamDetail {
            team: TeamItem::from(team),
            your_role,
            members: members.into_iter().map(MemberItem::from).collect(),
        },
    )))
}

/// PATCH /api/v1/teams/{id}: rename (owners and admins).
pub(super) async fn rename_team(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<TeamNameRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let rid = &req_id.0;
    require_manager(&state, rid, team_id, user.id).await?;
    let name = require_text(rid, "name", &body.name, MAX_TEAM_NAME_LEN)?;

    brandlens_db::rename_team(&state.pool, team_id, &name)
        .await
        .map_err(|e| team_not_found_or(rid, &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        serde_json::json!({ "id": team_id, "name": name }),
    )))
}

/// DELETE /api/v1/teams/{id}: owner only; shared trackers revert to personal.
pub(super) async fn delete_team(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(team_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let rid = &req_id.0;
    if caller_role(&state, rid, team_id, user.id).await? != TeamRole::Owner {
        return Err(ApiError::new(
            rid,
            "forbidden",
            "only the team owner can delete the team",
        ));
    }

    brandlens_db::delete_team(&state.pool, team_id)
        .await
        .map_err(|e| team_not_found_or(rid, &e))?;

    tracing::info!(%team_id, "team deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/teams/{id}/invites
pub(super) async fn invite_member(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<InviteRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InviteItem>>), ApiError> {
    let rid = &req_id.0;
    require_manager(&state, rid, team_id, user.id).await?;

    let email = body.email.trim();
    if !looks_like_email(email) {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "email must be a valid address",
        ));
    }
    let role = match body.role.as_deref().map(str::trim) {
        None | Some("") => TeamRole::Member,
        Some(raw) => match raw.parse::<TeamRole>() {
            Ok(TeamRole::Owner) | Err(_) => {
                return Err(ApiError::new(
                    rid,
                    "validation_error",
                    "role must be 'admin' or 'member'",
                ))
            }
            Ok(role) => role,
        },
    };

    let invite = brandlens_db::create_invite(
        &state.pool,
        team_id,
        email,
        role,
        &generate_invite_token(),
        user.id,
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(%team_id, invite_id = %invite.id, "team invite created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            req_id.0,
            InviteItem::new(invite, &state.config.app_url),
        )),
    ))
}

/// DELETE /api/v1/teams/{id}/members/{user_id}: managers remove others;
/// anyone may leave. The owner cannot be removed.
pub(super) async fn remove_member(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path((team_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let rid = &req_id.0;
    if member_id == user.id {
        caller_role(&state, rid, team_id, user.id).await?;
    } else {
        require_manager(&state, rid, team_id, user.id).await?;
    }

    brandlens_db::remove_member(&state.pool, team_id, member_id)
        .await
        .map_err(|e| match e {
            DbError::NotFound => ApiError::new(
                rid,
                "not_found",
                "member not found, or is the team owner",
            ),
            other => map_db_error(rid.clone(), &other),
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/teams/invites/{token}/accept: the invite must be addressed
/// to the caller's email.
pub(super) async fn accept_invite(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<MemberItem>>, ApiError> {
    let rid = &req_id.0;
    let unavailable = || ApiError::new(rid, "not_found", "invite is expired or no longer pending");

    let invite = brandlens_db::get_invite_by_token(&state.pool, &token)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(unavailable)?;
    if !invite.email.eq_ignore_ascii_case(&user.email) {
        return Err(ApiError::new(
            rid,
            "forbidden",
            "this invite was sent to a different email address",
        ));
    }

    let accepted = brandlens_db::accept_invite(&state.pool, &token, user.id, &user.email)
        .await
        .map_err(|e| match e {
            DbError::InviteUnavailable => unavailable(),
            other => map_db_error(rid.clone(), &other),
        })?;

    let role = brandlens_db::member_role(&state.pool, accepted.team_id, user.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .map_or(accepted.role, |r| r.to_string());

    tracing::info!(team_id = %accepted.team_id, user_id = %user.id, "team invite accepted");
    Ok(Json(ApiResponse::new(
        req_id.0,
        MemberItem {
            user_id: user.id,
            email: user.email,
            role,
            joined_at: Utc::now(),
        },
    )))
}
