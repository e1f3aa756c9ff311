//! Database operations for `teams`, `team_members` and `team_invites`.

use brandlens_core::TeamRole;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const INVITE_TTL_DAYS: i64 = 7;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TeamRow {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TeamMemberRow {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TeamInviteRow {
    pub id: Uuid,
    pub team_id: Uuid,
    pub email: String,
    pub role: String,
    pub token: String,
    pub status: String,
    pub invited_by: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// Creates a team and enrols the creator as its owner in one transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either insert fails.
pub async fn create_team(
    pool: &PgPool,
    name: &str,
    owner_id: Uuid,
    owner_email: &str,
) -> Result<TeamRow, DbError> {
    let mut tx = pool.begin().await?;

    let team = sqlx::query_as::<_, TeamRow>(
        "INSERT INTO teams (name, owner_id) VALUES ($1, $2) \
         RETURNING id, name, owner_id, created_at, updated_at",
    )
    .bind(name)
    .bind(owner_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO team_members (team_id, user_id, email, role) VALUES ($1, $2, $3, 'owner')",
    )
    .bind(team.id)
    .bind(owner_id)
    .bind(owner_email)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(team)
}

/// Returns every team the user belongs to, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_teams_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<TeamRow>, DbError> {
    let rows = sqlx::query_as::<_, TeamRow>(
        "SELECT t.id, t.name, t.owner_id, t.created_at, t.updated_at \
         FROM teams t \
         JOIN team_members m ON m.team_id = t.id \
         WHERE m.user_id = $1 \
         ORDER BY t.name, t.id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a team by id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_team(pool: &PgPool, team_id: Uuid) -> Result<Option<TeamRow>, DbError> {
    let row = sqlx::query_as::<_, TeamRow>(
        "SELECT id, name, owner_id, created_at, updated_at FROM teams WHERE id = $1",
    )
    .bind(team_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if the team does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn rename_team(pool: &PgPool, team_id: Uuid, name: &str) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE teams SET name = $1, updated_at = NOW() WHERE id = $2")
        .bind(name)
        .bind(team_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Deletes a team; members, invites and team integrations cascade.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the team does not exist, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn delete_team(pool: &PgPool, team_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM teams WHERE id = $1")
        .bind(team_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// Returns the user's role in a team, or `None` if they are not a member.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn member_role(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<Option<TeamRole>, DbError> {
    let role = sqlx::query_scalar::<_, String>(
        "SELECT role FROM team_members WHERE team_id = $1 AND user_id = $2",
    )
    .bind(team_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(role.and_then(|r| r.parse().ok()))
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_members(pool: &PgPool, team_id: Uuid) -> Result<Vec<TeamMemberRow>, DbError> {
    let rows = sqlx::query_as::<_, TeamMemberRow>(
        "SELECT team_id, user_id, email, role, joined_at \
         FROM team_members \
         WHERE team_id = $1 \
         ORDER BY joined_at, user_id",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Removes a non-owner member from a team.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such non-owner member exists, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn remove_member(pool: &PgPool, team_id: Uuid, user_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query(
        "DELETE FROM team_members WHERE team_id = $1 AND user_id = $2 AND role <> 'owner'",
    )
    .bind(team_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Invites
// ---------------------------------------------------------------------------

/// Creates a pending invite valid for seven days.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_invite(
    pool: &PgPool,
    team_id: Uuid,
    email: &str,
    role: TeamRole,
    token: &str,
    invited_by: Uuid,
) -> Result<TeamInviteRow, DbError> {
    let expires_at = Utc::now() + Duration::days(INVITE_TTL_DAYS);

    let row = sqlx::query_as::<_, TeamInviteRow>(
        "INSERT INTO team_invites (team_id, email, role, token, invited_by, expires_at) \
         VALUES ($1, LOWER($2), $3, $4, $5, $6) \
         RETURNING id, team_id, email, role, token, status, invited_by, expires_at, created_at",
    )
    .bind(team_id)
    .bind(email)
    .bind(role.as_str())
    .bind(token)
    .bind(invited_by)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Looks up an invite by its token, whatever its status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_invite_by_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<TeamInviteRow>, DbError> {
    let row = sqlx::query_as::<_, TeamInviteRow>(
        "SELECT id, team_id, email, role, token, status, invited_by, expires_at, created_at \
         FROM team_invites \
         WHERE token = $1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns unexpired pending invites addressed to `email` (case-insensitive).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_invites_for_email(
    pool: &PgPool,
    email: &str,
) -> Result<Vec<TeamInviteRow>, DbError> {
    let rows = sqlx::query_as::<_, TeamInviteRow>(
        "SELECT id, team_id, email, role, token, status, invited_by, expires_at, created_at \
         FROM team_invites \
         WHERE LOWER(email) = LOWER($1) AND status = 'pending' AND expires_at > NOW() \
         ORDER BY created_at",
    )
    .bind(email)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Accepts a pending invite: marks it accepted and adds the user as a member.
///
/// Accepting twice is harmless; an existing membership keeps its role.
///
/// # Errors
///
/// Returns [`DbError::InviteUnavailable`] if the token is unknown, expired,
/// already used or revoked, or [`DbError::Sqlx`] on query failure.
pub async fn accept_invite(
    pool: &PgPool,
    token: &str,
    user_id: Uuid,
    email: &str,
) -> Result<TeamInviteRow, DbError> {
    let mut tx = pool.begin().await?;

    let invite = sqlx::query_as::<_, TeamInviteRow>(
        "UPDATE team_invites SET status = 'accepted' \
         WHERE token = $1 AND status = 'pending' AND expires_at > NOW() \
         RETURNING id, team_id, email, role, token, status, invited_by, expires_at, created_at",
    )
    .bind(token)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(DbError::InviteUnavailable)?;

    sqlx::query(
        "INSERT INTO team_members (team_id, user_id, email, role) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (team_id, user_id) DO NOTHING",
    )
    .bind(invite.team_id)
    .bind(user_id)
    .bind(email)
    .bind(&invite.role)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(invite)
}
