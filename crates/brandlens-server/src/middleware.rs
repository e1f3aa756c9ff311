use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

/// Audience Supabase puts on access tokens of signed-in users.
pub const SUPABASE_AUDIENCE: &str = "authenticated";

/// Identity used for every request when auth is disabled in development.
pub const DEV_USER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);
pub const DEV_USER_EMAIL: &str = "dev@localhost";

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The authenticated caller, stored as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct SupabaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// JWT verification settings used by middleware.
#[derive(Clone)]
pub struct AuthState {
    decoding_key: Option<DecodingKey>,
    validation: Arc<Validation>,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("enabled", &self.enabled())
            .finish_non_exhaustive()
    }
}

impl AuthState {
    /// Builds auth from the Supabase JWT secret.
    ///
    /// In development a missing secret disables verification and every request
    /// runs as [`DEV_USER_ID`]. Elsewhere a missing secret fails startup.
    pub fn from_secret(secret: Option<&str>, is_development: bool) -> anyhow::Result<Self> {
        match secret.map(str::trim).filter(|s| !s.is_empty()) {
            Some(secret) => Ok(Self::with_secret(secret)),
            None if is_development => {
                tracing::warn!(
                    "SUPABASE_JWT_SECRET not set; requests run as the development user"
                );
                Ok(Self::development())
            }
            None => anyhow::bail!("SUPABASE_JWT_SECRET is required outside development"),
        }
    }

    #[must_use]
    pub fn with_secret(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[SUPABASE_AUDIENCE]);
        Self {
            decoding_key: Some(DecodingKey::from_secret(secret.as_bytes())),
            validation: Arc::new(validation),
        }
    }

    #[must_use]
    pub fn development() -> Self {
        Self {
            decoding_key: None,
            validation: Arc::new(Validation::new(Algorithm::HS256)),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.decoding_key.is_some()
    }

    fn verify(&self, token: &str) -> Option<CurrentUser> {
        let key = self.decoding_key.as_ref()?;
        let claims = match decode::<SupabaseClaims>(token, key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, "rejected access token");
                return None;
            }
        };
        let id = Uuid::parse_str(&claims.sub).ok()?;
        Some(CurrentUser {
            id,
            email: claims.email.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter shared by all authenticated routes.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware resolving the caller from a Supabase bearer token into a
/// [`CurrentUser`] extension.
pub async fn require_user(State(auth): State<AuthState>, mut req: Request, next: Next) -> Response {
    if !auth.enabled() {
        req.extensions_mut().insert(CurrentUser {
            id: DEV_USER_ID,
            email: DEV_USER_EMAIL.to_string(),
        });
        return next.run(req).await;
    }

    let user = extract_bearer_token(req.headers().get(AUTHORIZATION)).and_then(|t| auth.verify(t));
    match user {
        Some(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None => ApiError::new(
            request_id_of(&req),
            "unauthorized",
            "missing or invalid bearer token",
        )
        .into_response(),
    }
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        drop(window);
        return ApiError::new(request_id_of(&req), "rate_limited", "rate limit exceeded")
            .into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters";

    fn token(claims: &serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap_or_else(|e| panic!("encode token: {e}"))
    }

    fn claims(sub: &str, aud: &str) -> serde_json::Value {
        json!({
            "sub": sub,
            "aud": aud,
            "email": "jane.doe@smallbiz.io",
            "role": "authenticated",
            "exp": chrono::Utc::now().timestamp() + 3600,
        })
    }

    #[test]
    fn extract_bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(extract_bearer_token(Some(&header)), Some("test-token"));
    }

    #[test]
    fn extract_bearer_token_rejects_non_bearer_header() {
        let header = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer_token(Some(&header)), None);
        assert_eq!(extract_bearer_token(None), None);
    }

    #[test]
    fn valid_supabase_token_resolves_user() {
        let user_id = Uuid::new_v4();
        let auth = AuthState::with_secret(SECRET);
        let user = auth
            .verify(&token(&claims(&user_id.to_string(), "authenticated"), SECRET))
            .expect("token should verify");
        assert_eq!(user.id, user_id);
        assert_eq!(user.email, "jane.doe@smallbiz.io");
    }

    #[test]
    fn wrong_audience_secret_or_subject_is_rejected() {
        let auth = AuthState::with_secret(SECRET);
        let user_id = Uuid::new_v4().to_string();
        assert!(auth
            .verify(&token(&claims(&user_id, "anon"), SECRET))
            .is_none());
        assert!(auth
            .verify(&token(&claims(&user_id, "authenticated"), "other-secret"))
            .is_none());
        assert!(auth
            .verify(&token(&claims("not-a-uuid", "authenticated"), SECRET))
            .is_none());
        assert!(auth.verify("garbage").is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = AuthState::with_secret(SECRET);
        let mut expired = claims(&Uuid::new_v4().to_string(), "authenticated");
        expired["exp"] = json!(chrono::Utc::now().timestamp() - 3600);
        assert!(auth.verify(&token(&expired, SECRET)).is_none());
    }

    #[test]
    fn missing_secret_only_allowed_in_development() {
        let dev = AuthState::from_secret(None, true).expect("dev should allow missing secret");
        assert!(!dev.enabled());
        assert!(AuthState::from_secret(Some("  "), false).is_err());
        assert!(AuthState::from_secret(Some(SECRET), false)
            .expect("secret")
            .enabled());
    }
}
