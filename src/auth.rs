use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::supabase::{AuthUser, SupabaseClient};

const ADMIN_HOME: &str = "/admin";
const ADMIN_LOGIN: &str = "/admin/login";

/// An authenticated admin: the bearer token plus the user it resolved to.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub access_token: String,
    pub user: AuthUser,
}

#[derive(Debug, Clone)]
pub enum AuthState {
    Authorized(AdminSession),
    MustChangePassword(AdminSession),
    Unauthorized,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Authorized,
    MustChangePassword,
    Unauthorized,
}

impl AuthState {
    pub fn status(&self) -> AuthStatus {
        match self {
            AuthState::Authorized(_) => AuthStatus::Authorized,
            AuthState::MustChangePassword(_) => AuthStatus::MustChangePassword,
            AuthState::Unauthorized => AuthStatus::Unauthorized,
        }
    }

    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            AuthState::Authorized(session) | AuthState::MustChangePassword(session) => {
                Some(&session.user)
            }
            AuthState::Unauthorized => None,
        }
    }
}

pub fn requires_password_change(metadata: &Map<String, Value>) -> bool {
    match metadata.get("must_change_password") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(flag)) => flag == "true" || flag == "1",
        Some(Value::Number(flag)) => flag.as_i64() == Some(1),
        _ => false,
    }
}

/// Where to send the admin after signing in.
pub fn resolve_redirect_path(from: Option<&str>) -> String {
    match from {
        Some(path) if path.starts_with(ADMIN_HOME) && path != ADMIN_LOGIN => path.to_string(),
        _ => ADMIN_HOME.to_string(),
    }
}

/// Metadata written alongside a password change.
pub fn password_changed_metadata(
    existing: &Map<String, Value>,
    now: chrono::DateTime<chrono::Utc>,
) -> Map<String, Value> {
    let mut data = existing.clone();
    data.insert("must_change_password".into(), Value::Bool(false));
    data.insert("password_changed_at".into(), Value::String(now.to_rfc3339()));
    data
}

pub fn bearer_token(auth: Option<Authorization<Bearer>>) -> Option<String> {
    auth.map(|a| a.token().to_string())
        .filter(|token| !token.is_empty())
}

pub async fn resolve_session(backend: &SupabaseClient, token: Option<String>) -> AuthState {
    let Some(token) = token else {
        return AuthState::Unauthorized;
    };
    match backend.get_user(&token).await {
        Ok(user) => {
            let session = AdminSession {
                access_token: token,
                user,
            };
            if requires_password_change(&session.user.user_metadata) {
                AuthState::MustChangePassword(session)
            } else {
                AuthState::Authorized(session)
            }
        }
        Err(err) => {
            if err.is_missing_jwt_user() {
                warn!("session refers to a deleted user, signing out");
                if let Err(sign_out_err) = backend.sign_out(&token).await {
                    debug!(error = %sign_out_err, "sign out of stale session failed");
                }
            } else {
                debug!(error = %err, "session lookup failed");
            }
            AuthState::Unauthorized
        }
    }
}

/// Gate for admin routes. A pending password change only passes when
/// `allow_password_change` is set.
pub async fn require_admin(
    backend: &SupabaseClient,
    auth: Option<Authorization<Bearer>>,
    allow_password_change: bool,
) -> Result<AdminSession, ApiError> {
    if !backend.is_configured() {
        return Err(ApiError::ServiceUnavailable(
            "Admin login is unavailable. Configure Supabase environment variables.".into(),
        ));
    }
    match resolve_session(backend, bearer_token(auth)).await {
        AuthState::Authorized(session) => Ok(session),
        AuthState::MustChangePassword(session) if allow_password_change => Ok(session),
        AuthState::MustChangePassword(_) => Err(ApiError::Forbidden(
            "Password change required before continuing".into(),
        )),
        AuthState::Unauthorized => Err(ApiError::Unauthorized(
            "Invalid or expired session".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn metadata(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_requires_password_change_flags() {
        for flag in [json!(true), json!("true"), json!(1), json!("1")] {
            assert!(requires_password_change(&metadata(
                json!({ "must_change_password": flag })
            )));
        }
        for flag in [json!(false), json!("yes"), json!(0), json!(null)] {
            assert!(!requires_password_change(&metadata(
                json!({ "must_change_password": flag })
            )));
        }
        assert!(!requires_password_change(&Map::new()));
    }

    #[test]
    fn test_resolve_redirect_path() {
        assert_eq!(resolve_redirect_path(Some("/admin/events")), "/admin/events");
        assert_eq!(resolve_redirect_path(Some("/admin/login")), "/admin");
        assert_eq!(resolve_redirect_path(Some("/watch")), "/admin");
        assert_eq!(resolve_redirect_path(None), "/admin");
    }

    #[test]
    fn test_password_changed_metadata_keeps_existing_fields() {
        let existing = metadata(json!({ "name": "Pastor", "must_change_password": true }));
        let now = chrono::Utc::now();
        let data = password_changed_metadata(&existing, now);
        assert_eq!(data["name"], json!("Pastor"));
        assert_eq!(data["must_change_password"], json!(false));
        assert_eq!(data["password_changed_at"], json!(now.to_rfc3339()));
    }

    #[test]
    fn test_bearer_token() {
        let auth = Authorization::bearer("secret").unwrap();
        assert_eq!(bearer_token(Some(auth)).as_deref(), Some("secret"));
        assert_eq!(bearer_token(None), None);
    }

    #[tokio::test]
    async fn test_require_admin_without_backend() {
        let backend = SupabaseClient::new(None, None);
        let err = require_admin(&backend, None, false).await.unwrap_err();
        assert!(matches!(err, ApiError::ServiceUnavailable(_)));
    }
}
