//! Sign-in flow and content CRUD for the admin panel.
//!
//! Every route except login and password recovery goes through
//! [`require_admin`], and writes are sent with the admin's own access token
//! so the backend's row-level security applies.

use axum::extract::{Path, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::{
    AppState,
    auth::{
        self, AuthStatus, bearer_token, password_changed_metadata, require_admin,
        requires_password_change, resolve_redirect_path, resolve_session,
    },
    content::{ANNOUNCEMENTS_TABLE, BELIEVERS_CLASS_TABLE, EVENTS_TABLE, GROUPS_TABLE, TEAMS_TABLE},
    error::ApiError,
    models::{
        Announcement, AnnouncementInput, BelieversClassInput, BelieversClassRecord, Event,
        EventInput, Group, GroupInput, TeamInput, TeamItem, TeamList,
    },
    supabase::{AuthSession, AuthUser, BackendError, UserUpdate},
    validation,
};

type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

fn header(auth: BearerHeader) -> Option<Authorization<Bearer>> {
    auth.map(|TypedHeader(a)| a)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Admin page the user was sent away from.
    pub from: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub session: AuthSession,
    pub must_change_password: bool,
    pub redirect_to: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub state: AuthStatus,
    pub user: Option<AuthUser>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordChangeRequest {
    pub new_password: String,
    pub confirm_password: String,
    pub from: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PasswordChangeResponse {
    pub user: AuthUser,
    pub redirect_to: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecoverRequest {
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardSection {
    pub title: &'static str,
    pub description: &'static str,
    pub path: &'static str,
}

const DASHBOARD: [DashboardSection; 5] = [
    DashboardSection {
        title: "Events",
        description: "Add and update upcoming events.",
        path: "/admin/events",
    },
    DashboardSection {
        title: "Teams",
        description: "Manage serving teams and details.",
        path: "/admin/teams",
    },
    DashboardSection {
        title: "Believers Class",
        description: "Edit the class content shown on the Serve page.",
        path: "/admin/believers-classes",
    },
    DashboardSection {
        title: "Groups",
        description: "Publish and edit small groups.",
        path: "/admin/groups",
    },
    DashboardSection {
        title: "Announcements",
        description: "Post updates for the church.",
        path: "/admin/announcements",
    },
];

fn not_found(what: &str) -> ApiError {
    ApiError::NotFound(format!("{what} not found"))
}

fn deleted(found: bool, what: &str) -> Result<StatusCode, ApiError> {
    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(what))
    }
}

#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid login credentials"),
        (status = 503, description = "Supabase is not configured")
    ),
    tag = "admin"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let session = state
        .content
        .backend()
        .sign_in_with_password(request.email.trim(), &request.password)
        .await
        .map_err(|err| match err {
            BackendError::Api {
                status, message, ..
            } if status < 500 => ApiError::Unauthorized(message),
            other => other.into(),
        })?;

    let must_change_password = requires_password_change(&session.user.user_metadata);
    info!(user_id = %session.user.id, must_change_password, "admin signed in");
    Ok(Json(LoginResponse {
        must_change_password,
        redirect_to: resolve_redirect_path(request.from.as_deref()),
        session,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/logout",
    responses((status = 204, description = "Signed out")),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn logout(
    State(state): State<AppState>,
    auth: BearerHeader,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(header(auth))
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session".into()))?;
    state.content.backend().sign_out(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/session",
    responses((status = 200, description = "Current auth state", body = SessionResponse)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn session(State(state): State<AppState>, auth: BearerHeader) -> Json<SessionResponse> {
    let resolved = resolve_session(state.content.backend(), bearer_token(header(auth))).await;
    Json(SessionResponse {
        state: resolved.status(),
        user: resolved.user().cloned(),
    })
}

#[utoipa::path(
    post,
    path = "/admin/password",
    request_body = PasswordChangeRequest,
    responses(
        (status = 200, description = "Password updated", body = PasswordChangeResponse),
        (status = 400, description = "Password too short or confirmation mismatch"),
        (status = 401, description = "Invalid or expired session")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn change_password(
    State(state): State<AppState>,
    auth: BearerHeader,
    Json(request): Json<PasswordChangeRequest>,
) -> Result<Json<PasswordChangeResponse>, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), true).await?;
    validation::validate_new_password(&request.new_password, &request.confirm_password)?;

    let update = UserUpdate {
        password: Some(request.new_password),
        data: Some(password_changed_metadata(
            &admin.user.user_metadata,
            chrono::Utc::now(),
        )),
    };
    let user = state
        .content
        .backend()
        .update_user(&admin.access_token, &update)
        .await
        .map_err(|err| match err {
            // GoTrue rejects weak or reused passwords with 400/422.
            BackendError::Api {
                status: 400 | 422,
                message,
                ..
            } => ApiError::BadRequest(message),
            other => other.into(),
        })?;
    info!(user_id = %user.id, "admin password changed");
    Ok(Json(PasswordChangeResponse {
        user,
        redirect_to: resolve_redirect_path(request.from.as_deref()),
    }))
}

#[utoipa::path(
    post,
    path = "/admin/password/recover",
    request_body = RecoverRequest,
    responses((status = 202, description = "Recovery email requested")),
    tag = "admin"
)]
pub async fn recover_password(
    State(state): State<AppState>,
    Json(request): Json<RecoverRequest>,
) -> Result<StatusCode, ApiError> {
    let email = request.email.trim();
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email is required.".into()));
    }
    state
        .content
        .backend()
        .recover_password(email, state.settings.password_reset_redirect.as_deref())
        .await?;
    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    get,
    path = "/admin",
    responses((status = 200, description = "Admin areas", body = [DashboardSection])),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    auth: BearerHeader,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(state.content.backend(), header(auth), false).await?;
    Ok(Json(DASHBOARD))
}

#[utoipa::path(
    get,
    path = "/admin/events",
    responses((status = 200, description = "All events", body = [Event])),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_events(
    State(state): State<AppState>,
    auth: BearerHeader,
) -> Result<Json<Vec<Event>>, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    Ok(Json(
        state
            .content
            .list_events(None, Some(&admin.access_token))
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/admin/events",
    request_body = EventInput,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn create_event(
    State(state): State<AppState>,
    auth: BearerHeader,
    Json(input): Json<EventInput>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    validation::validate_event(&input)?;
    let event = state
        .content
        .create_event(&input, &admin.access_token)
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[utoipa::path(
    put,
    path = "/admin/events/{id}",
    params(("id" = String, Path, description = "Event id")),
    request_body = EventInput,
    responses(
        (status = 200, description = "Event updated", body = Event),
        (status = 404, description = "Event not found"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_event(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<String>,
    Json(input): Json<EventInput>,
) -> Result<Json<Event>, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    validation::validate_event(&input)?;
    state
        .content
        .update_event(&id, &input, &admin.access_token)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Event"))
}

#[utoipa::path(
    delete,
    path = "/admin/events/{id}",
    params(("id" = String, Path, description = "Event id")),
    responses((status = 204, description = "Event deleted"), (status = 404, description = "Event not found")),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_event(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    let found = state
        .content
        .delete(EVENTS_TABLE, &id, &admin.access_token)
        .await?;
    deleted(found, "Event")
}

#[utoipa::path(
    get,
    path = "/admin/teams",
    responses((status = 200, description = "Serving teams with group options", body = TeamList)),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_teams(
    State(state): State<AppState>,
    auth: BearerHeader,
) -> Result<Json<TeamList>, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    Ok(Json(state.content.admin_teams(&admin.access_token).await?))
}

#[utoipa::path(
    post,
    path = "/admin/teams",
    request_body = TeamInput,
    responses(
        (status = 201, description = "Team created", body = TeamItem),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn create_team(
    State(state): State<AppState>,
    auth: BearerHeader,
    Json(input): Json<TeamInput>,
) -> Result<(StatusCode, Json<TeamItem>), ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    validation::validate_team(&input, state.content.has_leader_column())?;
    let team = state
        .content
        .create_team(&input, &admin.access_token)
        .await?;
    Ok((StatusCode::CREATED, Json(team)))
}

#[utoipa::path(
    put,
    path = "/admin/teams/{id}",
    params(("id" = String, Path, description = "Team id")),
    request_body = TeamInput,
    responses(
        (status = 200, description = "Team updated", body = TeamItem),
        (status = 404, description = "Team not found"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_team(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<String>,
    Json(input): Json<TeamInput>,
) -> Result<Json<TeamItem>, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    validation::validate_team(&input, state.content.has_leader_column())?;
    state
        .content
        .update_team(&id, &input, &admin.access_token)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Team"))
}

#[utoipa::path(
    delete,
    path = "/admin/teams/{id}",
    params(("id" = String, Path, description = "Team id")),
    responses((status = 204, description = "Team deleted"), (status = 404, description = "Team not found")),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_team(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    let found = state
        .content
        .delete(TEAMS_TABLE, &id, &admin.access_token)
        .await?;
    deleted(found, "Team")
}

#[utoipa::path(
    get,
    path = "/admin/groups",
    responses((status = 200, description = "All groups", body = [Group])),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_groups(
    State(state): State<AppState>,
    auth: BearerHeader,
) -> Result<Json<Vec<Group>>, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    Ok(Json(
        state
            .content
            .list_groups(Some(&admin.access_token))
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/admin/groups",
    request_body = GroupInput,
    responses(
        (status = 201, description = "Group created", body = Group),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn create_group(
    State(state): State<AppState>,
    auth: BearerHeader,
    Json(input): Json<GroupInput>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    validation::validate_group(&input)?;
    let group = state
        .content
        .create_group(&input, &admin.access_token)
        .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    put,
    path = "/admin/groups/{id}",
    params(("id" = String, Path, description = "Group id")),
    request_body = GroupInput,
    responses(
        (status = 200, description = "Group updated", body = Group),
        (status = 404, description = "Group not found"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_group(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<String>,
    Json(input): Json<GroupInput>,
) -> Result<Json<Group>, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    validation::validate_group(&input)?;
    state
        .content
        .update_group(&id, &input, &admin.access_token)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Group"))
}

#[utoipa::path(
    delete,
    path = "/admin/groups/{id}",
    params(("id" = String, Path, description = "Group id")),
    responses((status = 204, description = "Group deleted"), (status = 404, description = "Group not found")),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_group(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    let found = state
        .content
        .delete(GROUPS_TABLE, &id, &admin.access_token)
        .await?;
    deleted(found, "Group")
}

#[utoipa::path(
    get,
    path = "/admin/announcements",
    responses((status = 200, description = "Drafts and published announcements", body = [Announcement])),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_announcements(
    State(state): State<AppState>,
    auth: BearerHeader,
) -> Result<Json<Vec<Announcement>>, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    Ok(Json(
        state
            .content
            .list_announcements(false, Some(&admin.access_token))
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/admin/announcements",
    request_body = AnnouncementInput,
    responses(
        (status = 201, description = "Announcement created", body = Announcement),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn create_announcement(
    State(state): State<AppState>,
    auth: BearerHeader,
    Json(input): Json<AnnouncementInput>,
) -> Result<(StatusCode, Json<Announcement>), ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    validation::validate_announcement(&input)?;
    let announcement = state
        .content
        .create_announcement(&input, &admin.access_token)
        .await?;
    Ok((StatusCode::CREATED, Json(announcement)))
}

#[utoipa::path(
    put,
    path = "/admin/announcements/{id}",
    params(("id" = String, Path, description = "Announcement id")),
    request_body = AnnouncementInput,
    responses(
        (status = 200, description = "Announcement updated", body = Announcement),
        (status = 404, description = "Announcement not found"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_announcement(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<String>,
    Json(input): Json<AnnouncementInput>,
) -> Result<Json<Announcement>, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    validation::validate_announcement(&input)?;
    state
        .content
        .update_announcement(&id, &input, &admin.access_token)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Announcement"))
}

#[utoipa::path(
    delete,
    path = "/admin/announcements/{id}",
    params(("id" = String, Path, description = "Announcement id")),
    responses((status = 204, description = "Announcement deleted"), (status = 404, description = "Announcement not found")),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_announcement(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    let found = state
        .content
        .delete(ANNOUNCEMENTS_TABLE, &id, &admin.access_token)
        .await?;
    deleted(found, "Announcement")
}

#[utoipa::path(
    get,
    path = "/admin/believers-classes",
    responses((status = 200, description = "All class entries, newest first", body = [BelieversClassRecord])),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_believers_classes(
    State(state): State<AppState>,
    auth: BearerHeader,
) -> Result<Json<Vec<BelieversClassRecord>>, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    Ok(Json(
        state
            .content
            .list_believers_classes(&admin.access_token)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/admin/believers-classes",
    request_body = BelieversClassInput,
    responses(
        (status = 201, description = "Class entry created", body = BelieversClassRecord),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn create_believers_class(
    State(state): State<AppState>,
    auth: BearerHeader,
    Json(input): Json<BelieversClassInput>,
) -> Result<(StatusCode, Json<BelieversClassRecord>), ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    validation::validate_believers_class(&input)?;
    let entry = state
        .content
        .create_believers_class(&input, &admin.access_token)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[utoipa::path(
    put,
    path = "/admin/believers-classes/{id}",
    params(("id" = String, Path, description = "Class entry id")),
    request_body = BelieversClassInput,
    responses(
        (status = 200, description = "Class entry updated", body = BelieversClassRecord),
        (status = 404, description = "Class entry not found"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_believers_class(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<String>,
    Json(input): Json<BelieversClassInput>,
) -> Result<Json<BelieversClassRecord>, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    validation::validate_believers_class(&input)?;
    state
        .content
        .update_believers_class(&id, &input, &admin.access_token)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Believers Class entry"))
}

#[utoipa::path(
    delete,
    path = "/admin/believers-classes/{id}",
    params(("id" = String, Path, description = "Class entry id")),
    responses((status = 204, description = "Class entry deleted"), (status = 404, description = "Class entry not found")),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_believers_class(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let admin = require_admin(state.content.backend(), header(auth), false).await?;
    let found = state
        .content
        .delete(BELIEVERS_CLASS_TABLE, &id, &admin.access_token)
        .await?;
    deleted(found, "Believers Class entry")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_paths_are_admin_routes() {
        for section in &DASHBOARD {
            assert!(section.path.starts_with("/admin/"));
            assert_ne!(auth::resolve_redirect_path(Some(section.path)), "/admin");
        }
    }

    #[test]
    fn test_deleted_maps_missing_rows() {
        assert_eq!(deleted(true, "Event").unwrap(), StatusCode::NO_CONTENT);
        assert!(matches!(deleted(false, "Event"), Err(ApiError::NotFound(msg)) if msg == "Event not found"));
    }
}
