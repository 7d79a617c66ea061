use axum::extract::{Path, Query, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use crate::{
    AppState,
    error::ApiError,
    ical,
    models::{
        Announcement, BelieversClass, Event, EventCategory, EventDetail, Group, ServingTeamGroup,
        Video, VideoPage,
    },
    validation::validate_page_size,
    youtube::{DEFAULT_PAGE_SIZE, FeedRequest},
};

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub q: Option<String>,
    pub page_token: Option<String>,
    #[serde(default = "default_page_size")]
    pub max_results: u32,
    #[serde(default)]
    pub refresh: bool,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl FeedQuery {
    fn request(&self) -> Result<FeedRequest, ApiError> {
        Ok(FeedRequest {
            page_token: self.page_token.clone().filter(|t| !t.is_empty()),
            max_results: validate_page_size(self.max_results)?,
            use_cache: !self.refresh,
        })
    }

    fn search_term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub category: Option<String>,
}

impl EventsQuery {
    fn category(&self) -> Result<Option<EventCategory>, ApiError> {
        match self.category.as_deref() {
            Some(value) => EventCategory::parse_filter(value).map_err(ApiError::BadRequest),
            None => Ok(None),
        }
    }
}

#[utoipa::path(get, path = "/", tag = "site")]
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Team Church Site API",
        "endpoints": {
            "/videos": "Latest channel uploads, or search results with ?q=",
            "/videos/live": "The stream currently live, if any",
            "/events": "Upcoming events as JSON",
            "/events.ics": "Events as an iCal file",
            "/teams": "Serving teams grouped by area",
            "/groups": "Small groups",
            "/announcements": "Published announcements",
            "/believers-class": "Next Believers Class",
            "/admin": "Content admin (requires sign-in)"
        }
    }))
}

#[utoipa::path(get, path = "/healthz/live", tag = "site")]
pub async fn healthz_live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(get, path = "/healthz/ready", tag = "site")]
pub async fn healthz_ready(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "youtube_configured": state.settings.youtube_api_key.is_some()
            && state.settings.youtube_channel_id.is_some(),
        "supabase_configured": state.content.backend().is_configured(),
    }))
}

#[utoipa::path(
    get,
    path = "/videos",
    params(
        ("q" = Option<String>, Query, description = "Search term; omit for the latest uploads"),
        ("page_token" = Option<String>, Query, description = "Continuation token from a previous page"),
        ("max_results" = Option<u32>, Query, description = "Page size (1-50, default 21)"),
        ("refresh" = Option<bool>, Query, description = "Bypass the feed cache")
    ),
    responses(
        (status = 200, description = "One page of videos", body = VideoPage),
        (status = 400, description = "Invalid page size"),
        (status = 502, description = "YouTube request failed"),
        (status = 503, description = "YouTube is not configured")
    ),
    tag = "videos"
)]
pub async fn get_videos(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<VideoPage>, ApiError> {
    let request = query.request()?;
    let page = match query.search_term() {
        Some(term) => state.youtube.search_videos(term, request).await?,
        None => state.youtube.latest_videos(request).await?,
    };
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/videos/search",
    params(
        ("q" = String, Query, description = "Search term"),
        ("page_token" = Option<String>, Query, description = "Continuation token from a previous page"),
        ("max_results" = Option<u32>, Query, description = "Page size (1-50, default 21)"),
        ("refresh" = Option<bool>, Query, description = "Bypass the feed cache")
    ),
    responses(
        (status = 200, description = "One page of search results", body = VideoPage),
        (status = 400, description = "Missing search term or invalid page size")
    ),
    tag = "videos"
)]
pub async fn search_videos(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<VideoPage>, ApiError> {
    let request = query.request()?;
    let term = query
        .search_term()
        .ok_or_else(|| ApiError::BadRequest("q must not be empty".into()))?;
    Ok(Json(state.youtube.search_videos(term, request).await?))
}

#[utoipa::path(
    get,
    path = "/videos/live",
    responses(
        (status = 200, description = "The live stream, or null when the channel is offline", body = Video)
    ),
    tag = "videos"
)]
pub async fn get_live_video(
    State(state): State<AppState>,
) -> Result<Json<Option<Video>>, ApiError> {
    Ok(Json(state.youtube.active_live_video().await?))
}

#[utoipa::path(
    get,
    path = "/events",
    params(("category" = Option<String>, Query, description = "All, Worship, Community, Youth or Kids")),
    responses(
        (status = 200, description = "Events ordered by start", body = [Event]),
        (status = 400, description = "Unknown category")
    ),
    tag = "events"
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let events = state.content.list_events(query.category()?, None).await?;
    Ok(Json(events))
}

#[utoipa::path(
    get,
    path = "/events.ics",
    params(("category" = Option<String>, Query, description = "All, Worship, Community, Youth or Kids")),
    responses(
        (status = 200, description = "iCal file", content_type = "text/calendar"),
        (status = 404, description = "No events found")
    ),
    tag = "events"
)]
pub async fn events_ical(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let events = state.content.list_events(query.category()?, None).await?;
    if events.is_empty() {
        return Err(ApiError::NotFound("No events found".into()));
    }

    let body = state.exporter.generate(&events);
    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/calendar; charset=utf-8".to_string()),
            (
                "content-disposition",
                "attachment; filename=\"teamchurch_events.ics\"".to_string(),
            ),
        ],
        body,
    ))
}

#[utoipa::path(
    get,
    path = "/events/{id}",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event with calendar links", body = EventDetail),
        (status = 404, description = "Event not found")
    ),
    tag = "events"
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EventDetail>, ApiError> {
    let event = state
        .content
        .get_event(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))?;
    Ok(Json(EventDetail {
        google_calendar_url: ical::google_calendar_url(&event),
        ics_url: format!("/events/{}/ics", event.id),
        event,
    }))
}

#[utoipa::path(
    get,
    path = "/events/{id}/ics",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "iCal file for one event", content_type = "text/calendar"),
        (status = 404, description = "Event not found")
    ),
    tag = "events"
)]
pub async fn event_ical(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state
        .content
        .get_event(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))?;

    let body = state.exporter.generate(std::slice::from_ref(&event));
    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/calendar; charset=utf-8".to_string()),
            (
                "content-disposition",
                format!("attachment; filename=\"{}\"", ical::file_name(&event)),
            ),
        ],
        body,
    ))
}

#[utoipa::path(
    get,
    path = "/teams",
    responses((status = 200, description = "Active serving teams by group", body = [ServingTeamGroup])),
    tag = "content"
)]
pub async fn list_teams(
    State(state): State<AppState>,
) -> Result<Json<Vec<ServingTeamGroup>>, ApiError> {
    Ok(Json(state.content.public_teams().await?))
}

#[utoipa::path(
    get,
    path = "/groups",
    responses((status = 200, description = "Small groups", body = [Group])),
    tag = "content"
)]
pub async fn list_groups(State(state): State<AppState>) -> Result<Json<Vec<Group>>, ApiError> {
    Ok(Json(state.content.list_groups(None).await?))
}

#[utoipa::path(
    get,
    path = "/announcements",
    responses((status = 200, description = "Published announcements", body = [Announcement])),
    tag = "content"
)]
pub async fn list_announcements(
    State(state): State<AppState>,
) -> Result<Json<Vec<Announcement>>, ApiError> {
    Ok(Json(state.content.list_announcements(true, None).await?))
}

#[utoipa::path(
    get,
    path = "/believers-class",
    responses(
        (status = 200, description = "Next Believers Class, or null when none is scheduled", body = BelieversClass)
    ),
    tag = "content"
)]
pub async fn get_believers_class(
    State(state): State<AppState>,
) -> Result<Json<Option<BelieversClass>>, ApiError> {
    Ok(Json(state.content.active_believers_class().await?))
}
