pub mod admin;
pub mod auth;
pub mod cache;
pub mod content;
pub mod error;
pub mod handlers;
pub mod ical;
pub mod models;
pub mod openapi;
pub mod settings;
pub mod supabase;
pub mod validation;
pub mod youtube;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::LatencyUnit;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::cache::FeedCache;
use crate::content::ContentStore;
use crate::ical::ICalExporter;
use crate::openapi::ApiDoc;
use crate::settings::Settings;
use crate::supabase::SupabaseClient;
use crate::youtube::YoutubeClient;

#[derive(Clone)]
pub struct AppState {
    pub(crate) settings: Settings,
    pub(crate) youtube: Arc<YoutubeClient>,
    pub(crate) content: Arc<ContentStore>,
    pub(crate) exporter: Arc<ICalExporter>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let cache = Arc::new(FeedCache::new(
            settings.cache_ttl(),
            settings.youtube_cache_file.clone(),
        ));
        let youtube = YoutubeClient::new(
            settings.youtube_api_base_url.clone(),
            settings.youtube_api_key.clone(),
            settings.youtube_channel_id.clone(),
            cache,
        );
        let backend = SupabaseClient::new(
            settings.supabase_url.clone(),
            settings.supabase_anon_key.clone(),
        );

        Self {
            youtube: Arc::new(youtube),
            content: Arc::new(ContentStore::new(backend)),
            exporter: Arc::new(ICalExporter::default()),
            settings,
        }
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    let env_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .init();

    let state = AppState::new(settings);
    if state.settings.youtube_api_key.is_none() || state.settings.youtube_channel_id.is_none() {
        warn!("YouTube API key or channel id missing, video endpoints will return 503");
    }
    if !state.content.backend().is_configured() {
        warn!("Supabase URL or anon key missing, content endpoints will return 503");
    }

    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    info!("Starting Team Church Site API on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let public = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz/live", get(handlers::healthz_live))
        .route("/healthz/ready", get(handlers::healthz_ready))
        .route("/videos", get(handlers::get_videos))
        .route("/videos/search", get(handlers::search_videos))
        .route("/videos/live", get(handlers::get_live_video))
        .route("/events", get(handlers::list_events))
        .route("/events.ics", get(handlers::events_ical))
        .route("/events/{id}", get(handlers::get_event))
        .route("/events/{id}/ics", get(handlers::event_ical))
        .route("/teams", get(handlers::list_teams))
        .route("/groups", get(handlers::list_groups))
        .route("/announcements", get(handlers::list_announcements))
        .route("/believers-class", get(handlers::get_believers_class));

    let admin = Router::new()
        .route("/admin", get(admin::dashboard))
        .route("/admin/login", post(admin::login))
        .route("/admin/logout", post(admin::logout))
        .route("/admin/session", get(admin::session))
        .route("/admin/password", post(admin::change_password))
        .route("/admin/password/recover", post(admin::recover_password))
        .route(
            "/admin/events",
            get(admin::list_events).post(admin::create_event),
        )
        .route(
            "/admin/events/{id}",
            put(admin::update_event).delete(admin::delete_event),
        )
        .route(
            "/admin/teams",
            get(admin::list_teams).post(admin::create_team),
        )
        .route(
            "/admin/teams/{id}",
            put(admin::update_team).delete(admin::delete_team),
        )
        .route(
            "/admin/groups",
            get(admin::list_groups).post(admin::create_group),
        )
        .route(
            "/admin/groups/{id}",
            put(admin::update_group).delete(admin::delete_group),
        )
        .route(
            "/admin/announcements",
            get(admin::list_announcements).post(admin::create_announcement),
        )
        .route(
            "/admin/announcements/{id}",
            put(admin::update_announcement).delete(admin::delete_announcement),
        )
        .route(
            "/admin/believers-classes",
            get(admin::list_believers_classes).post(admin::create_believers_class),
        )
        .route(
            "/admin/believers-classes/{id}",
            put(admin::update_believers_class).delete(admin::delete_believers_class),
        );

    let mut router = public.merge(admin).with_state(state.clone());

    if state.settings.enable_swagger {
        let openapi = ApiDoc::openapi();
        let swagger = SwaggerUi::new("/docs").url("/openapi.json", openapi);
        router = router.merge(swagger);
    }

    router.layer(CorsLayer::permissive()).layer(trace_layer)
}
