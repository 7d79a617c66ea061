use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::admin::{
    DashboardSection, LoginRequest, LoginResponse, PasswordChangeRequest, PasswordChangeResponse,
    RecoverRequest, SessionResponse,
};
use crate::auth::AuthStatus;
use crate::models::{
    Announcement, AnnouncementInput, AnnouncementStatus, BelieversClass, BelieversClassInput,
    BelieversClassRecord, Event, EventCategory, EventDetail, EventInput, Group, GroupInput,
    ServingTeam, ServingTeamGroup, TeamInput, TeamItem, TeamList, Video, VideoPage,
};
use crate::supabase::{AuthSession, AuthUser};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz_live,
        crate::handlers::healthz_ready,
        crate::handlers::get_videos,
        crate::handlers::search_videos,
        crate::handlers::get_live_video,
        crate::handlers::list_events,
        crate::handlers::events_ical,
        crate::handlers::get_event,
        crate::handlers::event_ical,
        crate::handlers::list_teams,
        crate::handlers::list_groups,
        crate::handlers::list_announcements,
        crate::handlers::get_believers_class,
        crate::admin::login,
        crate::admin::logout,
        crate::admin::session,
        crate::admin::change_password,
        crate::admin::recover_password,
        crate::admin::dashboard,
        crate::admin::list_events,
        crate::admin::create_event,
        crate::admin::update_event,
        crate::admin::delete_event,
        crate::admin::list_teams,
        crate::admin::create_team,
        crate::admin::update_team,
        crate::admin::delete_team,
        crate::admin::list_groups,
        crate::admin::create_group,
        crate::admin::update_group,
        crate::admin::delete_group,
        crate::admin::list_announcements,
        crate::admin::create_announcement,
        crate::admin::update_announcement,
        crate::admin::delete_announcement,
        crate::admin::list_believers_classes,
        crate::admin::create_believers_class,
        crate::admin::update_believers_class,
        crate::admin::delete_believers_class
    ),
    components(schemas(
        Video, VideoPage, Event, EventCategory, EventDetail, EventInput, TeamItem, TeamList,
        TeamInput, ServingTeam, ServingTeamGroup, Group, GroupInput, Announcement,
        AnnouncementInput, AnnouncementStatus, BelieversClass, BelieversClassRecord,
        BelieversClassInput, AuthUser, AuthSession, AuthStatus, LoginRequest, LoginResponse,
        SessionResponse, PasswordChangeRequest, PasswordChangeResponse, RecoverRequest,
        DashboardSection
    )),
    tags(
        (name = "site", description = "Service information"),
        (name = "videos", description = "YouTube channel feed"),
        (name = "events", description = "Church events and calendar export"),
        (name = "content", description = "Teams, groups, announcements and Believers Class"),
        (name = "admin", description = "Content admin")
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes_and_security() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/videos"));
        assert!(doc.paths.paths.contains_key("/admin/events/{id}"));
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
