use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Row ids are uuid strings or bigint identities depending on the table.
fn string_or_number_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RowId {
        Text(String),
        Number(i64),
    }

    Ok(match RowId::deserialize(deserializer)? {
        RowId::Text(id) => id,
        RowId::Number(id) => id.to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Publication timestamp as reported by YouTube, empty when unknown.
    pub published_at: String,
    pub thumbnail_url: String,
    pub embed_url: String,
    pub video_url: String,
    /// ISO-8601 duration, e.g. `PT1H2M3S`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<String>,
}

impl Video {
    pub fn embed_url_for(id: &str) -> String {
        format!("https://www.youtube.com/embed/{id}")
    }

    pub fn watch_url_for(id: &str) -> String {
        format!("https://www.youtube.com/watch?v={id}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct VideoPage {
    pub videos: Vec<Video>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum EventCategory {
    Worship,
    Community,
    Youth,
    Kids,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Worship => "Worship",
            EventCategory::Community => "Community",
            EventCategory::Youth => "Youth",
            EventCategory::Kids => "Kids",
        }
    }

    /// Parses a filter value; `All` (any case) means no filter.
    pub fn parse_filter(value: &str) -> Result<Option<Self>, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(None),
            "worship" => Ok(Some(EventCategory::Worship)),
            "community" => Ok(Some(EventCategory::Community)),
            "youth" => Ok(Some(EventCategory::Youth)),
            "kids" => Ok(Some(EventCategory::Kids)),
            other => Err(format!("unknown event category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Event {
    #[serde(deserialize_with = "string_or_number_id")]
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: EventCategory,
    pub location: Option<String>,
    #[schema(value_type = String, format = "date-time", example = "2025-11-23T10:30:00Z")]
    pub start: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time", example = "2025-11-23T12:00:00Z")]
    pub end: DateTime<Utc>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub google_calendar_url: String,
    pub ics_url: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EventInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: EventCategory,
    #[serde(default)]
    pub location: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub start: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_url: String,
}

/// Row of the `serving_teams` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TeamRecord {
    #[serde(deserialize_with = "string_or_number_id")]
    pub id: String,
    pub team_key: String,
    pub group_name: String,
    pub group_sort: Option<i32>,
    pub team_sort: Option<i32>,
    pub name: String,
    #[serde(default)]
    pub leader: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
}

/// Admin view of a serving team with sort keys resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TeamItem {
    pub id: String,
    pub team_key: String,
    pub group_name: String,
    pub group_sort: i32,
    pub team_sort: i32,
    pub name: String,
    pub leader: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TeamList {
    pub teams: Vec<TeamItem>,
    pub group_options: Vec<String>,
    pub has_leader_column: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TeamInput {
    pub group_name: String,
    pub name: String,
    #[serde(default)]
    pub leader: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ServingTeam {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ServingTeamGroup {
    pub title: String,
    pub teams: Vec<ServingTeam>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Group {
    #[serde(deserialize_with = "string_or_number_id")]
    pub id: String,
    pub name: String,
    pub meeting_time: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupInput {
    pub name: String,
    pub meeting_time: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum AnnouncementStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Announcement {
    #[serde(deserialize_with = "string_or_number_id")]
    pub id: String,
    pub title: String,
    pub content: String,
    pub status: AnnouncementStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnnouncementInput {
    pub title: String,
    pub content: String,
    pub status: AnnouncementStatus,
}

/// Row of the `believers_classes` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct BelieversClassRecord {
    #[serde(deserialize_with = "string_or_number_id")]
    pub id: String,
    pub class_key: String,
    pub starts_label: Option<String>,
    pub duration_label: Option<String>,
    pub is_active: bool,
}

/// The schedule entry shown on the Serve page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct BelieversClass {
    pub id: String,
    pub starts_label: String,
    pub duration_label: String,
}

impl From<BelieversClassRecord> for BelieversClass {
    fn from(row: BelieversClassRecord) -> Self {
        Self {
            id: row.id,
            starts_label: row.starts_label.unwrap_or_default(),
            duration_label: row.duration_label.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BelieversClassInput {
    pub starts_label: String,
    pub duration_label: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}
