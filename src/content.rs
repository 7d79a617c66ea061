//! Church content stored in Supabase tables.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::models::{
    Announcement, AnnouncementInput, AnnouncementStatus, BelieversClass, BelieversClassInput,
    BelieversClassRecord, Event, EventCategory, EventInput, Group, GroupInput, ServingTeam,
    ServingTeamGroup, TeamInput, TeamItem, TeamList, TeamRecord,
};
use crate::supabase::{BackendError, SupabaseClient, TableQuery};

pub const EVENTS_TABLE: &str = "events";
pub const TEAMS_TABLE: &str = "serving_teams";
pub const GROUPS_TABLE: &str = "groups";
pub const ANNOUNCEMENTS_TABLE: &str = "announcements";
pub const BELIEVERS_CLASS_TABLE: &str = "believers_classes";

const EVENT_COLUMNS: &str = "id,title,description,category,location,start,end,image_url";
const TEAM_COLUMNS: &str =
    "id,team_key,group_name,group_sort,team_sort,name,leader,description,is_active";
const TEAM_COLUMNS_WITHOUT_LEADER: &str =
    "id,team_key,group_name,group_sort,team_sort,name,description,is_active";
const GROUP_COLUMNS: &str = "id,name,meeting_time,description";
const ANNOUNCEMENT_COLUMNS: &str = "id,title,content,status";
const BELIEVERS_CLASS_COLUMNS: &str = "id,class_key,starts_label,duration_label,is_active";

const GROUP_SORT_ORDER: [(&str, i32); 4] = [
    ("Frontline Teams", 10),
    ("Creative & Technical", 20),
    ("Next Generation", 30),
    ("Support", 40),
];
const UNKNOWN_GROUP_SORT: i32 = 90;
const DEFAULT_TEAM_SORT: i32 = 100;
const TEAM_SORT_STEP: i32 = 10;
const KEY_BASE_LEN: usize = 40;
const KEY_SUFFIX_LEN: usize = 6;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("regex compiles"));
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("regex compiles"));

pub fn resolve_group_sort(group_name: &str) -> i32 {
    GROUP_SORT_ORDER
        .iter()
        .find(|(name, _)| *name == group_name)
        .map(|(_, sort)| *sort)
        .unwrap_or(UNKNOWN_GROUP_SORT)
}

pub fn slugify(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    let slug = NON_ALPHANUMERIC.replace_all(&lowered, "-");
    slug.trim_matches('-').chars().take(KEY_BASE_LEN).collect()
}

/// A readable key with a random suffix, e.g. `welcome-team-k3x9qa`.
pub fn generate_key(label: &str, fallback: &str) -> String {
    let base = slugify(label);
    let base = if base.is_empty() { fallback } else { base.as_str() };
    let mut rng = rand::thread_rng();
    let suffix: String = (0..KEY_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{base}-{suffix}")
}

/// `2025-03-02` becomes `02/03/2025`; anything else is kept as typed.
pub fn normalize_starts_label(label: &str) -> String {
    let trimmed = label.trim();
    if ISO_DATE.is_match(trimmed)
        && let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
    {
        return date.format("%d/%m/%Y").to_string();
    }
    trimmed.to_string()
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn to_team_item(row: TeamRecord) -> TeamItem {
    TeamItem {
        group_sort: row
            .group_sort
            .unwrap_or_else(|| resolve_group_sort(&row.group_name)),
        team_sort: row.team_sort.unwrap_or(DEFAULT_TEAM_SORT),
        id: row.id,
        team_key: row.team_key,
        group_name: row.group_name,
        name: row.name,
        leader: row.leader.unwrap_or_default(),
        description: row.description.unwrap_or_default(),
    }
}

/// Groups rows by `group_name`, keeping the order groups first appear in.
pub fn group_teams(rows: Vec<TeamRecord>) -> Vec<ServingTeamGroup> {
    let mut groups: Vec<ServingTeamGroup> = Vec::new();
    for row in rows {
        let team = ServingTeam {
            id: row.team_key,
            name: row.name,
            description: row.description.unwrap_or_default(),
        };
        match groups.iter_mut().find(|g| g.title == row.group_name) {
            Some(group) => group.teams.push(team),
            None => groups.push(ServingTeamGroup {
                title: row.group_name,
                teams: vec![team],
            }),
        }
    }
    groups
}

/// Known groups plus any group present in the data, by group sort.
pub fn group_options(teams: &[TeamItem]) -> Vec<String> {
    let mut options: Vec<String> = GROUP_SORT_ORDER
        .iter()
        .map(|(name, _)| name.to_string())
        .collect();
    for team in teams {
        if !options.contains(&team.group_name) {
            options.push(team.group_name.clone());
        }
    }
    options.sort_by_key(|name| resolve_group_sort(name));
    options
}

pub fn next_team_sort(existing: impl IntoIterator<Item = Option<i32>>) -> i32 {
    existing
        .into_iter()
        .map(|sort| sort.unwrap_or(DEFAULT_TEAM_SORT))
        .fold(0, i32::max)
        + TEAM_SORT_STEP
}

#[derive(Debug, Serialize)]
struct EventPayload {
    title: String,
    description: Option<String>,
    category: EventCategory,
    location: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    image_url: Option<String>,
}

impl From<&EventInput> for EventPayload {
    fn from(input: &EventInput) -> Self {
        Self {
            title: input.title.trim().to_string(),
            description: optional(&input.description),
            category: input.category,
            location: optional(&input.location),
            start: input.start,
            end: input.end,
            image_url: optional(&input.image_url),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TeamSortRow {
    team_sort: Option<i32>,
}

pub struct ContentStore {
    backend: SupabaseClient,
    leader_column: AtomicBool,
}

impl ContentStore {
    pub fn new(backend: SupabaseClient) -> Self {
        Self {
            backend,
            leader_column: AtomicBool::new(true),
        }
    }

    pub fn backend(&self) -> &SupabaseClient {
        &self.backend
    }

    pub fn has_leader_column(&self) -> bool {
        self.leader_column.load(Ordering::Relaxed)
    }

    fn mark_leader_column_missing(&self) {
        if self.leader_column.swap(false, Ordering::Relaxed) {
            warn!("serving_teams has no leader column, continuing without it");
        }
    }

    pub async fn list_events(
        &self,
        category: Option<EventCategory>,
        token: Option<&str>,
    ) -> Result<Vec<Event>, BackendError> {
        let mut query = TableQuery::new(EVENTS_TABLE).select(EVENT_COLUMNS);
        if let Some(category) = category {
            query = query.eq("category", category.as_str());
        }
        self.backend
            .select(&query.order("start", true), token)
            .await
    }

    pub async fn get_event(&self, id: &str) -> Result<Option<Event>, BackendError> {
        let query = TableQuery::new(EVENTS_TABLE)
            .select(EVENT_COLUMNS)
            .eq("id", id)
            .limit(1);
        let rows: Vec<Event> = self.backend.select(&query, None).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn create_event(&self, input: &EventInput, token: &str) -> Result<Event, BackendError> {
        let event: Event = self
            .backend
            .insert(EVENTS_TABLE, &EventPayload::from(input), Some(token))
            .await?;
        info!(id = %event.id, title = %event.title, "event created");
        Ok(event)
    }

    pub async fn update_event(
        &self,
        id: &str,
        input: &EventInput,
        token: &str,
    ) -> Result<Option<Event>, BackendError> {
        self.backend
            .update(EVENTS_TABLE, id, &EventPayload::from(input), Some(token))
            .await
    }

    pub async fn delete(&self, table: &str, id: &str, token: &str) -> Result<bool, BackendError> {
        let deleted = self.backend.delete(table, id, Some(token)).await?;
        if deleted {
            info!(table, id, "row deleted");
        }
        Ok(deleted)
    }

    /// Active teams for the Serve page.
    pub async fn public_teams(&self) -> Result<Vec<ServingTeamGroup>, BackendError> {
        let query = TableQuery::new(TEAMS_TABLE)
            .select(TEAM_COLUMNS_WITHOUT_LEADER)
            .eq("is_active", true)
            .order("group_sort", true)
            .order("team_sort", true)
            .order("name", true);
        let rows: Vec<TeamRecord> = self.backend.select(&query, None).await?;
        Ok(group_teams(rows))
    }

    pub async fn admin_teams(&self, token: &str) -> Result<TeamList, BackendError> {
        let query = |columns: &str| {
            TableQuery::new(TEAMS_TABLE)
                .select(columns)
                .eq("is_active", true)
                .order("group_sort", true)
                .order("team_sort", true)
                .order("name", true)
        };

        let rows: Vec<TeamRecord> = match self.backend.select(&query(TEAM_COLUMNS), Some(token)).await {
            Ok(rows) => {
                self.leader_column.store(true, Ordering::Relaxed);
                rows
            }
            Err(err) if err.is_missing_column("leader") => {
                self.mark_leader_column_missing();
                self.backend
                    .select(&query(TEAM_COLUMNS_WITHOUT_LEADER), Some(token))
                    .await?
            }
            Err(err) => return Err(err),
        };

        let teams: Vec<TeamItem> = rows.into_iter().map(to_team_item).collect();
        Ok(TeamList {
            group_options: group_options(&teams),
            has_leader_column: self.has_leader_column(),
            teams,
        })
    }

    fn team_payload(&self, input: &TeamInput, with_leader: bool) -> Map<String, Value> {
        let group_name = input.group_name.trim();
        let mut payload = Map::new();
        payload.insert("group_name".into(), json!(group_name));
        payload.insert("group_sort".into(), json!(resolve_group_sort(group_name)));
        payload.insert("name".into(), json!(input.name.trim()));
        payload.insert("description".into(), json!(optional(&input.description)));
        payload.insert("is_active".into(), json!(true));
        if with_leader {
            payload.insert("leader".into(), json!(optional(&input.leader)));
        }
        payload
    }

    pub async fn create_team(&self, input: &TeamInput, token: &str) -> Result<TeamItem, BackendError> {
        let group_name = input.group_name.trim();
        let sorts_query = TableQuery::new(TEAMS_TABLE)
            .select("team_sort")
            .eq("group_name", group_name);
        let sorts: Vec<TeamSortRow> = self.backend.select(&sorts_query, Some(token)).await?;
        let team_sort = next_team_sort(sorts.into_iter().map(|row| row.team_sort));
        let team_key = generate_key(&input.name, "team");

        let build = |with_leader: bool| {
            let mut payload = self.team_payload(input, with_leader);
            payload.insert("team_key".into(), json!(team_key));
            payload.insert("team_sort".into(), json!(team_sort));
            payload
        };

        let with_leader = self.has_leader_column();
        let row: TeamRecord = match self
            .backend
            .insert(TEAMS_TABLE, &build(with_leader), Some(token))
            .await
        {
            Err(err) if with_leader && err.is_missing_column("leader") => {
                self.mark_leader_column_missing();
                self.backend
                    .insert(TEAMS_TABLE, &build(false), Some(token))
                    .await?
            }
            other => other?,
        };
        info!(team_key = %row.team_key, group = %row.group_name, "serving team created");
        Ok(to_team_item(row))
    }

    pub async fn update_team(
        &self,
        id: &str,
        input: &TeamInput,
        token: &str,
    ) -> Result<Option<TeamItem>, BackendError> {
        let with_leader = self.has_leader_column();
        let row: Option<TeamRecord> = match self
            .backend
            .update(TEAMS_TABLE, id, &self.team_payload(input, with_leader), Some(token))
            .await
        {
            Err(err) if with_leader && err.is_missing_column("leader") => {
                self.mark_leader_column_missing();
                self.backend
                    .update(TEAMS_TABLE, id, &self.team_payload(input, false), Some(token))
                    .await?
            }
            other => other?,
        };
        Ok(row.map(to_team_item))
    }

    pub async fn list_groups(&self, token: Option<&str>) -> Result<Vec<Group>, BackendError> {
        let query = TableQuery::new(GROUPS_TABLE)
            .select(GROUP_COLUMNS)
            .order("name", true);
        self.backend.select(&query, token).await
    }

    fn group_payload(input: &GroupInput) -> Value {
        json!({
            "name": input.name.trim(),
            "meeting_time": input.meeting_time.trim(),
            "description": input.description.trim(),
        })
    }

    pub async fn create_group(&self, input: &GroupInput, token: &str) -> Result<Group, BackendError> {
        self.backend
            .insert(GROUPS_TABLE, &Self::group_payload(input), Some(token))
            .await
    }

    pub async fn update_group(
        &self,
        id: &str,
        input: &GroupInput,
        token: &str,
    ) -> Result<Option<Group>, BackendError> {
        self.backend
            .update(GROUPS_TABLE, id, &Self::group_payload(input), Some(token))
            .await
    }

    pub async fn list_announcements(
        &self,
        published_only: bool,
        token: Option<&str>,
    ) -> Result<Vec<Announcement>, BackendError> {
        let mut query = TableQuery::new(ANNOUNCEMENTS_TABLE).select(ANNOUNCEMENT_COLUMNS);
        if published_only {
            query = query.eq("status", "Published");
        }
        self.backend.select(&query, token).await
    }

    fn announcement_payload(input: &AnnouncementInput) -> Value {
        json!({
            "title": input.title.trim(),
            "content": input.content.trim(),
            "status": input.status,
        })
    }

    pub async fn create_announcement(
        &self,
        input: &AnnouncementInput,
        token: &str,
    ) -> Result<Announcement, BackendError> {
        let announcement: Announcement = self
            .backend
            .insert(
                ANNOUNCEMENTS_TABLE,
                &Self::announcement_payload(input),
                Some(token),
            )
            .await?;
        if announcement.status == AnnouncementStatus::Published {
            info!(id = %announcement.id, "announcement published");
        }
        Ok(announcement)
    }

    pub async fn update_announcement(
        &self,
        id: &str,
        input: &AnnouncementInput,
        token: &str,
    ) -> Result<Option<Announcement>, BackendError> {
        self.backend
            .update(
                ANNOUNCEMENTS_TABLE,
                id,
                &Self::announcement_payload(input),
                Some(token),
            )
            .await
    }

    /// The most recently updated active class, if any.
    pub async fn active_believers_class(&self) -> Result<Option<BelieversClass>, BackendError> {
        let query = TableQuery::new(BELIEVERS_CLASS_TABLE)
            .select(BELIEVERS_CLASS_COLUMNS)
            .eq("is_active", true)
            .order("updated_at", false)
            .limit(1);
        let rows: Vec<BelieversClassRecord> = self.backend.select(&query, None).await?;
        Ok(rows.into_iter().next().map(BelieversClass::from))
    }

    pub async fn list_believers_classes(
        &self,
        token: &str,
    ) -> Result<Vec<BelieversClassRecord>, BackendError> {
        let query = TableQuery::new(BELIEVERS_CLASS_TABLE)
            .select(BELIEVERS_CLASS_COLUMNS)
            .order("updated_at", false);
        self.backend.select(&query, Some(token)).await
    }

    fn believers_class_payload(input: &BelieversClassInput) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert(
            "starts_label".into(),
            json!(normalize_starts_label(&input.starts_label)),
        );
        payload.insert("duration_label".into(), json!(input.duration_label.trim()));
        payload.insert("is_active".into(), json!(input.is_active));
        payload
    }

    pub async fn create_believers_class(
        &self,
        input: &BelieversClassInput,
        token: &str,
    ) -> Result<BelieversClassRecord, BackendError> {
        let mut payload = Map::new();
        payload.insert(
            "class_key".into(),
            json!(generate_key(&input.starts_label, "believers-class")),
        );
        payload.insert("title".into(), json!("Believers Class"));
        payload.insert("register_url".into(), json!("/connect"));
        for column in [
            "summary",
            "time_label",
            "location",
            "learn_point_1",
            "learn_point_2",
            "learn_point_3",
        ] {
            payload.insert(column.into(), json!(""));
        }
        payload.extend(Self::believers_class_payload(input));

        self.backend
            .insert(BELIEVERS_CLASS_TABLE, &payload, Some(token))
            .await
    }

    pub async fn update_believers_class(
        &self,
        id: &str,
        input: &BelieversClassInput,
        token: &str,
    ) -> Result<Option<BelieversClassRecord>, BackendError> {
        self.backend
            .update(
                BELIEVERS_CLASS_TABLE,
                id,
                &Self::believers_class_payload(input),
                Some(token),
            )
            .await
    }
}
