use chrono::{DateTime, Utc};
use icalendar::{Calendar, Component, Event as CalendarEvent, EventLike};
use url::Url;

use crate::content::slugify;
use crate::models::Event;

const GOOGLE_CALENDAR_URL: &str = "https://calendar.google.com/calendar/render";

#[derive(Clone)]
pub struct ICalExporter {
    calendar_name: String,
}

impl Default for ICalExporter {
    fn default() -> Self {
        Self::new("Team Church Events")
    }
}

impl ICalExporter {
    pub fn new(calendar_name: impl Into<String>) -> Self {
        Self {
            calendar_name: calendar_name.into(),
        }
    }

    pub fn generate(&self, events: &[Event]) -> Vec<u8> {
        if events.is_empty() {
            return Vec::new();
        }

        let mut calendar = Calendar::new();
        calendar.name(&self.calendar_name);

        for item in events {
            let mut event = CalendarEvent::new();
            event.uid(&item.id);
            event.summary(&item.title);
            event.starts(item.start);
            event.ends(item.end);
            if let Some(description) = item.description.as_deref().filter(|d| !d.is_empty()) {
                event.description(description);
            }
            if let Some(location) = item.location.as_deref().filter(|l| !l.is_empty()) {
                event.location(location);
            }
            calendar.push(event);
        }

        calendar.to_string().into_bytes()
    }
}

fn format_utc(value: DateTime<Utc>) -> String {
    value.format("%Y%m%dT%H%M%SZ").to_string()
}

/// "Add to Google Calendar" template link for one event.
pub fn google_calendar_url(event: &Event) -> String {
    let details = [event.description.as_deref(), event.location.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    let dates = format!("{}/{}", format_utc(event.start), format_utc(event.end));

    Url::parse_with_params(
        GOOGLE_CALENDAR_URL,
        &[
            ("action", "TEMPLATE"),
            ("text", event.title.as_str()),
            ("details", details.as_str()),
            ("location", event.location.as_deref().unwrap_or("")),
            ("dates", dates.as_str()),
        ],
    )
    .map(String::from)
    .unwrap_or_else(|_| GOOGLE_CALENDAR_URL.to_string())
}

/// Download name for one event; only `[a-z0-9-]` so it is safe in a header.
pub fn file_name(event: &Event) -> String {
    let stem = slugify(&event.title);
    if stem.is_empty() {
        format!("event-{}.ics", slugify(&event.id))
    } else {
        format!("{stem}.ics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventCategory;

    fn event() -> Event {
        Event {
            id: "evt-1".to_string(),
            title: "Night of Worship".to_string(),
            description: Some("An evening of songs".to_string()),
            category: EventCategory::Worship,
            location: Some("Main hall".to_string()),
            start: "2025-11-23T18:00:00Z".parse().unwrap(),
            end: "2025-11-23T20:30:00Z".parse().unwrap(),
            image_url: None,
        }
    }

    #[test]
    fn test_generate_single_event() {
        let exporter = ICalExporter::default();
        let bytes = exporter.generate(&[event()]);
        let body = String::from_utf8(bytes).unwrap();
        assert!(body.contains("BEGIN:VCALENDAR"));
        assert!(body.contains("BEGIN:VEVENT"));
        assert!(body.contains("SUMMARY:Night of Worship"));
        assert!(body.contains("UID:evt-1"));
        assert!(body.contains("LOCATION:Main hall"));
    }

    #[test]
    fn test_generate_empty() {
        let exporter = ICalExporter::default();
        assert!(exporter.generate(&[]).is_empty());
    }

    #[test]
    fn test_google_calendar_url() {
        let url = Url::parse(&google_calendar_url(&event())).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["action"], "TEMPLATE");
        assert_eq!(params["text"], "Night of Worship");
        assert_eq!(params["details"], "An evening of songs\n\nMain hall");
        assert_eq!(params["dates"], "20251123T180000Z/20251123T203000Z");
    }

    #[test]
    fn test_file_name() {
        let mut item = event();
        item.title = "Youth  Camp Weekend".to_string();
        assert_eq!(file_name(&item), "youth-camp-weekend.ics");

        item.title = r#"Say "Hi"; now"#.to_string();
        assert_eq!(file_name(&item), "say-hi-now.ics");

        item.title = "!!!".to_string();
        assert_eq!(file_name(&item), "event-evt-1.ics");
    }
}
