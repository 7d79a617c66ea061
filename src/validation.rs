use std::collections::BTreeMap;

use crate::error::ApiError;
use crate::models::{AnnouncementInput, BelieversClassInput, EventInput, GroupInput, TeamInput};

pub type FieldErrors = BTreeMap<String, String>;

pub const MAX_PAGE_SIZE: u32 = 50;
pub const MIN_PASSWORD_LEN: usize = 8;

pub fn validate_page_size(value: u32) -> Result<u32, ApiError> {
    if (1..=MAX_PAGE_SIZE).contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(format!(
            "max_results must be between 1 and {MAX_PAGE_SIZE}"
        )))
    }
}

fn too_short(value: &str, min: usize) -> bool {
    value.trim().chars().count() < min
}

fn finish(errors: FieldErrors) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

pub fn validate_event(input: &EventInput) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    if too_short(&input.title, 3) {
        errors.insert("title".into(), "Title must be at least 3 characters.".into());
    }
    if input.start.is_none() {
        errors.insert("start".into(), "Start date/time is required.".into());
    }
    if input.end.is_none() {
        errors.insert("end".into(), "End date/time is required.".into());
    }
    if too_short(&input.location, 3) {
        errors.insert(
            "location".into(),
            "Location must be at least 3 characters.".into(),
        );
    }
    finish(errors)
}

pub fn validate_team(input: &TeamInput, has_leader_column: bool) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    if too_short(&input.group_name, 2) {
        errors.insert("group_name".into(), "Group is required.".into());
    }
    if too_short(&input.name, 3) {
        errors.insert("name".into(), "Name must be at least 3 characters.".into());
    }
    if has_leader_column && too_short(&input.leader, 2) {
        errors.insert("leader".into(), "Leader name is required.".into());
    }
    if too_short(&input.description, 10) {
        errors.insert(
            "description".into(),
            "Description must be at least 10 characters.".into(),
        );
    }
    finish(errors)
}

pub fn validate_group(input: &GroupInput) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    if too_short(&input.name, 3) {
        errors.insert("name".into(), "Name must be at least 3 characters.".into());
    }
    if too_short(&input.meeting_time, 3) {
        errors.insert("meeting_time".into(), "Meeting time is required.".into());
    }
    if too_short(&input.description, 10) {
        errors.insert(
            "description".into(),
            "Description must be at least 10 characters.".into(),
        );
    }
    finish(errors)
}

pub fn validate_announcement(input: &AnnouncementInput) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    if too_short(&input.title, 3) {
        errors.insert("title".into(), "Title must be at least 3 characters.".into());
    }
    if too_short(&input.content, 10) {
        errors.insert(
            "content".into(),
            "Content must be at least 10 characters.".into(),
        );
    }
    finish(errors)
}

pub fn validate_believers_class(input: &BelieversClassInput) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    if too_short(&input.starts_label, 3) {
        errors.insert("starts_label".into(), "Start date is required.".into());
    }
    if too_short(&input.duration_label, 2) {
        errors.insert("duration_label".into(), "Duration is required.".into());
    }
    finish(errors)
}

pub fn validate_new_password(new_password: &str, confirm_password: &str) -> Result<(), ApiError> {
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "New password must be at least {MIN_PASSWORD_LEN} characters long."
        )));
    }
    if new_password != confirm_password {
        return Err(ApiError::BadRequest("Passwords do not match.".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{AnnouncementStatus, EventCategory};

    fn field_errors(result: Result<(), ApiError>) -> FieldErrors {
        match result {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_page_size() {
        assert!(validate_page_size(1).is_ok());
        assert!(validate_page_size(50).is_ok());
        assert!(validate_page_size(0).is_err());
        assert!(validate_page_size(51).is_err());
    }

    #[test]
    fn test_validate_event_reports_every_field() {
        let input = EventInput {
            title: "  ab ".into(),
            description: String::new(),
            category: EventCategory::Worship,
            location: "x".into(),
            start: None,
            end: None,
            image_url: String::new(),
        };
        let errors = field_errors(validate_event(&input));
        assert_eq!(errors.len(), 4);
        assert!(errors.contains_key("title"));
        assert!(errors.contains_key("start"));
        assert!(errors.contains_key("end"));
        assert!(errors.contains_key("location"));

        let valid = EventInput {
            title: "Sunday Service".into(),
            location: "Main hall".into(),
            start: Some(Utc::now()),
            end: Some(Utc::now()),
            ..input
        };
        assert!(validate_event(&valid).is_ok());
    }

    #[test]
    fn test_validate_team_leader_depends_on_column() {
        let input = TeamInput {
            group_name: "Support".into(),
            name: "Welcome".into(),
            leader: String::new(),
            description: "Greeting people at the door".into(),
        };
        let errors = field_errors(validate_team(&input, true));
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["leader"]);
        assert!(validate_team(&input, false).is_ok());
    }

    #[test]
    fn test_validate_group_and_announcement() {
        let group = GroupInput {
            name: "Southside".into(),
            meeting_time: "Tue".into(),
            description: "short".into(),
        };
        let errors = field_errors(validate_group(&group));
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["description"]);

        let announcement = AnnouncementInput {
            title: "Hi".into(),
            content: "Church picnic on Saturday".into(),
            status: AnnouncementStatus::Draft,
        };
        let errors = field_errors(validate_announcement(&announcement));
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn test_validate_believers_class() {
        let input = BelieversClassInput {
            starts_label: "2025-03-02".into(),
            duration_label: "6 weeks".into(),
            is_active: true,
        };
        assert!(validate_believers_class(&input).is_ok());

        let input = BelieversClassInput {
            starts_label: " ".into(),
            duration_label: "6".into(),
            is_active: true,
        };
        let errors = field_errors(validate_believers_class(&input));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_validate_new_password() {
        assert!(validate_new_password("short", "short").is_err());
        assert!(validate_new_password("long-enough", "different").is_err());
        assert!(validate_new_password("long-enough", "long-enough").is_ok());
    }
}
