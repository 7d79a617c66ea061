use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::supabase::BackendError;
use crate::validation::FieldErrors;
use crate::youtube::YoutubeError;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    Validation(FieldErrors),
    NotFound(String),
    BadGateway(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "errors": errors })),
            )
                .into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg).into_response()
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
        }
    }
}

impl From<YoutubeError> for ApiError {
    fn from(value: YoutubeError) -> Self {
        match value {
            YoutubeError::MissingConfig => ApiError::ServiceUnavailable(value.to_string()),
            YoutubeError::UploadsPlaylistNotFound | YoutubeError::Api { .. } => {
                error!(error = %value, "YouTube request failed");
                ApiError::BadGateway(value.to_string())
            }
            YoutubeError::Url(err) => ApiError::Internal(err.to_string()),
            YoutubeError::Http(err) => {
                error!("HTTP error: {err}");
                ApiError::BadGateway("Failed to fetch videos".into())
            }
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(value: BackendError) -> Self {
        if value.is_invalid_input() {
            return ApiError::BadRequest(value.to_string());
        }
        match value {
            BackendError::NotConfigured => ApiError::ServiceUnavailable(value.to_string()),
            // Sessions are checked before any table access, so a 403 here is
            // a row-level security denial on a valid session.
            BackendError::Api {
                status: 403,
                message,
                ..
            } => ApiError::Forbidden(message),
            BackendError::Api {
                status,
                code,
                message,
            } => {
                error!(status, code = ?code, message = %message, "Supabase request failed");
                ApiError::BadGateway(message)
            }
            BackendError::Decode(err) => {
                error!(error = %err, "Supabase response did not match the expected shape");
                ApiError::BadGateway(format!("Unexpected Supabase response: {err}"))
            }
            BackendError::Url(err) => ApiError::Internal(err.to_string()),
            BackendError::Http(err) => {
                error!("HTTP error: {err}");
                ApiError::BadGateway("Failed to reach Supabase".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_missing_config_is_unavailable() {
        let err: ApiError = YoutubeError::MissingConfig.into();
        assert!(matches!(err, ApiError::ServiceUnavailable(msg) if msg == "MISSING_YOUTUBE_CONFIG"));
    }

    #[test]
    fn test_backend_status_mapping() {
        let api = |status: u16, code: Option<&str>, message: &str| BackendError::Api {
            status,
            code: code.map(str::to_string),
            message: message.to_string(),
        };

        let err: ApiError = api(400, Some("22P02"), "invalid input syntax for type uuid").into();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err: ApiError = api(
            403,
            Some("42501"),
            "new row violates row-level security policy for table \"groups\"",
        )
        .into();
        assert!(matches!(err, ApiError::Forbidden(msg) if msg.contains("row-level security")));

        let err: ApiError = api(401, Some("PGRST301"), "JWT expired").into();
        assert!(matches!(err, ApiError::BadGateway(msg) if msg == "JWT expired"));

        let err: ApiError = api(
            404,
            Some("PGRST205"),
            "Could not find the table 'public.groups' in the schema cache",
        )
        .into();
        assert!(matches!(err, ApiError::BadGateway(msg) if msg.contains("public.groups")));

        let err: ApiError = api(503, None, "upstream down").into();
        assert!(matches!(err, ApiError::BadGateway(msg) if msg == "upstream down"));
    }

    #[test]
    fn test_backend_decode_failure_is_bad_gateway() {
        let decode = serde_json::from_str::<Vec<crate::models::Group>>(r#"[{"id":1}]"#)
            .unwrap_err();
        let err: ApiError = BackendError::Decode(decode).into();
        assert!(
            matches!(err, ApiError::BadGateway(msg) if msg.starts_with("Unexpected Supabase response: missing field"))
        );
    }

    #[test]
    fn test_validation_response_status() {
        let mut errors = FieldErrors::new();
        errors.insert("title".into(), "Title must be at least 3 characters.".into());
        let response = ApiError::Validation(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
