//! Thin client for the hosted Supabase project: PostgREST tables under
//! `/rest/v1` and GoTrue email/password auth under `/auth/v1`.

use std::sync::Arc;

use http::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

const MISSING_JWT_USER: &str = "User from sub claim in JWT does not exist";
const UNDEFINED_COLUMN: &str = "42703";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Supabase is not configured. Configure Supabase environment variables.")]
    NotConfigured,
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid Supabase URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Unexpected Supabase response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BackendError {
    /// The backend rejected a query because `column` does not exist.
    pub fn is_missing_column(&self, column: &str) -> bool {
        match self {
            BackendError::Api { code, message, .. } => {
                code.as_deref() == Some(UNDEFINED_COLUMN)
                    || message.to_lowercase().contains(&column.to_lowercase())
            }
            _ => false,
        }
    }

    /// Postgres rejected the submitted values (data exceptions, class 22, and
    /// integrity violations, class 23).
    pub fn is_invalid_input(&self) -> bool {
        match self {
            BackendError::Api {
                code: Some(code), ..
            } => code.len() == 5 && (code.starts_with("22") || code.starts_with("23")),
            _ => false,
        }
    }

    /// The session token belongs to a user that has since been deleted.
    pub fn is_missing_jwt_user(&self) -> bool {
        match self {
            BackendError::Api { message, .. } => message.contains(MISSING_JWT_USER),
            _ => false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<Value>,
    error_code: Option<String>,
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_error(self, status: u16, fallback: String) -> BackendError {
        let code = match self.code {
            Some(Value::String(code)) => Some(code),
            Some(Value::Number(code)) => Some(code.to_string()),
            _ => None,
        }
        .or(self.error_code);
        let message = [self.message, self.msg, self.error_description, self.error]
            .into_iter()
            .flatten()
            .find(|m| !m.is_empty())
            .unwrap_or(fallback);
        BackendError::Api {
            status,
            code,
            message,
        }
    }
}

/// A PostgREST read: `select`, `eq` filters, `order` and `limit`.
#[derive(Debug, Clone)]
pub struct TableQuery {
    table: String,
    columns: String,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<u32>,
}

impl TableQuery {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{column}.{direction}"));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.clone())];
        params.extend(self.filters.iter().cloned());
        if !self.order.is_empty() {
            params.push(("order".to_string(), self.order.join(",")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub user_metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AuthSession {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

#[derive(Debug, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

#[derive(Clone)]
pub struct SupabaseClient {
    client: reqwest::Client,
    base_url: Option<Arc<Url>>,
    anon_key: Option<String>,
}

impl SupabaseClient {
    pub fn new(base_url: Option<Url>, anon_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.map(Arc::new),
            anon_key: anon_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.anon_key.is_some()
    }

    fn config(&self) -> Result<(&Url, &str), BackendError> {
        match (self.base_url.as_deref(), self.anon_key.as_deref()) {
            (Some(url), Some(key)) => Ok((url, key)),
            _ => Err(BackendError::NotConfigured),
        }
    }

    fn url<K, V>(&self, path: &str, params: &[(K, V)]) -> Result<Url, BackendError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let (base, _) = self.config()?;
        let base = base.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/{path}"))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key.as_ref(), value.as_ref());
            }
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        url: Url,
        token: Option<&str>,
    ) -> Result<reqwest::RequestBuilder, BackendError> {
        let (_, anon_key) = self.config()?;
        let bearer = token.unwrap_or(anon_key);
        Ok(self
            .client
            .request(method, url)
            .header("apikey", anon_key)
            .header("authorization", format!("Bearer {bearer}")))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let fallback = status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
        let body: ErrorBody = response.json().await.unwrap_or_default();
        let err = body.into_error(status.as_u16(), fallback);
        debug!(status = status.as_u16(), error = %err, "Supabase returned an error");
        Err(err)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    #[instrument(skip(self, token), fields(table = query.table()))]
    pub async fn select<T: DeserializeOwned>(
        &self,
        query: &TableQuery,
        token: Option<&str>,
    ) -> Result<Vec<T>, BackendError> {
        let url = self.url(&format!("rest/v1/{}", query.table()), &query.params())?;
        let response = self.send(self.request(Method::GET, url, token)?).await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, body, token))]
    pub async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<T, BackendError> {
        let url = self.url::<&str, &str>(&format!("rest/v1/{table}"), &[])?;
        let request = self
            .request(Method::POST, url, token)?
            .header("prefer", "return=representation")
            .json(body);
        let rows: Vec<T> = Self::decode(self.send(request).await?).await?;
        rows.into_iter().next().ok_or_else(|| BackendError::Api {
            status: 500,
            code: None,
            message: format!("Insert into {table} returned no rows"),
        })
    }

    /// Updates the row with `id`; `None` when no row matched.
    #[instrument(skip(self, body, token))]
    pub async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<Option<T>, BackendError> {
        let filter = format!("eq.{id}");
        let url = self.url(&format!("rest/v1/{table}"), &[("id", filter.as_str())])?;
        let request = self
            .request(Method::PATCH, url, token)?
            .header("prefer", "return=representation")
            .json(body);
        let rows: Vec<T> = Self::decode(self.send(request).await?).await?;
        Ok(rows.into_iter().next())
    }

    /// Deletes the row with `id`; `false` when no row matched.
    #[instrument(skip(self, token))]
    pub async fn delete(&self, table: &str, id: &str, token: Option<&str>) -> Result<bool, BackendError> {
        let filter = format!("eq.{id}");
        let url = self.url(&format!("rest/v1/{table}"), &[("id", filter.as_str())])?;
        let request = self
            .request(Method::DELETE, url, token)?
            .header("prefer", "return=representation");
        let rows: Vec<Value> = Self::decode(self.send(request).await?).await?;
        Ok(!rows.is_empty())
    }

    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        let url = self.url("auth/v1/token", &[("grant_type", "password")])?;
        let request = self
            .request(Method::POST, url, None)?
            .json(&serde_json::json!({ "email": email, "password": password }));
        Self::decode(self.send(request).await?).await
    }

    pub async fn get_user(&self, token: &str) -> Result<AuthUser, BackendError> {
        let url = self.url::<&str, &str>("auth/v1/user", &[])?;
        let response = self
            .send(self.request(Method::GET, url, Some(token))?)
            .await?;
        Self::decode(response).await
    }

    pub async fn update_user(&self, token: &str, update: &UserUpdate) -> Result<AuthUser, BackendError> {
        let url = self.url::<&str, &str>("auth/v1/user", &[])?;
        let request = self.request(Method::PUT, url, Some(token))?.json(update);
        Self::decode(self.send(request).await?).await
    }

    pub async fn sign_out(&self, token: &str) -> Result<(), BackendError> {
        let url = self.url::<&str, &str>("auth/v1/logout", &[])?;
        self.send(self.request(Method::POST, url, Some(token))?)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn recover_password(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), BackendError> {
        let params: Vec<(&str, &str)> = redirect_to
            .map(|target| vec![("redirect_to", target)])
            .unwrap_or_default();
        let url = self.url("auth/v1/recover", &params)?;
        let request = self
            .request(Method::POST, url, None)?
            .json(&serde_json::json!({ "email": email }));
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_query_params() {
        let query = TableQuery::new("serving_teams")
            .select("team_key,name")
            .eq("is_active", true)
            .order("group_sort", true)
            .order("name", true)
            .limit(5);
        assert_eq!(
            query.params(),
            vec![
                ("select".to_string(), "team_key,name".to_string()),
                ("is_active".to_string(), "eq.true".to_string()),
                ("order".to_string(), "group_sort.asc,name.asc".to_string()),
                ("limit".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn test_error_body_prefers_message_fields() {
        let body: ErrorBody = serde_json::from_value(serde_json::json!({
            "code": "42703",
            "message": "column serving_teams.leader does not exist"
        }))
        .unwrap();
        let err = body.into_error(400, "Bad Request".into());
        assert!(err.is_missing_column("leader"));
        assert_eq!(err.to_string(), "column serving_teams.leader does not exist");

        let body: ErrorBody = serde_json::from_value(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        }))
        .unwrap();
        let err = body.into_error(400, "Bad Request".into());
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert!(!err.is_missing_column("leader"));
    }

    #[test]
    fn test_error_body_numeric_code_and_fallback() {
        let body: ErrorBody =
            serde_json::from_value(serde_json::json!({ "code": 403, "msg": "" })).unwrap();
        match body.into_error(403, "Forbidden".into()) {
            BackendError::Api { code, message, .. } => {
                assert_eq!(code.as_deref(), Some("403"));
                assert_eq!(message, "Forbidden");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_jwt_user() {
        let err = BackendError::Api {
            status: 403,
            code: Some("user_not_found".into()),
            message: "User from sub claim in JWT does not exist".into(),
        };
        assert!(err.is_missing_jwt_user());
        assert!(!BackendError::NotConfigured.is_missing_jwt_user());
    }

    #[test]
    fn test_invalid_input_is_keyed_on_postgres_code() {
        let api = |status: u16, code: &str| BackendError::Api {
            status,
            code: Some(code.to_string()),
            message: String::new(),
        };
        assert!(api(400, "22P02").is_invalid_input());
        assert!(api(409, "23505").is_invalid_input());
        assert!(!api(403, "42501").is_invalid_input());
        assert!(!api(404, "PGRST205").is_invalid_input());
        assert!(!api(400, "403").is_invalid_input());
    }

    #[test]
    fn test_decode_error_names_the_field() {
        let err: BackendError = serde_json::from_str::<Vec<crate::models::Event>>(
            r#"[{"id":"e1","title":"Picnic","category":"Sports","start":"2025-06-01T10:00:00Z","end":"2025-06-01T12:00:00Z"}]"#,
        )
        .unwrap_err()
        .into();
        assert!(matches!(err, BackendError::Decode(_)));
        assert!(err.to_string().starts_with("Unexpected Supabase response: unknown variant `Sports`"));
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let client = SupabaseClient::new(None, Some("anon".into()));
        assert!(!client.is_configured());
        let err = client
            .select::<Value>(&TableQuery::new("events"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotConfigured));
    }
}
