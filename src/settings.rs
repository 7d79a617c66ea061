use std::path::PathBuf;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub debug: bool,
    pub enable_swagger: bool,
    pub port: u16,
    pub youtube_api_base_url: Url,
    pub youtube_api_key: Option<String>,
    pub youtube_channel_id: Option<String>,
    pub youtube_cache_ttl_secs: u64,
    pub youtube_cache_file: Option<PathBuf>,
    pub supabase_url: Option<Url>,
    pub supabase_anon_key: Option<String>,
    pub password_reset_redirect: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // APP_YOUTUBE_API_KEY, APP_SUPABASE_URL, ...
            .add_source(Environment::with_prefix("APP").try_parsing(true))
            .set_default("debug", false)?
            .set_default("enable_swagger", true)?
            .set_default("port", 8080)?
            .set_default(
                "youtube_api_base_url",
                "https://www.googleapis.com/youtube/v3",
            )?
            .set_default("youtube_cache_ttl_secs", 600)?
            .build()?;

        config.try_deserialize()
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.youtube_cache_ttl_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn test_from_env_defaults_and_overrides() {
        unsafe {
            std::env::set_var("APP_PORT", "9090");
            std::env::set_var("APP_YOUTUBE_CHANNEL_ID", "UC123");
        }
        let settings = Settings::from_env().unwrap();
        unsafe {
            std::env::remove_var("APP_PORT");
            std::env::remove_var("APP_YOUTUBE_CHANNEL_ID");
        }

        assert_eq!(settings.port, 9090);
        assert_eq!(settings.youtube_channel_id.as_deref(), Some("UC123"));
        assert_eq!(settings.youtube_cache_ttl_secs, 600);
        assert_eq!(
            settings.youtube_api_base_url.as_str(),
            "https://www.googleapis.com/youtube/v3"
        );
        assert_eq!(settings.cache_ttl(), chrono::Duration::minutes(10));
    }
}
