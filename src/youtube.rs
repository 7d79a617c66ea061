//! YouTube Data API v3 client for the channel's video feed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::cache::FeedCache;
use crate::models::{Video, VideoPage};

pub const DEFAULT_PAGE_SIZE: u32 = 21;

#[derive(Debug, Error)]
pub enum YoutubeError {
    #[error("MISSING_YOUTUBE_CONFIG")]
    MissingConfig,
    #[error("YouTube channel uploads playlist not found.")]
    UploadsPlaylistNotFound,
    #[error("YouTube API error {status}{}: {message}", reason_suffix(.reason))]
    Api {
        status: u16,
        reason: Option<String>,
        message: String,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid YouTube API URL: {0}")]
    Url(#[from] url::ParseError),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .filter(|r| !r.is_empty())
        .map(|r| format!(" ({r})"))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default)]
pub struct FeedRequest {
    pub page_token: Option<String>,
    pub max_results: u32,
    pub use_cache: bool,
}

impl FeedRequest {
    pub fn first_page() -> Self {
        Self {
            page_token: None,
            max_results: DEFAULT_PAGE_SIZE,
            use_cache: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Default, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaylistItem {
    snippet: Option<Snippet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchItem {
    id: Option<SearchItemId>,
    snippet: Option<Snippet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    published_at: Option<String>,
    resource_id: Option<ResourceId>,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: Option<String>,
    content_details: Option<VideoContentDetails>,
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
}

#[derive(Debug, Default, Clone)]
struct VideoDetails {
    duration: Option<String>,
    view_count: Option<String>,
}

impl Snippet {
    fn thumbnail_url(&self) -> String {
        let Some(thumbnails) = self.thumbnails.as_ref() else {
            return String::new();
        };
        [&thumbnails.high, &thumbnails.medium, &thumbnails.default]
            .into_iter()
            .flatten()
            .filter_map(|t| t.url.clone())
            .find(|url| !url.is_empty())
            .unwrap_or_default()
    }

    fn into_video(self, id: String, fallback_title: &str) -> Video {
        let thumbnail_url = self.thumbnail_url();
        Video {
            embed_url: Video::embed_url_for(&id),
            video_url: Video::watch_url_for(&id),
            id,
            title: self
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| fallback_title.to_string()),
            description: self.description.unwrap_or_default(),
            published_at: self.published_at.unwrap_or_default(),
            thumbnail_url,
            duration: None,
            view_count: None,
        }
    }
}

#[derive(Clone)]
pub struct YoutubeClient {
    client: reqwest::Client,
    base_url: Arc<Url>,
    api_key: Option<String>,
    channel_id: Option<String>,
    cache: Arc<FeedCache>,
}

impl YoutubeClient {
    pub fn new(
        base_url: Url,
        api_key: Option<String>,
        channel_id: Option<String>,
        cache: Arc<FeedCache>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::new(base_url),
            api_key: api_key.filter(|k| !k.is_empty()),
            channel_id: channel_id.filter(|c| !c.is_empty()),
            cache,
        }
    }

    fn credentials(&self) -> Result<(&str, &str), YoutubeError> {
        match (self.api_key.as_deref(), self.channel_id.as_deref()) {
            (Some(key), Some(channel)) => Ok((key, channel)),
            _ => Err(YoutubeError::MissingConfig),
        }
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, YoutubeError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse_with_params(&format!("{base}/{path}"), params)?)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, YoutubeError> {
        let url = self.endpoint(path, params)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let fallback = status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string();
            let envelope: ErrorEnvelope = response.json().await.unwrap_or_default();
            let body = envelope.error.unwrap_or_default();
            let first = body.errors.into_iter().next().unwrap_or_default();
            let message = first
                .message
                .or(body.message)
                .filter(|m| !m.is_empty())
                .unwrap_or(fallback);
            return Err(YoutubeError::Api {
                status: status.as_u16(),
                reason: first.reason,
                message,
            });
        }
        Ok(response.json().await?)
    }

    #[instrument(skip(self))]
    pub async fn active_live_video(&self) -> Result<Option<Video>, YoutubeError> {
        let (key, channel) = self.credentials()?;
        let response: SearchResponse = self
            .fetch_json(
                "search",
                &[
                    ("part", "snippet"),
                    ("channelId", channel),
                    ("eventType", "live"),
                    ("type", "video"),
                    ("maxResults", "1"),
                    ("order", "date"),
                    ("key", key),
                ],
            )
            .await?;

        let live = response.items.into_iter().find_map(|item| {
            let id = item.id?.video_id.filter(|id| !id.is_empty())?;
            Some(item.snippet.unwrap_or_default().into_video(id, "Live stream"))
        });
        Ok(live)
    }

    async fn uploads_playlist_id(&self, key: &str, channel: &str) -> Result<String, YoutubeError> {
        let response: ChannelListResponse = self
            .fetch_json(
                "channels",
                &[("part", "contentDetails"), ("id", channel), ("key", key)],
            )
            .await?;
        response
            .items
            .into_iter()
            .next()
            .and_then(|item| item.content_details)
            .and_then(|details| details.related_playlists)
            .and_then(|playlists| playlists.uploads)
            .filter(|id| !id.is_empty())
            .ok_or(YoutubeError::UploadsPlaylistNotFound)
    }

    async fn playlist_items(
        &self,
        key: &str,
        playlist_id: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<(Vec<Video>, Option<String>), YoutubeError> {
        let max = max_results.to_string();
        let mut params = vec![
            ("part", "snippet,contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", max.as_str()),
            ("key", key),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let response: PlaylistItemsResponse = self.fetch_json("playlistItems", &params).await?;

        let videos = response
            .items
            .into_iter()
            .filter_map(|item| {
                let snippet = item.snippet?;
                let id = snippet
                    .resource_id
                    .as_ref()?
                    .video_id
                    .clone()
                    .filter(|id| !id.is_empty())?;
                Some(snippet.into_video(id, "Untitled video"))
            })
            .collect();
        Ok((videos, response.next_page_token))
    }

    async fn video_details(
        &self,
        key: &str,
        ids: &[&str],
    ) -> Result<HashMap<String, VideoDetails>, YoutubeError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let joined = ids.join(",");
        let response: VideoListResponse = self
            .fetch_json(
                "videos",
                &[
                    ("part", "contentDetails,statistics"),
                    ("id", joined.as_str()),
                    ("key", key),
                ],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id?;
                let details = VideoDetails {
                    duration: item.content_details.and_then(|d| d.duration),
                    view_count: item.statistics.and_then(|s| s.view_count),
                };
                Some((id, details))
            })
            .collect())
    }

    async fn enrich(&self, key: &str, mut videos: Vec<Video>) -> Result<Vec<Video>, YoutubeError> {
        let details = {
            let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
            self.video_details(key, &ids).await?
        };
        for video in &mut videos {
            if let Some(found) = details.get(&video.id) {
                video.duration = found.duration.clone();
                video.view_count = found.view_count.clone();
            }
        }
        Ok(videos)
    }

    /// Newest uploads of the channel, newest first.
    #[instrument(skip(self))]
    pub async fn latest_videos(&self, request: FeedRequest) -> Result<VideoPage, YoutubeError> {
        let cacheable = request.page_token.is_none() && request.use_cache;
        if cacheable && let Some(entry) = self.cache.latest(Utc::now()).await {
            debug!("serving latest videos from cache");
            return Ok(entry.into_page());
        }

        let (key, channel) = self.credentials()?;
        let playlist_id = self.uploads_playlist_id(key, channel).await?;
        let (videos, next_page_token) = self
            .playlist_items(
                key,
                &playlist_id,
                request.page_token.as_deref(),
                request.max_results,
            )
            .await?;
        let videos = self.enrich(key, videos).await?;

        if cacheable {
            self.cache
                .store_latest(videos.clone(), next_page_token.clone(), Utc::now())
                .await;
        }
        Ok(VideoPage {
            videos,
            next_page_token,
        })
    }

    #[instrument(skip(self))]
    pub async fn search_videos(
        &self,
        query: &str,
        request: FeedRequest,
    ) -> Result<VideoPage, YoutubeError> {
        let query = query.trim();
        let cache_key =
            FeedCache::search_key(query, request.page_token.as_deref(), request.max_results);
        if request.use_cache
            && let Some(entry) = self.cache.search(&cache_key, Utc::now())
        {
            debug!(cache_key = %cache_key, "serving search results from cache");
            return Ok(entry.into_page());
        }

        let (key, channel) = self.credentials()?;
        let max = request.max_results.to_string();
        let mut params = vec![
            ("part", "snippet"),
            ("channelId", channel),
            ("q", query),
            ("type", "video"),
            ("maxResults", max.as_str()),
            ("order", "relevance"),
            ("key", key),
        ];
        if let Some(token) = request.page_token.as_deref() {
            params.push(("pageToken", token));
        }
        let response: SearchResponse = self.fetch_json("search", &params).await?;

        let videos: Vec<Video> = response
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id?.video_id.filter(|id| !id.is_empty())?;
                Some(item.snippet.unwrap_or_default().into_video(id, "Untitled video"))
            })
            .collect();
        let videos = self.enrich(key, videos).await?;

        if request.use_cache {
            self.cache.store_search(
                cache_key,
                videos.clone(),
                response.next_page_token.clone(),
                Utc::now(),
            );
        }
        Ok(VideoPage {
            videos,
            next_page_token: response.next_page_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_message() {
        let err = YoutubeError::Api {
            status: 403,
            reason: Some("quotaExceeded".into()),
            message: "The request cannot be completed".into(),
        };
        assert_eq!(
            err.to_string(),
            "YouTube API error 403 (quotaExceeded): The request cannot be completed"
        );

        let err = YoutubeError::Api {
            status: 500,
            reason: None,
            message: "Internal Server Error".into(),
        };
        assert_eq!(err.to_string(), "YouTube API error 500: Internal Server Error");
    }

    #[test]
    fn test_snippet_prefers_high_thumbnail_and_defaults() {
        let snippet: Snippet = serde_json::from_value(serde_json::json!({
            "description": "Sunday service",
            "thumbnails": {
                "default": { "url": "https://img/default.jpg" },
                "high": { "url": "https://img/high.jpg" }
            }
        }))
        .unwrap();
        let video = snippet.into_video("abc".into(), "Untitled video");
        assert_eq!(video.title, "Untitled video");
        assert_eq!(video.thumbnail_url, "https://img/high.jpg");
        assert_eq!(video.embed_url, "https://www.youtube.com/embed/abc");
        assert_eq!(video.video_url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(video.published_at, "");
    }

    #[test]
    fn test_snippet_without_thumbnails() {
        let video = Snippet::default().into_video("xyz".into(), "Live stream");
        assert_eq!(video.title, "Live stream");
        assert_eq!(video.thumbnail_url, "");
    }

    #[tokio::test]
    async fn test_missing_config() {
        let cache = Arc::new(FeedCache::new(chrono::Duration::minutes(10), None));
        let client = YoutubeClient::new(
            Url::parse("https://example.com/youtube/v3").unwrap(),
            None,
            Some("UC123".into()),
            cache,
        );
        let err = client
            .latest_videos(FeedRequest::first_page())
            .await
            .unwrap_err();
        assert!(matches!(err, YoutubeError::MissingConfig));
    }
}
