//! Time-boxed cache in front of the video feed.
//!
//! The "latest" feed is a single entry kept in memory and, when a cache file
//! is configured, mirrored to disk so a restart does not cost another round
//! of API quota. Search results are memory-only and keyed by query
//! parameters, bounded in count and pruned of stale entries on every store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{Video, VideoPage};

const MAX_SEARCH_ENTRIES: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub timestamp: DateTime<Utc>,
    pub data: Vec<Video>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl CacheEntry {
    fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    pub fn into_page(self) -> VideoPage {
        VideoPage {
            videos: self.data,
            next_page_token: self.next_page_token,
        }
    }
}

pub struct FeedCache {
    ttl: Duration,
    persist_path: Option<PathBuf>,
    latest: Mutex<Option<CacheEntry>>,
    search: Mutex<HashMap<String, CacheEntry>>,
}

impl FeedCache {
    pub fn new(ttl: Duration, persist_path: Option<PathBuf>) -> Self {
        Self {
            ttl,
            persist_path,
            latest: Mutex::new(None),
            search: Mutex::new(HashMap::new()),
        }
    }

    pub fn search_key(query: &str, page_token: Option<&str>, max_results: u32) -> String {
        format!(
            "search:{}:{}:{}",
            query.trim(),
            page_token.unwrap_or("first"),
            max_results
        )
    }

    pub async fn latest(&self, now: DateTime<Utc>) -> Option<CacheEntry> {
        {
            let guard = self.latest.lock().ok()?;
            if let Some(entry) = guard.as_ref()
                && entry.age(now) < self.ttl
            {
                return Some(entry.clone());
            }
        }

        let path = self.persist_path.as_ref()?;
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(err) => {
                debug!(error = %err, path = %path.display(), "no persisted feed cache");
                return None;
            }
        };
        let entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, path = %path.display(), "ignoring unreadable feed cache");
                return None;
            }
        };
        if entry.age(now) > self.ttl {
            return None;
        }

        if let Ok(mut guard) = self.latest.lock() {
            *guard = Some(entry.clone());
        }
        Some(entry)
    }

    pub async fn store_latest(
        &self,
        videos: Vec<Video>,
        next_page_token: Option<String>,
        now: DateTime<Utc>,
    ) {
        let entry = CacheEntry {
            timestamp: now,
            data: videos,
            next_page_token,
        };
        if let Ok(mut guard) = self.latest.lock() {
            *guard = Some(entry.clone());
        }

        let Some(path) = self.persist_path.as_ref() else {
            return;
        };
        let payload = match serde_json::to_vec(&entry) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize feed cache");
                return;
            }
        };
        if let Err(err) = write_replacing(path, &payload).await {
            warn!(error = %err, path = %path.display(), "failed to persist feed cache");
        }
    }

    pub fn search(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let mut guard = self.search.lock().ok()?;
        let expired = guard.get(key)?.age(now) > self.ttl;
        if expired {
            guard.remove(key);
            return None;
        }
        guard.get(key).cloned()
    }

    pub fn store_search(
        &self,
        key: String,
        videos: Vec<Video>,
        next_page_token: Option<String>,
        now: DateTime<Utc>,
    ) {
        if let Ok(mut guard) = self.search.lock() {
            guard.retain(|_, entry| entry.age(now) <= self.ttl);
            if guard.len() >= MAX_SEARCH_ENTRIES
                && !guard.contains_key(&key)
                && let Some(oldest) = guard
                    .iter()
                    .min_by_key(|(_, entry)| entry.timestamp)
                    .map(|(oldest, _)| oldest.clone())
            {
                guard.remove(&oldest);
            }
            guard.insert(
                key,
                CacheEntry {
                    timestamp: now,
                    data: videos,
                    next_page_token,
                },
            );
        }
    }
}

/// Writes to a sibling file and renames it over `path`, so readers never see
/// a partially written cache.
async fn write_replacing(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(format!(".{:08x}.tmp", rand::random::<u32>()));
    let staging = PathBuf::from(staging);

    tokio::fs::write(&staging, payload).await?;
    if let Err(err) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(err);
    }
    Ok(())
}
