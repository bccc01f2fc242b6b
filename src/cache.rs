//! Time-stamped JSON cache for Q-Net data.
//!
//! Layout: `{dir}/{key}.json` holding `{ "data": ..., "timestamp": <unix ms> }`.
//! Keys are `qnet-qualifications` and `qnet-schedule-{subjectCode}-{year}`.
//! An entry is trusted for 7 days from its timestamp; after that the next read
//! refetches and overwrites it. Entries are only written after their own fetch
//! completes, so there is no write contention to manage.

use std::{future::Future, path::PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::AppResult;

pub const CACHE_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

pub const QUALIFICATIONS_KEY: &str = "qnet-qualifications";

pub fn schedule_key(subject_code: &str, year: &str) -> String {
  format!("qnet-schedule-{subject_code}-{year}")
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry<T> {
  pub data: T,
  pub timestamp: i64,
}

impl<T> CacheEntry<T> {
  pub fn is_valid_at(&self, now_ms: i64, ttl_ms: i64) -> bool {
    now_ms.saturating_sub(self.timestamp) < ttl_ms
  }
}

#[derive(Clone, Debug)]
pub struct ExamCache {
  dir: PathBuf,
  ttl_ms: i64,
}

pub fn now_ms() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

impl ExamCache {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into(), ttl_ms: CACHE_TTL_MS }
  }

  fn path_for(&self, key: &str) -> PathBuf {
    let safe: String = key
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
      .collect();
    self.dir.join(format!("{safe}.json"))
  }

  /// Valid cached data for `key`, if any. Unreadable entries count as misses.
  pub async fn get<T: DeserializeOwned>(&self, key: &str, now_ms: i64) -> Option<T> {
    let raw = tokio::fs::read(self.path_for(key)).await.ok()?;
    let entry: CacheEntry<T> = match serde_json::from_slice(&raw) {
      Ok(e) => e,
      Err(e) => {
        warn!(target: "qpass_backend", %key, error = %e, "Discarding unreadable cache entry");
        return None;
      }
    };
    if entry.is_valid_at(now_ms, self.ttl_ms) {
      Some(entry.data)
    } else {
      debug!(target: "qpass_backend", %key, age_ms = now_ms.saturating_sub(entry.timestamp), "Cache entry expired");
      None
    }
  }

  pub async fn put<T: Serialize>(&self, key: &str, data: &T, now_ms: i64) -> AppResult<()> {
    tokio::fs::create_dir_all(&self.dir).await?;
    let body = serde_json::to_vec(&CacheEntry { data, timestamp: now_ms })?;
    tokio::fs::write(self.path_for(key), body).await?;
    Ok(())
  }

  pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, fetch: F) -> AppResult<T>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<T>>,
  {
    self.get_or_fetch_at(key, now_ms(), fetch).await
  }

  /// Serve from cache when valid at `now_ms`, otherwise fetch and write back.
  /// A failed write is logged; the fresh data is still returned.
  pub async fn get_or_fetch_at<T, F, Fut>(&self, key: &str, now_ms: i64, fetch: F) -> AppResult<T>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<T>>,
  {
    if let Some(hit) = self.get::<T>(key, now_ms).await {
      debug!(target: "qpass_backend", %key, "Cache hit");
      return Ok(hit);
    }
    let fresh = fetch().await?;
    match self.put(key, &fresh, now_ms).await {
      Ok(()) => info!(target: "qpass_backend", %key, "Cache refreshed"),
      Err(e) => warn!(target: "qpass_backend", %key, error = %e, "Cache write failed"),
    }
    Ok(fresh)
  }
}
