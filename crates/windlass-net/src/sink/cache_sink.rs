use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error};
use windlass_task::State;
use windlass_verify::{Hasher, Md5Hasher};

use crate::cache::{CacheEntry, MetaCache};
use crate::sink::file::FileSink;
use crate::sink::Sink;
use crate::transport::{HttpRequest, ReplyInfo};

/// Sink writing into a cache-managed artifact plus its metadata record.
///
/// A fresh entry short-circuits `init` to `Succeeded` so the task never
/// touches the network. On a live fetch the body streams through an inner
/// [`FileSink`] while an md5 digest accumulates; `finalize` captures the
/// response's revalidation headers, computes the expiry, and commits the
/// entry to the [`MetaCache`].
pub struct CacheSink {
    cache: Arc<MetaCache>,
    entry: CacheEntry,
    file: FileSink,
    hasher: Option<Md5Hasher>,
    eternal: bool,
}

impl CacheSink {
    pub fn new(cache: Arc<MetaCache>, entry: CacheEntry, eternal: bool) -> Self {
        let file = FileSink::new(entry.local_path().to_path_buf());
        Self {
            cache,
            entry,
            file,
            hasher: None,
            eternal,
        }
    }

    pub fn entry(&self) -> &CacheEntry {
        &self.entry
    }
}

#[async_trait]
impl Sink for CacheSink {
    async fn init(&mut self, request: &HttpRequest) -> State {
        if !self.entry.is_stale() {
            debug!(
                "cache entry {}/{} is fresh, skipping transfer",
                self.entry.base, self.entry.path
            );
            return State::Succeeded;
        }
        self.hasher = Some(Md5Hasher::new());
        self.file.init(request).await
    }

    async fn write(&mut self, chunk: &[u8]) -> State {
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(chunk);
        }
        self.file.write(chunk).await
    }

    async fn finalize(&mut self, reply: &ReplyInfo) -> State {
        let state = self.file.finalize(reply).await;
        if state != State::Succeeded {
            return state;
        }

        if let Some(hasher) = self.hasher.take() {
            self.entry.md5sum = hex::encode(hasher.finalize());
        }
        if let Some(etag) = reply.header("etag") {
            self.entry.etag = etag.to_string();
        }
        if let Some(last_modified) = reply.header("last-modified") {
            self.entry.last_modified = last_modified.to_string();
        }
        self.entry.eternal = self.eternal;
        self.entry.expires = if self.eternal {
            None
        } else {
            expires_from_headers(reply, Utc::now().timestamp_millis())
        };

        if let Err(e) = self.cache.commit(self.entry.clone()) {
            error!(
                "failed to record cache entry {}/{}: {}",
                self.entry.base, self.entry.path, e
            );
            return State::Failed;
        }
        State::Succeeded
    }

    async fn abort(&mut self) {
        self.hasher = None;
        self.file.abort().await;
    }

    fn has_local_data(&self) -> bool {
        self.entry.local_path().is_file()
    }
}

/// Expiry timestamp from response headers: `Cache-Control: max-age` wins
/// over `Expires`; absent both, the entry carries no expiry.
fn expires_from_headers(reply: &ReplyInfo, now_ms: i64) -> Option<i64> {
    if let Some(cache_control) = reply.header("cache-control") {
        for directive in cache_control.split(',') {
            if let Some(seconds) = directive.trim().strip_prefix("max-age=") {
                if let Ok(seconds) = seconds.trim().parse::<i64>() {
                    return Some(now_ms + seconds * 1_000);
                }
            }
        }
    }
    if let Some(expires) = reply.header("expires") {
        if let Ok(when) = DateTime::parse_from_rfc2822(expires) {
            return Some(when.timestamp_millis());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(headers: &[(&str, &str)]) -> ReplyInfo {
        ReplyInfo {
            status: 200,
            headers: headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_expires_from_max_age() {
        let reply = reply(&[("Cache-Control", "public, max-age=3600")]);
        assert_eq!(expires_from_headers(&reply, 1_000), Some(1_000 + 3_600_000));
    }

    #[test]
    fn test_expires_header_fallback() {
        let reply = reply(&[("Expires", "Wed, 21 Oct 2015 07:28:00 GMT")]);
        let expected = DateTime::parse_from_rfc2822("Wed, 21 Oct 2015 07:28:00 GMT")
            .unwrap()
            .timestamp_millis();
        assert_eq!(expires_from_headers(&reply, 0), Some(expected));
    }

    #[test]
    fn test_no_expiry_headers() {
        let reply = reply(&[("Content-Type", "application/json")]);
        assert_eq!(expires_from_headers(&reply, 0), None);
    }
}
