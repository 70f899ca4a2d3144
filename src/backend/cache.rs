//! Idempotency cache of replies keyed by request id.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::transport::WorkReply;

#[derive(Debug, Clone)]
struct CachedReply {
    reply: WorkReply,
    expires: Instant,
}

/// Thread-safe reply cache with a fixed time-to-live.
#[derive(Debug, Clone)]
pub struct ReplyCache {
    inner: Arc<DashMap<String, CachedReply>>,
    ttl: Duration,
}

impl ReplyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Cached reply for `id`, if it has not expired.
    pub fn get(&self, id: &str) -> Option<WorkReply> {
        self.inner
            .get(id)
            .filter(|entry| entry.expires > Instant::now())
            .map(|entry| entry.reply.clone())
    }

    pub fn insert(&self, id: &str, reply: WorkReply) {
        if id.is_empty() {
            return;
        }
        self.inner.insert(
            id.to_string(),
            CachedReply {
                reply,
                expires: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.inner.len();
        let now = Instant::now();
        self.inner.retain(|_, entry| entry.expires > now);
        before.saturating_sub(self.inner.len())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Purge expired entries every `interval` in the background.
    pub fn spawn_purger(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = cache.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = cache.len(), "Purged expired replies");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = ReplyCache::new(Duration::from_secs(30));
        cache.insert("a", WorkReply::success());
        assert_eq!(cache.get("a"), Some(WorkReply::success()));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_empty_id_is_not_cached() {
        let cache = ReplyCache::new(Duration::from_secs(30));
        cache.insert("", WorkReply::success());
        assert!(cache.is_empty());
    }
}
