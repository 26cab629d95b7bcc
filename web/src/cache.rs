//! Edge cache for the delivery front end.
//!
//! Cache hits skip the asset store round-trip entirely; that is the whole
//! point of the front end's indirection. Entries expire after the
//! configured TTL and are re-fetched on the next read. Writes do not
//! invalidate: a freshly uploaded version becomes visible once the cached
//! entry lapses, matching edge-cache semantics.

use bindery_core::environment::Clock;
use bindery_media::store::AssetVersion;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A cached asset response.
#[derive(Debug, Clone)]
pub struct CachedAsset {
    /// The object bytes.
    pub bytes: Vec<u8>,
    /// MIME type recorded at write time.
    pub content_type: String,
    /// The version id, served as the `ETag`.
    pub etag: String,
    cached_at: DateTime<Utc>,
}

/// In-process TTL cache keyed by asset key.
pub struct AssetCache {
    ttl: ChronoDuration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, CachedAsset>>,
}

impl AssetCache {
    /// Create a cache with the given entry TTL.
    #[must_use]
    pub fn new(ttl: std::time::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::MAX),
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a fresh entry. Stale entries are treated as misses.
    pub async fn get(&self, key: &str) -> Option<CachedAsset> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;

        let now = self.clock.now();
        let fresh = entry
            .cached_at
            .checked_add_signed(self.ttl)
            .is_some_and(|expires| now < expires);

        if fresh {
            metrics::counter!("web.asset_cache.hit").increment(1);
            Some(entry.clone())
        } else {
            metrics::counter!("web.asset_cache.miss").increment(1);
            None
        }
    }

    /// Cache a version fetched from the store.
    pub async fn insert(&self, key: &str, version: &AssetVersion) {
        let entry = CachedAsset {
            bytes: version.bytes.clone(),
            content_type: version.content_type.clone(),
            etag: version.version_id.to_string(),
            cached_at: self.clock.now(),
        };
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry);
    }

    /// The entry TTL in whole seconds, for `Cache-Control` headers.
    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Number of live entries, fresh or stale.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl std::fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use bindery_core::identity::Principal;
    use bindery_media::store::VersionId;
    use bindery_testing::ManualClock;
    use std::time::Duration;

    fn version(bytes: &[u8]) -> AssetVersion {
        AssetVersion {
            version_id: VersionId::new(),
            bytes: bytes.to_vec(),
            content_type: "image/jpeg".to_string(),
            written_at: Utc::now(),
            written_by: Principal::new("backend"),
        }
    }

    #[tokio::test]
    async fn fresh_entries_hit() {
        let clock = Arc::new(ManualClock::default());
        let cache = AssetCache::new(Duration::from_secs(300), Arc::clone(&clock) as _);

        cache.insert("covers/1.jpg", &version(b"art")).await;
        let hit = cache.get("covers/1.jpg").await.unwrap();
        assert_eq!(hit.bytes, b"art");
    }

    #[tokio::test]
    async fn stale_entries_miss() {
        let clock = Arc::new(ManualClock::default());
        let cache = AssetCache::new(Duration::from_secs(300), Arc::clone(&clock) as _);

        cache.insert("covers/1.jpg", &version(b"art")).await;
        clock.advance(Duration::from_secs(301));
        assert!(cache.get("covers/1.jpg").await.is_none());
    }

    #[tokio::test]
    async fn unknown_keys_miss() {
        let cache = AssetCache::new(
            Duration::from_secs(300),
            Arc::new(ManualClock::default()) as _,
        );
        assert!(cache.get("covers/unknown.jpg").await.is_none());
    }
}
