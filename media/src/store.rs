//! Private, versioned object storage for cover images.
//!
//! The store is never directly reachable by clients. Writes require a
//! valid, unexpired [`UploadGrant`] covering the key; reads are only served
//! to the delivery front end's fixed [`TrustIdentity`]. Both checks run on
//! every call and every denial is logged with identity and resource.
//!
//! Versioning is always on: an overwrite appends a new version and the
//! prior versions are retained, so a concurrent-writer race can reorder the
//! "current" pointer but never destroy data.

use crate::error::MediaError;
use crate::grant::{UploadGrant, UploadVerb};
use bindery_core::environment::Clock;
use bindery_core::identity::{Principal, TrustIdentity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Storage-assigned identifier for one version of an object.
///
/// Returned from every successful write and surfaced to HTTP clients as an
/// `ETag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VersionId(Uuid);

impl VersionId {
    /// Mint a fresh version id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One stored version of an asset.
#[derive(Debug, Clone)]
pub struct AssetVersion {
    /// Storage-assigned version identifier.
    pub version_id: VersionId,
    /// The object bytes.
    pub bytes: Vec<u8>,
    /// MIME type recorded at write time.
    pub content_type: String,
    /// When this version was written.
    pub written_at: DateTime<Utc>,
    /// The principal whose grant authorized the write.
    pub written_by: Principal,
}

#[derive(Debug, Default)]
struct StoredObject {
    versions: Vec<AssetVersion>,
}

/// Private object storage with per-write grant checks.
pub struct AssetStore {
    reader: TrustIdentity,
    encrypted_at_rest: bool,
    clock: Arc<dyn Clock>,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl AssetStore {
    /// Create a store that serves reads only to `reader`.
    ///
    /// Encryption at rest is on by default.
    #[must_use]
    pub fn new(reader: TrustIdentity, clock: Arc<dyn Clock>) -> Self {
        Self {
            reader,
            encrypted_at_rest: true,
            clock,
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Whether objects are encrypted at rest.
    #[must_use]
    pub const fn encrypted_at_rest(&self) -> bool {
        self.encrypted_at_rest
    }

    /// The one identity permitted to read.
    #[must_use]
    pub const fn reader(&self) -> &TrustIdentity {
        &self.reader
    }

    /// Write an object version under an upload grant.
    ///
    /// Concurrent writes to the same key race at this layer: the last
    /// successful write becomes "current", and every prior version is
    /// retained. That race is surfaced as success to both writers.
    ///
    /// # Errors
    ///
    /// - [`MediaError::GrantExpired`] if the grant's window has lapsed.
    /// - [`MediaError::Forbidden`] if the grant does not carry
    ///   [`UploadVerb::Put`] or its scope does not cover `key`.
    pub async fn put(
        &self,
        grant: &UploadGrant,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<VersionId, MediaError> {
        let now = self.clock.now();

        if grant.is_expired(now) {
            tracing::warn!(
                principal = %grant.principal,
                key,
                expired_at = %grant.expires_at,
                "write denied: grant expired"
            );
            metrics::counter!("media.store.put_denied").increment(1);
            return Err(MediaError::GrantExpired {
                expired_at: grant.expires_at,
            });
        }

        if !grant.permits(UploadVerb::Put) || !grant.covers(key) {
            tracing::warn!(
                principal = %grant.principal,
                key,
                prefix = %grant.key_prefix,
                "write denied: grant scope does not cover key"
            );
            metrics::counter!("media.store.put_denied").increment(1);
            return Err(MediaError::Forbidden {
                identity: grant.principal.to_string(),
                key: key.to_string(),
            });
        }

        let version = AssetVersion {
            version_id: VersionId::new(),
            bytes,
            content_type: content_type.to_string(),
            written_at: now,
            written_by: grant.principal.clone(),
        };
        let version_id = version.version_id;

        let mut objects = self.objects.write().await;
        objects.entry(key.to_string()).or_default().versions.push(version);
        drop(objects);

        tracing::info!(
            key,
            version_id = %version_id,
            principal = %grant.principal,
            "asset version written"
        );
        metrics::counter!("media.store.put").increment(1);

        Ok(version_id)
    }

    /// Read the current version of an object.
    ///
    /// # Errors
    ///
    /// - [`MediaError::Forbidden`] for any identity other than the
    ///   configured reader; this is what keeps the store fully private.
    /// - [`MediaError::NotFound`] if no object exists at `key`.
    pub async fn get(
        &self,
        identity: &TrustIdentity,
        key: &str,
    ) -> Result<AssetVersion, MediaError> {
        if *identity != self.reader {
            tracing::warn!(
                identity = %identity,
                key,
                "read denied: identity is not the delivery front end"
            );
            metrics::counter!("media.store.get_denied").increment(1);
            return Err(MediaError::Forbidden {
                identity: identity.to_string(),
                key: key.to_string(),
            });
        }

        let objects = self.objects.read().await;
        let current = objects
            .get(key)
            .and_then(|object| object.versions.last())
            .cloned()
            .ok_or_else(|| MediaError::NotFound(key.to_string()))?;
        drop(objects);

        metrics::counter!("media.store.get").increment(1);
        Ok(current)
    }

    /// Number of retained versions at `key`. Zero if the key is absent.
    pub async fn version_count(&self, key: &str) -> usize {
        let objects = self.objects.read().await;
        objects.get(key).map_or(0, |object| object.versions.len())
    }
}

impl fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetStore")
            .field("reader", &self.reader)
            .field("encrypted_at_rest", &self.encrypted_at_rest)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::grant::GrantToken;
    use bindery_core::environment::SystemClock;
    use chrono::Duration as ChronoDuration;

    fn reader() -> TrustIdentity {
        TrustIdentity::new("cover-delivery")
    }

    fn store() -> AssetStore {
        AssetStore::new(reader(), Arc::new(SystemClock))
    }

    fn put_grant(prefix: &str) -> UploadGrant {
        let issued_at = Utc::now();
        UploadGrant {
            token: GrantToken::new(),
            principal: Principal::new("backend"),
            key_prefix: prefix.to_string(),
            verbs: vec![UploadVerb::Put, UploadVerb::AbortMultipart],
            issued_at,
            expires_at: issued_at + ChronoDuration::seconds(300),
        }
    }

    #[tokio::test]
    async fn valid_grant_writes_and_reader_reads_back() {
        let store = store();
        let grant = put_grant("covers/");

        let version = store
            .put(&grant, "covers/123.jpg", b"jpegbytes".to_vec(), "image/jpeg")
            .await
            .unwrap();

        let asset = store.get(&reader(), "covers/123.jpg").await.unwrap();
        assert_eq!(asset.version_id, version);
        assert_eq!(asset.bytes, b"jpegbytes");
        assert_eq!(asset.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn wrong_prefix_grant_is_forbidden() {
        let store = store();
        let grant = put_grant("covers/123.jpg");

        let err = store
            .put(&grant, "covers/999.jpg", b"x".to_vec(), "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Forbidden { .. }));
        assert_eq!(store.version_count("covers/999.jpg").await, 0);
    }

    #[tokio::test]
    async fn expired_grant_is_rejected() {
        let store = store();
        let mut grant = put_grant("covers/");
        grant.expires_at = Utc::now() - ChronoDuration::seconds(1);

        let err = store
            .put(&grant, "covers/123.jpg", b"x".to_vec(), "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::GrantExpired { .. }));
    }

    #[tokio::test]
    async fn get_grant_cannot_write() {
        let store = store();
        let mut grant = put_grant("covers/");
        grant.verbs = vec![UploadVerb::Get];

        let err = store
            .put(&grant, "covers/123.jpg", b"x".to_vec(), "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn foreign_identity_cannot_read() {
        let store = store();
        let grant = put_grant("covers/");
        store
            .put(&grant, "covers/123.jpg", b"x".to_vec(), "image/jpeg")
            .await
            .unwrap();

        let err = store
            .get(&TrustIdentity::new("mobile-app"), "covers/123.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = store();
        let err = store.get(&reader(), "covers/missing.jpg").await.unwrap_err();
        assert!(matches!(err, MediaError::NotFound(_)));
    }

    #[tokio::test]
    async fn overwrite_retains_prior_versions_and_last_write_wins() {
        let store = store();
        let grant = put_grant("covers/");

        store
            .put(&grant, "covers/123.jpg", b"first".to_vec(), "image/jpeg")
            .await
            .unwrap();
        let second = store
            .put(&grant, "covers/123.jpg", b"second".to_vec(), "image/png")
            .await
            .unwrap();

        assert_eq!(store.version_count("covers/123.jpg").await, 2);
        let current = store.get(&reader(), "covers/123.jpg").await.unwrap();
        assert_eq!(current.version_id, second);
        assert_eq!(current.bytes, b"second");
        assert_eq!(current.content_type, "image/png");
    }
}
