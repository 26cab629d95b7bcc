//! The upload authorizer: packaging pre-provisioned rights into grants.
//!
//! The authorizer never escalates. A principal must already hold an
//! [`Entitlement`] covering the requested key and verbs; the authorizer
//! only derives a short-lived, narrowly-scoped [`UploadGrant`] from those
//! rights, capped at the configured maximum TTL.
//!
//! Issued grants live in memory until they expire; redemption resolves the
//! opaque token back to the grant, and an explicit or opportunistic prune
//! drops lapsed entries so nothing outlives its validity window.

use crate::error::MediaError;
use crate::grant::{GrantToken, UploadGrant, UploadVerb};
use bindery_core::environment::Clock;
use bindery_core::identity::Principal;
use chrono::Duration as ChronoDuration;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// A pre-provisioned right: one principal, one key prefix, a verb set.
///
/// Entitlements are configuration, not runtime state; the set is fixed
/// when the pipeline is assembled.
#[derive(Debug, Clone)]
pub struct Entitlement {
    /// The principal the entitlement belongs to.
    pub principal: Principal,
    /// Keys covered: any key with this prefix.
    pub key_prefix: String,
    /// The verbs the principal may request in a grant.
    pub verbs: Vec<UploadVerb>,
}

impl Entitlement {
    /// Whether this entitlement lets `principal` request `verbs` on `key`.
    #[must_use]
    pub fn permits(&self, principal: &Principal, key: &str, verbs: &[UploadVerb]) -> bool {
        self.principal == *principal
            && key.starts_with(&self.key_prefix)
            && verbs.iter().all(|verb| self.verbs.contains(verb))
    }
}

/// Issues time-boxed upload grants against pre-provisioned entitlements.
pub struct UploadAuthorizer {
    entitlements: Vec<Entitlement>,
    max_ttl: Duration,
    clock: Arc<dyn Clock>,
    issued: Mutex<HashMap<GrantToken, UploadGrant>>,
}

impl UploadAuthorizer {
    /// Create an authorizer with its fixed entitlement set and TTL ceiling.
    #[must_use]
    pub fn new(entitlements: Vec<Entitlement>, max_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entitlements,
            max_ttl,
            clock,
            issued: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a grant scoped to exactly `key` with the requested verbs.
    ///
    /// # Errors
    ///
    /// - [`MediaError::TtlTooLong`] if `ttl` exceeds the configured maximum.
    /// - [`MediaError::Forbidden`] if no entitlement lets the principal
    ///   request those verbs on that key.
    pub async fn authorize(
        &self,
        principal: &Principal,
        key: &str,
        verbs: &[UploadVerb],
        ttl: Duration,
    ) -> Result<UploadGrant, MediaError> {
        if ttl > self.max_ttl {
            tracing::warn!(
                principal = %principal,
                key,
                requested_secs = ttl.as_secs(),
                max_secs = self.max_ttl.as_secs(),
                "grant denied: ttl exceeds maximum"
            );
            metrics::counter!("media.authorizer.denied").increment(1);
            return Err(MediaError::TtlTooLong {
                requested_seconds: ttl.as_secs(),
                max_seconds: self.max_ttl.as_secs(),
            });
        }

        let entitled = self
            .entitlements
            .iter()
            .any(|entitlement| entitlement.permits(principal, key, verbs));
        if !entitled {
            tracing::warn!(
                principal = %principal,
                key,
                "grant denied: no entitlement covers the request"
            );
            metrics::counter!("media.authorizer.denied").increment(1);
            return Err(MediaError::Forbidden {
                identity: principal.to_string(),
                key: key.to_string(),
            });
        }

        let issued_at = self.clock.now();
        let validity = ChronoDuration::from_std(ttl)
            .unwrap_or_else(|_| ChronoDuration::MAX);
        let grant = UploadGrant {
            token: GrantToken::new(),
            principal: principal.clone(),
            key_prefix: key.to_string(),
            verbs: verbs.to_vec(),
            issued_at,
            expires_at: issued_at
                .checked_add_signed(validity)
                .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC),
        };

        let mut issued = self.issued.lock().await;
        Self::prune(&mut issued, issued_at);
        issued.insert(grant.token, grant.clone());
        drop(issued);

        tracing::info!(
            principal = %principal,
            key,
            token = %grant.token,
            expires_at = %grant.expires_at,
            "upload grant issued"
        );
        metrics::counter!("media.authorizer.issued").increment(1);

        Ok(grant)
    }

    /// Resolve a presented token back to its grant.
    ///
    /// # Errors
    ///
    /// - [`MediaError::GrantNotFound`] if no live grant matches the token.
    /// - [`MediaError::GrantExpired`] if the grant's window has lapsed; the
    ///   entry is dropped on the spot.
    pub async fn redeem(&self, token: GrantToken) -> Result<UploadGrant, MediaError> {
        let now = self.clock.now();
        let mut issued = self.issued.lock().await;

        let Some(grant) = issued.get(&token) else {
            return Err(MediaError::GrantNotFound);
        };

        if grant.is_expired(now) {
            let expired_at = grant.expires_at;
            issued.remove(&token);
            return Err(MediaError::GrantExpired { expired_at });
        }

        Ok(grant.clone())
    }

    /// Drop every lapsed grant, returning how many were removed.
    pub async fn prune_expired(&self) -> usize {
        let now = self.clock.now();
        let mut issued = self.issued.lock().await;
        let before = issued.len();
        Self::prune(&mut issued, now);
        before - issued.len()
    }

    fn prune(issued: &mut HashMap<GrantToken, UploadGrant>, now: chrono::DateTime<chrono::Utc>) {
        issued.retain(|_, grant| !grant.is_expired(now));
    }
}

impl std::fmt::Debug for UploadAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadAuthorizer")
            .field("entitlements", &self.entitlements.len())
            .field("max_ttl", &self.max_ttl)
            .finish_non_exhaustive()
    }
}
