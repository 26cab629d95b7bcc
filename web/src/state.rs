//! Application state shared across HTTP handlers.

use crate::cache::AssetCache;
use bindery_core::config::Config;
use bindery_core::environment::{Clock, SystemClock};
use bindery_core::identity::{Principal, TrustIdentity};
use bindery_fanout::{EventBus, FanoutError};
use bindery_media::authorizer::{Entitlement, UploadAuthorizer};
use bindery_media::grant::UploadVerb;
use bindery_media::pipeline::MediaPipeline;
use bindery_media::provisioning::IdentityProvisioning;
use bindery_media::store::AssetStore;
use std::sync::Arc;

/// The principal name the backend presents when requesting upload grants.
pub const BACKEND_PRINCIPAL: &str = "bookstore-backend";

/// Key prefix covering all book-cover uploads.
pub const COVER_PREFIX: &str = "covers/";

/// Shared state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The event fanout façade.
    pub bus: Arc<EventBus>,
    /// Private asset storage.
    pub store: Arc<AssetStore>,
    /// Upload grant issuance.
    pub authorizer: Arc<UploadAuthorizer>,
    /// Edge cache for asset reads.
    pub cache: Arc<AssetCache>,
    /// The identity the front end presents to the store.
    pub reader: TrustIdentity,
    /// Deployment environment name.
    pub environment: String,
}

impl AppState {
    /// Assemble the full application state from configuration.
    ///
    /// The backend principal's entitlement on the cover prefix is the only
    /// pre-provisioned right; the read identity is minted for this
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the fanout topology fails bind-time validation.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime (the delivery worker is
    /// spawned here).
    pub fn new(config: &Config) -> Result<Self, FanoutError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`AppState::new`] with an injected clock, for tests that need
    /// to control grant expiry or cache freshness.
    ///
    /// # Errors
    ///
    /// Same as [`AppState::new`].
    ///
    /// # Panics
    ///
    /// Same as [`AppState::new`].
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, FanoutError> {
        let bus = Arc::new(EventBus::with_clock(config, Arc::clone(&clock))?);

        let entitlements = vec![Entitlement {
            principal: Principal::new(BACKEND_PRINCIPAL),
            key_prefix: COVER_PREFIX.to_string(),
            verbs: vec![
                UploadVerb::Put,
                UploadVerb::AbortMultipart,
                UploadVerb::Head,
                UploadVerb::Get,
            ],
        }];
        let provisioning = IdentityProvisioning::CreateRole {
            environment: config.environment.clone(),
        };
        let media = MediaPipeline::new(config, &provisioning, entitlements, Arc::clone(&clock));

        let cache = Arc::new(AssetCache::new(config.asset_cache_ttl(), clock));

        Ok(Self {
            bus,
            store: media.store,
            authorizer: media.authorizer,
            cache,
            reader: media.reader,
            environment: config.environment.clone(),
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.environment)
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn state_assembles_from_default_config() {
        let state = AppState::new(&Config::default()).unwrap();
        assert_eq!(state.environment, "development");
        assert_eq!(state.reader.as_str(), "development-cover-delivery");
    }
}
