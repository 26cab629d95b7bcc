//! Assembly of the media pipeline.
//!
//! Resolves the read identity once, then wires the store and authorizer to
//! the same clock. This is the only place the pieces meet; after assembly
//! each component enforces its own checks independently.

use crate::authorizer::{Entitlement, UploadAuthorizer};
use crate::provisioning::IdentityProvisioning;
use crate::store::AssetStore;
use bindery_core::config::Config;
use bindery_core::environment::Clock;
use bindery_core::identity::TrustIdentity;
use std::sync::Arc;

/// The assembled media pipeline: store, authorizer, and the front end's
/// resolved read identity.
#[derive(Debug)]
pub struct MediaPipeline {
    /// Private versioned object storage.
    pub store: Arc<AssetStore>,
    /// Grant issuance against pre-provisioned entitlements.
    pub authorizer: Arc<UploadAuthorizer>,
    /// The identity the delivery front end presents on reads.
    pub reader: TrustIdentity,
}

impl MediaPipeline {
    /// Assemble the pipeline.
    ///
    /// `provisioning` is resolved exactly once here; the resulting identity
    /// is both handed to the store (as the only permitted reader) and
    /// returned for the front end to present.
    #[must_use]
    pub fn new(
        config: &Config,
        provisioning: &IdentityProvisioning,
        entitlements: Vec<Entitlement>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let reader = provisioning.resolve();
        let store = Arc::new(AssetStore::new(reader.clone(), Arc::clone(&clock)));
        let authorizer = Arc::new(UploadAuthorizer::new(
            entitlements,
            config.max_grant_ttl(),
            clock,
        ));

        tracing::info!(
            environment = %config.environment,
            reader = %reader,
            max_grant_ttl_secs = config.max_grant_ttl_seconds,
            "media pipeline assembled"
        );

        Self {
            store,
            authorizer,
            reader,
        }
    }
}
