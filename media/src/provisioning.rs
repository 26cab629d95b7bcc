//! Read-identity provisioning for the delivery front end.
//!
//! The front end needs one fixed trust identity the asset store will serve
//! reads to. How that identity comes to exist is a deployment decision with
//! two shapes: mint a fresh role for this environment, or attach to a role
//! that already exists. The choice is a strategy resolved exactly once when
//! the media pipeline is assembled; the two variants are never mixed at
//! runtime.

use bindery_core::identity::TrustIdentity;

/// How the delivery front end's read identity is provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityProvisioning {
    /// Mint a fresh delivery role scoped to this environment.
    CreateRole {
        /// Environment name the role is minted for.
        environment: String,
    },
    /// Attach to a role that already exists outside this system.
    AttachExisting {
        /// Reference to the pre-existing role.
        role_ref: String,
    },
}

impl IdentityProvisioning {
    /// Resolve the strategy into the front end's fixed trust identity.
    ///
    /// Called once at pipeline assembly; the result is the only identity
    /// the asset store will ever serve reads to.
    #[must_use]
    pub fn resolve(&self) -> TrustIdentity {
        match self {
            Self::CreateRole { environment } => {
                let identity = TrustIdentity::new(format!("{environment}-cover-delivery"));
                tracing::info!(identity = %identity, "delivery read role created");
                identity
            }
            Self::AttachExisting { role_ref } => {
                let identity = TrustIdentity::new(role_ref.clone());
                tracing::info!(identity = %identity, "attached to existing delivery read role");
                identity
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_roles_are_scoped_to_the_environment() {
        let identity = IdentityProvisioning::CreateRole {
            environment: "production".to_string(),
        }
        .resolve();
        assert_eq!(identity.as_str(), "production-cover-delivery");
    }

    #[test]
    fn attaching_reuses_the_existing_reference() {
        let identity = IdentityProvisioning::AttachExisting {
            role_ref: "shared-cdn-reader".to_string(),
        }
        .resolve();
        assert_eq!(identity.as_str(), "shared-cdn-reader");
    }

    #[test]
    fn strategies_resolve_deterministically() {
        let strategy = IdentityProvisioning::CreateRole {
            environment: "staging".to_string(),
        };
        assert_eq!(strategy.resolve(), strategy.resolve());
    }
}
