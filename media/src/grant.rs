//! Short-lived, scope-limited upload grants.
//!
//! A grant packages rights the requesting principal already holds into a
//! time-boxed credential scoped to one key prefix and an explicit verb set.
//! Grants are single-purpose: a grant carrying only [`UploadVerb::Put`]
//! cannot be replayed as a read.

use bindery_core::identity::Principal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Verbs an upload grant can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UploadVerb {
    /// Write an object.
    #[serde(rename = "PUT")]
    Put,
    /// Abort an in-progress multipart upload.
    #[serde(rename = "ABORT_MULTIPART")]
    AbortMultipart,
    /// Read object metadata.
    #[serde(rename = "HEAD")]
    Head,
    /// Read an object.
    #[serde(rename = "GET")]
    Get,
}

impl UploadVerb {
    /// The verb's wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Put => "PUT",
            Self::AbortMultipart => "ABORT_MULTIPART",
            Self::Head => "HEAD",
            Self::Get => "GET",
        }
    }
}

impl fmt::Display for UploadVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque token identifying an issued grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantToken(Uuid);

impl GrantToken {
    /// Mint a fresh token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GrantToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GrantToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for GrantToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A time-boxed credential permitting direct writes to the asset store.
///
/// Validity window: the grant is usable through `expires_at` inclusive and
/// invalid strictly after it, so a 300-second grant works at t=300 and
/// fails at t=301.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadGrant {
    /// Token the holder presents to redeem the grant.
    pub token: GrantToken,

    /// The principal the grant was issued to.
    pub principal: Principal,

    /// Keys covered: any key with this prefix.
    pub key_prefix: String,

    /// The verbs this grant permits. Nothing else is ever implied.
    pub verbs: Vec<UploadVerb>,

    /// When the grant was issued.
    pub issued_at: DateTime<Utc>,

    /// Last instant the grant is valid.
    pub expires_at: DateTime<Utc>,
}

impl UploadGrant {
    /// Whether the grant's scope covers `key`.
    #[must_use]
    pub fn covers(&self, key: &str) -> bool {
        key.starts_with(&self.key_prefix)
    }

    /// Whether the grant carries `verb`.
    #[must_use]
    pub fn permits(&self, verb: UploadVerb) -> bool {
        self.verbs.contains(&verb)
    }

    /// Whether the grant has lapsed as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn grant(prefix: &str, verbs: Vec<UploadVerb>) -> UploadGrant {
        let issued_at = Utc::now();
        UploadGrant {
            token: GrantToken::new(),
            principal: Principal::new("backend"),
            key_prefix: prefix.to_string(),
            verbs,
            issued_at,
            expires_at: issued_at + ChronoDuration::seconds(300),
        }
    }

    #[test]
    fn prefix_scoping() {
        let grant = grant("covers/", vec![UploadVerb::Put]);
        assert!(grant.covers("covers/123.jpg"));
        assert!(!grant.covers("spines/123.jpg"));
    }

    #[test]
    fn exact_key_scope_rejects_siblings() {
        let grant = grant("covers/123.jpg", vec![UploadVerb::Put]);
        assert!(grant.covers("covers/123.jpg"));
        assert!(!grant.covers("covers/999.jpg"));
    }

    #[test]
    fn grants_are_single_purpose() {
        let grant = grant("covers/", vec![UploadVerb::Put]);
        assert!(grant.permits(UploadVerb::Put));
        assert!(!grant.permits(UploadVerb::Get));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let grant = grant("covers/", vec![UploadVerb::Put]);
        assert!(!grant.is_expired(grant.expires_at));
        assert!(grant.is_expired(grant.expires_at + ChronoDuration::seconds(1)));
    }

    #[test]
    fn verbs_serialize_to_wire_names() {
        let json = serde_json::to_string(&UploadVerb::Put).unwrap();
        assert_eq!(json, "\"PUT\"");
        let back: UploadVerb = serde_json::from_str("\"ABORT_MULTIPART\"").unwrap();
        assert_eq!(back, UploadVerb::AbortMultipart);
    }
}
