//! # Bindery Media
//!
//! The secure media pipeline for book-cover images: a private versioned
//! asset store, short-lived upload grants, and the authorizer that issues
//! them.
//!
//! # Access Model
//!
//! ```text
//!                 authorize(key, verbs, ttl)
//! ┌─────────┐ ──────────────────────────────► ┌────────────────┐
//! │ Backend │                                 │   Authorizer   │
//! └─────────┘ ◄────────────── grant ───────── └────────────────┘
//!      │
//!      │ grant
//!      ▼
//! ┌─────────┐        PUT (grant)              ┌────────────────┐
//! │ Client  │ ──────────────────────────────► │  Asset Store   │ ◄── private
//! └─────────┘                                 └────────────────┘
//!                                                     ▲
//!                                        read (fixed trust identity)
//!                                                     │
//!                              ┌──────────────────────┴───┐
//!      GET /assets/{key} ────► │   Delivery Front End     │
//!                              └──────────────────────────┘
//! ```
//!
//! The store is never publicly readable: the delivery front end's fixed
//! trust identity is the only principal its `get` accepts, and every write
//! must present a valid, unexpired grant scoped to the key. The authorizer
//! cannot escalate: it only narrows rights a principal already holds into
//! a time-boxed credential.

pub mod authorizer;
pub mod error;
pub mod grant;
pub mod pipeline;
pub mod provisioning;
pub mod store;

pub use authorizer::{Entitlement, UploadAuthorizer};
pub use error::MediaError;
pub use grant::{GrantToken, UploadGrant, UploadVerb};
pub use pipeline::MediaPipeline;
pub use provisioning::IdentityProvisioning;
pub use store::{AssetStore, AssetVersion, VersionId};
