//! # Bindery Core
//!
//! Shared vocabulary for the bindery bookstore infrastructure: the fixed
//! [`Capability`](capability::Capability) set, the [`Message`](message::Message)
//! envelope, identity types, and the startup [`Config`](config::Config).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   publish(capability, payload)
//! │ Publisher  │──────────────┐
//! └────────────┘              ▼
//!                      ┌─────────────┐
//!                      │  Event Bus  │  one topic per capability
//!                      └──────┬──────┘
//!                             ▼
//!                      ┌─────────────┐
//!                      │    Topic    │  fanout to subscriptions
//!                      └──────┬──────┘
//!                             ▼
//!                      ┌─────────────┐
//!                      │    Queue    │  at-least-once, per capability
//!                      └──────┬──────┘
//!                             ▼
//!                      ┌─────────────┐
//!                      │  Consumer   │  external collaborator
//!                      └─────────────┘
//! ```
//!
//! The media pipeline shares the identity types defined here: the upload
//! authorizer scopes grants to a [`Principal`](identity::Principal), and the
//! asset store only serves reads to the delivery front end's
//! [`TrustIdentity`](identity::TrustIdentity).
//!
//! ## Design Principles
//!
//! - Routing topology is an explicit table built once from [`config::Config`]
//! - Authorization is an explicit predicate checked on every call, never an
//!   implicit trust relationship
//! - Identities are distinct types so they cannot be confused at a call site

pub mod capability;
pub mod config;
pub mod environment;
pub mod identity;
pub mod message;

pub use capability::{Capability, UnknownCapability};
pub use config::{Config, ConfigError, RetryConfig};
pub use environment::{Clock, SystemClock};
pub use identity::{Principal, TopicIdentity, TrustIdentity};
pub use message::{Message, MessageId};
