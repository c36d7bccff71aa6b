//! # chatwire-core
//!
//! Core types for Chatwire, a session lifecycle core for long-lived
//! connections to a real-time messaging network.
//!
//! This crate contains all fundamental types with **no internal
//! dependencies** on other chatwire crates. It provides:
//!
//! - Session types (SessionId, SessionState, Generation, StatusSnapshot)
//! - Protocol client events and the command/event trait contracts
//! - Credential store and artifact sink contracts
//! - Router configuration with atomic reload
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this
//! one, but this crate has no dependencies on other chatwire crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all modules
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod session;

// Re-export commonly used types
pub use client::{
    ArtifactSink, CredentialBundle, CredentialStore, ProtocolClient, ProtocolConnector,
};
pub use config::{ConfigHandle, FeatureFlags, RouterConfig};
pub use error::{Error, Result};
pub use event::{ClientEvent, CloseReason, ConnectionUpdate, InboundMessage, PresenceUpdate};
pub use session::{Generation, SessionId, SessionState, StatusSnapshot};
