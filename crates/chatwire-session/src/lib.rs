//! Session lifecycle engine.
//!
//! This crate owns the connect/reconnect state machine for chat sessions:
//! generation fencing, QR and pairing login flows, bounded reconnect
//! backoff, heartbeats, ordered credential persistence, and routing of
//! inbound messages to outbound actions. It is generic over the protocol
//! connector, credential store, and artifact sink traits from
//! `chatwire-core`, so the whole lifecycle is testable with in-memory
//! fakes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod manager;

mod driver;
mod shared;

pub use backoff::{Backoff, BackoffPolicy};
pub use manager::{SessionManager, SessionManagerConfig};
