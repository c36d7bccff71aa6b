//! # chatwire-store
//!
//! Credential store and artifact sink implementations for Chatwire.
//!
//! This crate provides:
//! - Filesystem-backed credential persistence (`auth/<session>/creds.bin`
//!   with atomic replace, so the last saved bundle survives a crash)
//! - Filesystem-backed QR/pairing artifacts (`<session>/qr.png`,
//!   `<session>/pairing.txt`)
//! - In-memory counterparts for tests and embedders with their own
//!   persistence
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it implements the collaborator
//! contracts defined in chatwire-core.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fs;
pub mod memory;

// Re-export commonly used types
pub use fs::{FsArtifactSink, FsCredentialStore};
pub use memory::{MemoryArtifactSink, MemoryCredentialStore};
