//! # chatwire-router
//!
//! Inbound message classification for Chatwire.
//!
//! The router turns one inbound message into a list of outbound actions:
//! command replies, presence toggles, read receipts. It consults the
//! blocklist and feature flags through a [`ConfigHandle`] snapshot taken
//! once per message, so a concurrent reload never produces a half-applied
//! decision.
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends only on chatwire-core.
//! Actions are pure data; executing them against the protocol client is the
//! session layer's concern.

#![warn(missing_docs)]
#![warn(clippy::all)]

use tracing::debug;

use chatwire_core::{ConfigHandle, InboundMessage};

/// Outbound action produced by routing one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a text reply to a remote address
    Reply {
        /// Destination address
        to: String,
        /// Reply text
        text: String,
    },
    /// Toggle a composing indicator towards the sender, then release it
    SimulateTyping {
        /// Destination address
        to: String,
    },
    /// Mark the given message ids as read
    MarkRead {
        /// Protocol-level message ids
        ids: Vec<String>,
    },
}

/// Classifies inbound messages against blocklist and feature configuration.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    config: ConfigHandle,
}

impl CommandRouter {
    /// Create a router reading configuration through the given handle.
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    /// Route one inbound message to its outbound actions.
    ///
    /// Self-originated messages and blocklisted senders yield no actions.
    /// A command-prefixed message yields exactly one reply (a fixed reply
    /// for recognized tokens, an "unknown command" reply otherwise). Plain
    /// text yields only feature-gated side effects, each at most once.
    pub fn route(&self, message: &InboundMessage) -> Vec<Action> {
        if message.from_self {
            return Vec::new();
        }

        let config = self.config.snapshot();

        if config.blocklist.contains(&message.sender) {
            debug!(sender = %message.sender, "dropping message from blocklisted sender");
            return Vec::new();
        }

        let text = message.text.trim();
        if let Some(rest) = text.strip_prefix(&config.command_prefix) {
            let token = rest.split_whitespace().next().unwrap_or("");
            let reply = match token.to_ascii_lowercase().as_str() {
                "ping" => "Pong! Bot is active.".to_string(),
                "help" => format!(
                    "Commands: {p}ping, {p}help, {p}about",
                    p = config.command_prefix
                ),
                "about" => "Chatwire session bot.".to_string(),
                _ => format!("Unknown command: {}{}", config.command_prefix, token),
            };
            return vec![Action::Reply {
                to: message.sender.clone(),
                text: reply,
            }];
        }

        let mut actions = Vec::new();
        if config.features.simulated_typing {
            actions.push(Action::SimulateTyping {
                to: message.sender.clone(),
            });
        }
        if config.features.read_receipts {
            actions.push(Action::MarkRead {
                ids: vec![message.id.clone()],
            });
        }
        actions
    }
}
