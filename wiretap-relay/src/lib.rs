//! # Wiretap Relay
//!
//! Message relay and interception workflow for Project Wiretap. This
//! crate holds the stateful half of the demonstration: the message
//! log, the delivery-gating state machine on the server, and the
//! attacker-side workflow that decides per message whether to pass it
//! through, rewrite it, or leave it alone.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐ SendMessage ┌─────────────┐  withheld   ┌──────────────┐
//! │ Sender │────────────▶│ RelayServer │────────────▶│ Attacker     │
//! └────────┘   (echo ◀──)│  log, gate  │  feed       │ Workflow     │
//!                        └─────────────┘◀────────────│ claim/rewrite│
//!                               │    TamperedForward  └──────────────┘
//!                               ▼
//!                         ┌───────────┐
//!                         │ Recipient │  (tampered / integrity flags)
//!                         └───────────┘
//! ```
//!
//! The point of the exercise: rewriting a plaintext message leaves no
//! trace, while rewriting an encrypted-flagged message trips the
//! integrity hash and is delivered visibly marked as tampered.
//!
//! The web-socket transport, room broadcast, and interactive attacker
//! console are external collaborators; this crate exposes typed
//! events ([`ClientEvent`]/[`ServerEvent`]) and addressed replies
//! ([`Outbound`]) for them to adapt.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attacker;
pub mod events;
pub mod interception;
pub mod link;
pub mod message;
pub mod server;
pub mod store;

pub use attacker::{AttackerAction, AttackerState, AttackerStats, AttackerWorkflow, Decision};
pub use events::{Address, ClientEvent, Outbound, ServerEvent};
pub use interception::{InterceptionController, RoutingVerdict};
pub use link::{spawn_server, AttackerLink};
pub use message::{Message, MessageId};
pub use server::RelayServer;
pub use store::MessageStore;

use thiserror::Error;
use wiretap_crypto::CryptoError;

/// Errors that can occur in the relay layer.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The sending identity has no registered key material.
    #[error("Unknown sender: {0}")]
    UnknownSender(String),

    /// The recipient has no registered key material; the send is
    /// aborted rather than proceeding keyless.
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(String),

    /// A cryptographic operation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// No message is awaiting an operator tamper decision.
    #[error("No pending tamper decision")]
    NoPendingDecision,

    /// The channel to the peer task closed.
    #[error("Link closed")]
    LinkClosed,
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
