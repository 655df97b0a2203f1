//! # Boundary Events
//!
//! Closed, typed event enums for the relay boundary. The web-socket
//! adapter (an external collaborator) serializes these; the core
//! never parses untyped payloads or dispatches on string event names.

use serde::{Deserialize, Serialize};
use wiretap_crypto::Certificate;

use crate::message::{Message, MessageId};

/// Events sent client → server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Register an identity: generates keys and a certificate.
    RegisterIdentity {
        /// Chosen identity name.
        user_id: String,
    },
    /// Submit a message for delivery.
    SendMessage {
        /// Sending identity.
        sender: String,
        /// Receiving identity.
        recipient: String,
        /// Message text.
        message: String,
        /// Request the signed/encrypted path.
        #[serde(default)]
        encrypted: bool,
    },
    /// Attacker: fetch the full logged-message backlog.
    RequestIntercept,
    /// Attacker: mark a message id as claimed for the tamper pipeline.
    InterceptClaim {
        /// Compound id of the claimed message.
        message_id: MessageId,
        /// Claim flag; `false` is a no-op (the original wire protocol
        /// carried it, so the event keeps it).
        intercepted: bool,
    },
    /// Attacker: forward a (possibly rewritten) intercepted message.
    TamperedForward {
        /// The message as forwarded, body possibly rewritten.
        message: Message,
        /// The body as originally intercepted.
        original_message: String,
    },
    /// Attacker: toggle global tamper mode.
    SetTamperingMode {
        /// New tamper-mode state.
        active: bool,
    },
    /// Verify another user's certificate.
    VerifyIdentity {
        /// Identity being checked.
        user_id: String,
        /// Certificate presented for that identity.
        certificate: Certificate,
    },
    /// Fetch conversation history with another user.
    GetConversation {
        /// Requesting identity.
        user_id: String,
        /// Conversation partner.
        recipient_id: String,
    },
    /// Fetch the registered user list.
    ListUsers,
}

/// Events sent server → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Registration reply: the new identity's key material.
    KeyGenerated {
        /// PEM-encoded private key (returned to the owner only).
        private_key_pem: String,
        /// PEM-encoded public key.
        public_key_pem: String,
        /// The authority-issued certificate.
        certificate: Certificate,
        /// PEM-encoded authority public key for local verification.
        authority_public_key_pem: String,
    },
    /// Broadcast after each registration.
    UserListUpdated {
        /// All registered ids, registration order.
        users: Vec<String>,
    },
    /// A message delivery (sender echo or recipient delivery).
    NewMessage {
        /// The delivered message.
        message: Message,
    },
    /// Reply to [`ClientEvent::RequestIntercept`].
    InterceptedMessages {
        /// Full logged backlog, insertion order.
        messages: Vec<Message>,
    },
    /// Reply to [`ClientEvent::VerifyIdentity`].
    VerificationResult {
        /// Identity that was checked.
        user_id: String,
        /// Whether the certificate verified.
        verified: bool,
    },
    /// Reply to [`ClientEvent::GetConversation`].
    ConversationHistory {
        /// Conversation partner the history is for.
        conversation_with: String,
        /// Time-sorted messages for the pair.
        messages: Vec<Message>,
    },
    /// Reply to [`ClientEvent::ListUsers`].
    Users {
        /// All registered ids.
        users: Vec<String>,
    },
}

/// Where an outbound event goes. The transport adapter maps these to
/// sockets/rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Address {
    /// The client whose event is being handled.
    Caller,
    /// A specific registered identity.
    User(String),
    /// Every connected client.
    Broadcast,
}

/// An addressed server event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outbound {
    /// Delivery target.
    pub to: Address,
    /// The event itself.
    pub event: ServerEvent,
}

impl Outbound {
    /// Address the handling client.
    pub fn caller(event: ServerEvent) -> Self {
        Self {
            to: Address::Caller,
            event,
        }
    }

    /// Address a specific identity.
    pub fn user(id: &str, event: ServerEvent) -> Self {
        Self {
            to: Address::User(id.to_owned()),
            event,
        }
    }

    /// Address all connected clients.
    pub fn broadcast(event: ServerEvent) -> Self {
        Self {
            to: Address::Broadcast,
            event,
        }
    }
}
