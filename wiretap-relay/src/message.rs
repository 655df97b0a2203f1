//! # Message Model
//!
//! The wire message record and its compound deduplication id.

use chrono::Local;
use serde::{Deserialize, Serialize};
use wiretap_crypto::Certificate;

/// Timestamp format for messages. Fixed-width and zero-padded so the
/// textual representation sorts chronologically; the conversation
/// query relies on that.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Compound message id: `sender_recipient_timestamp_body`.
///
/// Timestamps have one-second resolution, so two identical texts sent
/// between the same pair within one second collide and are treated as
/// one message. That granularity limitation is inherited deliberately
/// and is acceptable for this demonstration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Build an id from its components.
    pub fn new(sender: &str, recipient: &str, timestamp: &str, body: &str) -> Self {
        Self(format!("{sender}_{recipient}_{timestamp}_{body}"))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// A message as it travels through the relay.
///
/// `body` always carries the text the sender typed; for encrypted
/// sends the OAEP blob rides alongside in `ciphertext`. `body` is the
/// field an in-path attacker can rewrite, and `integrity_hash` is the
/// SHA-256 of the body as originally sent, which is what makes such a
/// rewrite detectable on the encrypted path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sending identity.
    pub sender: String,
    /// Receiving identity.
    pub recipient: String,
    /// Send time, [`TIMESTAMP_FORMAT`].
    pub timestamp: String,
    /// Message text as submitted (and as possibly rewritten in flight).
    pub body: String,
    /// Whether the sender requested the signed/encrypted path.
    pub encrypted: bool,
    /// Hex SHA-256 of the body at send time.
    pub integrity_hash: String,
    /// Base64 RSA-OAEP ciphertext, present when `encrypted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ciphertext: Option<String>,
    /// Base64 PKCS#1 v1.5 signature by the sender, present when
    /// `encrypted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Sender's certificate snapshot at send time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
    /// Set by the server when an encrypted-flagged message came back
    /// from the attacker with altered content.
    #[serde(default, skip_serializing_if = "is_false")]
    pub tampered: bool,
    /// Set by the server when the recomputed body hash no longer
    /// matches `integrity_hash`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub integrity_failure: bool,
}

impl Message {
    /// Build a fresh message; the integrity hash is computed over the
    /// body as given.
    pub fn new(
        sender: &str,
        recipient: &str,
        timestamp: &str,
        body: &str,
        encrypted: bool,
    ) -> Self {
        Self {
            sender: sender.to_owned(),
            recipient: recipient.to_owned(),
            timestamp: timestamp.to_owned(),
            body: body.to_owned(),
            encrypted,
            integrity_hash: wiretap_crypto::content_hash(body.as_bytes()),
            ciphertext: None,
            signature: None,
            certificate: None,
            tampered: false,
            integrity_failure: false,
        }
    }

    /// The compound deduplication id of this message.
    ///
    /// Computed from the *current* body, so it identifies the message
    /// as originally logged only while the body is unmodified. The
    /// attacker claims ids before rewriting, which is why claims use
    /// the original body.
    pub fn id(&self) -> MessageId {
        MessageId::new(&self.sender, &self.recipient, &self.timestamp, &self.body)
    }

    /// Whether this message is between the unordered pair `{a, b}`.
    pub fn between(&self, a: &str, b: &str) -> bool {
        (self.sender == a && self.recipient == b) || (self.sender == b && self.recipient == a)
    }
}
