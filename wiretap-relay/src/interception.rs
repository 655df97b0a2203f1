//! # Interception Controller
//!
//! The server-side state machine deciding, per message, whether
//! normal delivery happens immediately or the message is withheld for
//! the attacker, plus the tamper-forward decision applied when a
//! message comes back from the attacker path.

use std::collections::HashSet;

use crate::message::{Message, MessageId};

/// Per-send routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingVerdict {
    /// Deliver to the recipient immediately.
    Deliver,
    /// Withhold; the message is visible only through the
    /// interception feed until a forward decision arrives.
    Withhold,
}

/// Process-wide interception state: the tamper-mode flag, the set of
/// explicitly claimed message ids, and the set of ids already
/// delivered to their recipient.
///
/// All mutation happens through explicit events processed to
/// completion one at a time, so no internal locking is needed; a
/// concurrent caller must wrap the whole controller.
#[derive(Debug, Default)]
pub struct InterceptionController {
    tampering_active: bool,
    claimed: HashSet<MessageId>,
    delivered: HashSet<MessageId>,
}

impl InterceptionController {
    /// Create a controller in the default `TAMPERING_OFF` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle tamper mode. The only transition trigger.
    pub fn set_tampering(&mut self, active: bool) {
        self.tampering_active = active;
        tracing::info!(active, "tampering mode set");
    }

    /// Whether tamper mode is currently on.
    pub fn tampering_active(&self) -> bool {
        self.tampering_active
    }

    /// Decide routing for a freshly logged message.
    ///
    /// In `TAMPERING_OFF` the message is delivered immediately (and
    /// recorded as delivered); in `TAMPERING_ON` it is withheld. A
    /// claimed id is withheld from the normal path unconditionally,
    /// even if tamper mode has been switched off in the meantime:
    /// claims are terminal.
    pub fn route_send(&mut self, id: &MessageId) -> RoutingVerdict {
        if self.claimed.contains(id) {
            tracing::info!(%id, "message already claimed; normal delivery suppressed");
            return RoutingVerdict::Withhold;
        }
        if self.tampering_active {
            return RoutingVerdict::Withhold;
        }
        self.delivered.insert(id.clone());
        RoutingVerdict::Deliver
    }

    /// Record that the attacker has claimed a message id.
    ///
    /// Returns `false` if the id was already claimed.
    pub fn claim(&mut self, id: MessageId) -> bool {
        let newly = self.claimed.insert(id.clone());
        if newly {
            tracing::info!(%id, "message claimed for interception");
        }
        newly
    }

    /// Whether an id has been claimed.
    pub fn is_claimed(&self, id: &MessageId) -> bool {
        self.claimed.contains(id)
    }

    /// Apply the tamper-forward decision to a message returning from
    /// the attacker path.
    ///
    /// `original_body` is the attacker-supplied copy of the body as
    /// intercepted. Flags are set per the protocol's asymmetry:
    /// - encrypted + hash mismatch → `integrity_failure`
    /// - encrypted + body changed → `tampered`
    /// - unencrypted + body changed → **no flag**; a plaintext channel
    ///   offers no tamper evidence, which is the point of the demo.
    ///
    /// Returns the message to deliver, or `None` when this id has
    /// already been delivered (forwarding is exactly-once).
    pub fn forward_decision(
        &mut self,
        mut forwarded: Message,
        original_body: &str,
    ) -> Option<Message> {
        if forwarded.encrypted && !forwarded.integrity_hash.is_empty() {
            let current = wiretap_crypto::content_hash(forwarded.body.as_bytes());
            if current != forwarded.integrity_hash {
                forwarded.integrity_failure = true;
                tracing::warn!(
                    sender = %forwarded.sender,
                    recipient = %forwarded.recipient,
                    "integrity check failed: hash mismatch on forwarded message"
                );
            }
        }

        if forwarded.body != original_body {
            if forwarded.encrypted {
                forwarded.tampered = true;
                tracing::warn!(
                    original = original_body,
                    tampered = %forwarded.body,
                    "encrypted-flagged message tampered in flight"
                );
            } else {
                tracing::info!(
                    original = original_body,
                    modified = %forwarded.body,
                    "unencrypted message modified in flight (undetectable)"
                );
            }
        }

        // Dedup on the id as originally logged; a rewritten body would
        // otherwise produce a fresh id and defeat exactly-once.
        let original_id = MessageId::new(
            &forwarded.sender,
            &forwarded.recipient,
            &forwarded.timestamp,
            original_body,
        );
        if !self.delivered.insert(original_id) {
            tracing::warn!(
                sender = %forwarded.sender,
                recipient = %forwarded.recipient,
                "duplicate forward suppressed"
            );
            return None;
        }
        Some(forwarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn msg(body: &str, encrypted: bool) -> Message {
        Message::new("alice", "bob", "2025-06-01 12:00:00", body, encrypted)
    }

    #[test]
    fn test_default_state_delivers_immediately() {
        let mut ctl = InterceptionController::new();
        let id = msg("hi", false).id();
        assert_eq!(ctl.route_send(&id), RoutingVerdict::Deliver);
    }

    #[test]
    fn test_tampering_on_withholds() {
        let mut ctl = InterceptionController::new();
        ctl.set_tampering(true);
        let id = msg("hi", false).id();
        assert_eq!(ctl.route_send(&id), RoutingVerdict::Withhold);
    }

    #[test]
    fn test_claimed_id_is_terminal_across_toggle() {
        let mut ctl = InterceptionController::new();
        ctl.set_tampering(true);
        let id = msg("hi", false).id();
        assert!(ctl.claim(id.clone()));

        // Toggling off mid-flight must not resurrect normal delivery.
        ctl.set_tampering(false);
        assert_eq!(ctl.route_send(&id), RoutingVerdict::Withhold);
    }

    #[test]
    fn test_double_claim_reports_not_new() {
        let mut ctl = InterceptionController::new();
        let id = msg("hi", false).id();
        assert!(ctl.claim(id.clone()));
        assert!(!ctl.claim(id));
    }

    #[test]
    fn test_plaintext_rewrite_is_not_flagged() {
        let mut ctl = InterceptionController::new();
        let mut forwarded = msg("hello", false);
        forwarded.body = "goodbye".into();

        let delivered = ctl
            .forward_decision(forwarded, "hello")
            .expect("should deliver");
        assert!(!delivered.tampered);
        assert!(!delivered.integrity_failure);
        assert_eq!(delivered.body, "goodbye");
    }

    #[test]
    fn test_encrypted_rewrite_sets_both_flags() {
        let mut ctl = InterceptionController::new();
        // Hash was computed over "hello" at send time.
        let mut forwarded = msg("hello", true);
        forwarded.body = "goodbye".into();

        let delivered = ctl
            .forward_decision(forwarded, "hello")
            .expect("should deliver");
        assert!(delivered.tampered);
        assert!(delivered.integrity_failure);
    }

    #[test]
    fn test_encrypted_passthrough_is_clean() {
        let mut ctl = InterceptionController::new();
        let forwarded = msg("hello", true);

        let delivered = ctl
            .forward_decision(forwarded, "hello")
            .expect("should deliver");
        assert!(!delivered.tampered);
        assert!(!delivered.integrity_failure);
    }

    #[test]
    fn test_forward_is_exactly_once() {
        let mut ctl = InterceptionController::new();

        let first = ctl.forward_decision(msg("hello", false), "hello");
        assert!(first.is_some());

        let second = ctl.forward_decision(msg("hello", false), "hello");
        assert!(second.is_none());
    }

    #[test]
    fn test_rewritten_forward_dedups_on_original_id() {
        let mut ctl = InterceptionController::new();

        let mut tampered = msg("hello", false);
        tampered.body = "goodbye".into();
        assert!(ctl.forward_decision(tampered, "hello").is_some());

        // Same intercepted message forwarded again, different rewrite.
        let mut tampered_again = msg("hello", false);
        tampered_again.body = "farewell".into();
        assert!(ctl.forward_decision(tampered_again, "hello").is_none());
    }

    #[test]
    fn test_normal_delivery_then_forward_is_suppressed() {
        let mut ctl = InterceptionController::new();
        let m = msg("hello", false);

        assert_eq!(ctl.route_send(&m.id()), RoutingVerdict::Deliver);
        assert!(ctl.forward_decision(m, "hello").is_none());
    }
}
