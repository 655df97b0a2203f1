//! # Attacker Workflow
//!
//! The client-side state machine driving the man-in-the-middle. It
//! receives batches of candidate messages, dedups them, claims the
//! ones it will sit on, and queues plaintext messages for a manual
//! rewrite-or-skip decision. Encrypted messages are treated as
//! cryptographically out of reach and auto-forwarded unchanged.
//!
//! The interactive console that prompts the operator is an external
//! collaborator; this machine just emits [`AttackerAction`]s for it
//! and for the server link.

use std::collections::{HashSet, VecDeque};

use crate::events::ClientEvent;
use crate::message::{Message, MessageId};
use crate::{RelayError, Result};

/// Workflow states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackerState {
    /// No decision pending.
    Idle,
    /// A plaintext message is waiting on the operator; further
    /// candidates queue behind it.
    AwaitingTamperDecision,
}

/// The operator's verdict on a held plaintext message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Replace the body with this text before forwarding.
    Rewrite(String),
    /// Forward unchanged.
    Skip,
}

/// What the workflow wants done next.
#[derive(Debug, Clone, PartialEq)]
pub enum AttackerAction {
    /// Emit this event to the server.
    Send(ClientEvent),
    /// Show this message to the operator; nothing to decide.
    Display(Message),
    /// Ask the operator for a [`Decision`] on this message.
    Prompt(Message),
}

/// Counters over everything the attacker has seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttackerStats {
    /// Messages observed in total.
    pub total: usize,
    /// Encrypted (unreadable) messages.
    pub encrypted: usize,
    /// Plaintext (readable) messages.
    pub plaintext: usize,
    /// Whether tamper mode is on.
    pub tampering_active: bool,
}

/// The man-in-the-middle state machine.
#[derive(Debug, Default)]
pub struct AttackerWorkflow {
    current: Option<Message>,
    tamper_mode: bool,
    /// Ids shown to the operator at least once.
    displayed: HashSet<MessageId>,
    /// Ids committed to the tamper pipeline; never reconsidered.
    claimed: HashSet<MessageId>,
    /// Plaintext messages waiting behind the current decision, FIFO.
    queue: VecDeque<Message>,
    /// Everything observed, for stats and the operator's log.
    observed: Vec<Message>,
}

impl AttackerWorkflow {
    /// Create an idle workflow with tamper mode off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> AttackerState {
        if self.current.is_some() {
            AttackerState::AwaitingTamperDecision
        } else {
            AttackerState::Idle
        }
    }

    /// Whether tamper mode is on.
    pub fn tamper_mode(&self) -> bool {
        self.tamper_mode
    }

    /// Number of messages queued behind the current decision.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Actions to run on connect: enable tampering and fetch the
    /// server's backlog.
    pub fn connect_actions(&mut self) -> Vec<AttackerAction> {
        self.tamper_mode = true;
        vec![
            AttackerAction::Send(ClientEvent::SetTamperingMode { active: true }),
            AttackerAction::Send(ClientEvent::RequestIntercept),
        ]
    }

    /// Toggle tamper mode, notifying the server.
    pub fn set_tamper_mode(&mut self, active: bool) -> Vec<AttackerAction> {
        self.tamper_mode = active;
        vec![AttackerAction::Send(ClientEvent::SetTamperingMode {
            active,
        })]
    }

    /// Ingest a batch of candidate messages (from the interception
    /// feed or live traffic), deduplicating against everything seen
    /// before.
    pub fn ingest(&mut self, batch: Vec<Message>) -> Vec<AttackerAction> {
        let mut actions = Vec::new();
        for message in batch {
            let id = message.id();
            if self.claimed.contains(&id) || self.displayed.contains(&id) {
                continue;
            }
            self.displayed.insert(id.clone());
            self.observed.push(message.clone());

            if !self.tamper_mode {
                // Server already delivered directly; display only.
                actions.push(AttackerAction::Display(message));
                continue;
            }

            // Claim it so the server's normal path lets go of it.
            self.claimed.insert(id.clone());
            actions.push(AttackerAction::Send(ClientEvent::InterceptClaim {
                message_id: id,
                intercepted: true,
            }));

            if message.encrypted {
                // Out of cryptographic reach; forward untouched.
                tracing::info!(
                    sender = %message.sender,
                    recipient = %message.recipient,
                    "encrypted message auto-forwarded unchanged"
                );
                actions.push(AttackerAction::Display(message.clone()));
                actions.push(AttackerAction::Send(ClientEvent::TamperedForward {
                    original_message: message.body.clone(),
                    message,
                }));
            } else if self.current.is_none() {
                self.current = Some(message.clone());
                actions.push(AttackerAction::Prompt(message));
            } else {
                self.queue.push_back(message);
            }
        }
        actions
    }

    /// Apply the operator's decision to the held message, then move
    /// on to the next queued one, if any.
    ///
    /// # Errors
    /// [`RelayError::NoPendingDecision`] when nothing is held.
    pub fn decide(&mut self, decision: Decision) -> Result<Vec<AttackerAction>> {
        let held = self.current.take().ok_or(RelayError::NoPendingDecision)?;
        let original_body = held.body.clone();

        let mut forwarded = held;
        if let Decision::Rewrite(text) = decision {
            tracing::info!(
                original = %original_body,
                rewritten = %text,
                "operator rewrote message"
            );
            forwarded.body = text;
        }

        let mut actions = vec![AttackerAction::Send(ClientEvent::TamperedForward {
            message: forwarded,
            original_message: original_body,
        })];

        if let Some(next) = self.queue.pop_front() {
            self.current = Some(next.clone());
            actions.push(AttackerAction::Prompt(next));
        }
        Ok(actions)
    }

    /// Counters over everything observed so far.
    pub fn stats(&self) -> AttackerStats {
        let encrypted = self.observed.iter().filter(|m| m.encrypted).count();
        AttackerStats {
            total: self.observed.len(),
            encrypted,
            plaintext: self.observed.len() - encrypted,
            tampering_active: self.tamper_mode,
        }
    }

    /// Forget observed messages (stats reset). Claims and display
    /// dedup are kept; clearing the log must not resurrect a message
    /// into the pipeline.
    pub fn clear_observed(&mut self) {
        self.observed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(body: &str, timestamp: &str, encrypted: bool) -> Message {
        Message::new("alice", "bob", timestamp, body, encrypted)
    }

    fn sent_events(actions: &[AttackerAction]) -> Vec<&ClientEvent> {
        actions
            .iter()
            .filter_map(|a| match a {
                AttackerAction::Send(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_connect_enables_tampering_and_fetches_backlog() {
        let mut wf = AttackerWorkflow::new();
        let actions = wf.connect_actions();

        assert_eq!(
            sent_events(&actions),
            vec![
                &ClientEvent::SetTamperingMode { active: true },
                &ClientEvent::RequestIntercept,
            ]
        );
        assert!(wf.tamper_mode());
    }

    #[test]
    fn test_passive_mode_is_display_only() {
        let mut wf = AttackerWorkflow::new();
        let actions = wf.ingest(vec![msg("hi", "2025-06-01 12:00:00", false)]);

        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], AttackerAction::Display(_)));
        assert_eq!(wf.state(), AttackerState::Idle);
    }

    #[test]
    fn test_plaintext_in_tamper_mode_is_claimed_and_prompted() {
        let mut wf = AttackerWorkflow::new();
        wf.connect_actions();

        let m = msg("hi", "2025-06-01 12:00:00", false);
        let actions = wf.ingest(vec![m.clone()]);

        assert_eq!(
            sent_events(&actions),
            vec![&ClientEvent::InterceptClaim {
                message_id: m.id(),
                intercepted: true,
            }]
        );
        assert!(matches!(actions.last(), Some(AttackerAction::Prompt(p)) if *p == m));
        assert_eq!(wf.state(), AttackerState::AwaitingTamperDecision);
    }

    #[test]
    fn test_encrypted_is_auto_forwarded_unchanged() {
        let mut wf = AttackerWorkflow::new();
        wf.connect_actions();

        let m = msg("ciphertext-ish", "2025-06-01 12:00:00", true);
        let actions = wf.ingest(vec![m.clone()]);

        let events = sent_events(&actions);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ClientEvent::InterceptClaim { .. }));
        assert_eq!(
            events[1],
            &ClientEvent::TamperedForward {
                message: m,
                original_message: "ciphertext-ish".to_owned(),
            }
        );
        // No manual decision for encrypted traffic.
        assert_eq!(wf.state(), AttackerState::Idle);
    }

    #[test]
    fn test_rewrite_decision_forwards_with_original_preserved() {
        let mut wf = AttackerWorkflow::new();
        wf.connect_actions();
        wf.ingest(vec![msg("hello", "2025-06-01 12:00:00", false)]);

        let actions = wf
            .decide(Decision::Rewrite("[HACKED] hello".to_owned()))
            .expect("decide failed");

        let events = sent_events(&actions);
        let ClientEvent::TamperedForward {
            message,
            original_message,
        } = events[0]
        else {
            panic!("expected TamperedForward");
        };
        assert_eq!(message.body, "[HACKED] hello");
        assert_eq!(original_message, "hello");
        assert_eq!(wf.state(), AttackerState::Idle);
    }

    #[test]
    fn test_skip_forwards_unchanged() {
        let mut wf = AttackerWorkflow::new();
        wf.connect_actions();
        wf.ingest(vec![msg("hello", "2025-06-01 12:00:00", false)]);

        let actions = wf.decide(Decision::Skip).expect("decide failed");
        let events = sent_events(&actions);
        let ClientEvent::TamperedForward {
            message,
            original_message,
        } = events[0]
        else {
            panic!("expected TamperedForward");
        };
        assert_eq!(message.body, "hello");
        assert_eq!(original_message, "hello");
    }

    #[test]
    fn test_queued_messages_are_prompted_fifo() {
        let mut wf = AttackerWorkflow::new();
        wf.connect_actions();

        wf.ingest(vec![
            msg("first", "2025-06-01 12:00:00", false),
            msg("second", "2025-06-01 12:00:01", false),
            msg("third", "2025-06-01 12:00:02", false),
        ]);
        assert_eq!(wf.queued(), 2);

        let actions = wf.decide(Decision::Skip).expect("decide failed");
        assert!(
            matches!(&actions[1], AttackerAction::Prompt(p) if p.body == "second"),
            "next prompt must follow FIFO order"
        );

        let actions = wf.decide(Decision::Skip).expect("decide failed");
        assert!(matches!(&actions[1], AttackerAction::Prompt(p) if p.body == "third"));

        let actions = wf.decide(Decision::Skip).expect("decide failed");
        assert_eq!(actions.len(), 1);
        assert_eq!(wf.state(), AttackerState::Idle);
    }

    #[test]
    fn test_reingested_batch_is_deduplicated() {
        let mut wf = AttackerWorkflow::new();
        wf.connect_actions();

        let batch = vec![msg("hello", "2025-06-01 12:00:00", false)];
        wf.ingest(batch.clone());
        wf.decide(Decision::Skip).expect("decide failed");

        // The same feed content again: nothing new happens.
        assert!(wf.ingest(batch).is_empty());
    }

    #[test]
    fn test_displayed_passive_message_is_not_reclaimed_later() {
        let mut wf = AttackerWorkflow::new();

        let batch = vec![msg("hello", "2025-06-01 12:00:00", false)];
        wf.ingest(batch.clone());

        // Enabling tamper mode afterwards must not pull an
        // already-displayed message into the pipeline.
        wf.set_tamper_mode(true);
        assert!(wf.ingest(batch).is_empty());
    }

    #[test]
    fn test_decide_without_pending_is_an_error() {
        let mut wf = AttackerWorkflow::new();
        assert!(matches!(
            wf.decide(Decision::Skip),
            Err(RelayError::NoPendingDecision)
        ));
    }

    #[test]
    fn test_stats_and_clear() {
        let mut wf = AttackerWorkflow::new();
        wf.connect_actions();
        wf.ingest(vec![
            msg("plain", "2025-06-01 12:00:00", false),
            msg("sealed", "2025-06-01 12:00:01", true),
        ]);

        let stats = wf.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.encrypted, 1);
        assert_eq!(stats.plaintext, 1);
        assert!(stats.tampering_active);

        wf.clear_observed();
        assert_eq!(wf.stats().total, 0);
        // Clearing the log keeps dedup intact.
        assert!(wf
            .ingest(vec![msg("plain", "2025-06-01 12:00:00", false)])
            .is_empty());
    }
}
