//! # Server/Attacker Link
//!
//! Channel plumbing between the relay server and the attacker
//! process. The two sides share no memory: every coordination signal
//! (tamper mode, claims, forwards) is an explicit event over an mpsc
//! channel, and both sides tolerate arbitrary delivery latency.
//!
//! A real deployment runs these over web sockets; the harness here is
//! the in-process equivalent the tests drive.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::attacker::{AttackerAction, AttackerWorkflow, Decision};
use crate::events::{ClientEvent, Outbound, ServerEvent};
use crate::server::RelayServer;
use crate::{RelayError, Result};

/// Channel capacity for both directions.
const CHANNEL_CAPACITY: usize = 100;

/// Spawn the server as a task consuming [`ClientEvent`]s and emitting
/// addressed [`Outbound`] replies.
///
/// The task ends when all event senders drop; the join handle then
/// yields the server back so its final state can be inspected.
pub fn spawn_server(
    mut server: RelayServer,
) -> (
    mpsc::Sender<ClientEvent>,
    mpsc::Receiver<Outbound>,
    JoinHandle<RelayServer>,
) {
    let (event_tx, mut event_rx) = mpsc::channel::<ClientEvent>(CHANNEL_CAPACITY);
    let (outbound_tx, outbound_rx) = mpsc::channel::<Outbound>(CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match server.handle(event) {
                Ok(replies) => {
                    for reply in replies {
                        if outbound_tx.send(reply).await.is_err() {
                            tracing::warn!("outbound side closed; stopping server task");
                            return server;
                        }
                    }
                }
                // A bad client event must not take the server down.
                Err(e) => tracing::warn!(error = %e, "event rejected"),
            }
        }
        server
    });

    (event_tx, outbound_rx, handle)
}

/// The attacker's side of the link: wraps an [`AttackerWorkflow`],
/// shipping its `Send` actions to the server and surfacing
/// `Display`/`Prompt` actions for the operator console to render.
pub struct AttackerLink {
    workflow: AttackerWorkflow,
    to_server: mpsc::Sender<ClientEvent>,
}

impl AttackerLink {
    /// Wrap a fresh workflow around a channel to the server.
    pub fn new(to_server: mpsc::Sender<ClientEvent>) -> Self {
        Self {
            workflow: AttackerWorkflow::new(),
            to_server,
        }
    }

    /// The wrapped workflow, for stats and state queries.
    pub fn workflow(&self) -> &AttackerWorkflow {
        &self.workflow
    }

    /// On connect: enable tamper mode and request the backlog, as the
    /// attacker console does when it attaches.
    pub async fn connect(&mut self) -> Result<()> {
        let actions = self.workflow.connect_actions();
        self.dispatch(actions).await?;
        Ok(())
    }

    /// Toggle tamper mode.
    pub async fn set_tamper_mode(&mut self, active: bool) -> Result<()> {
        let actions = self.workflow.set_tamper_mode(active);
        self.dispatch(actions).await?;
        Ok(())
    }

    /// Feed a server event into the workflow. Message-bearing events
    /// are ingested; everything else is ignored. Returns the actions
    /// the operator console must surface.
    pub async fn on_server_event(&mut self, event: ServerEvent) -> Result<Vec<AttackerAction>> {
        let batch = match event {
            ServerEvent::InterceptedMessages { messages } => messages,
            ServerEvent::NewMessage { message } => vec![message],
            _ => return Ok(Vec::new()),
        };
        let actions = self.workflow.ingest(batch);
        self.dispatch(actions).await
    }

    /// Apply the operator's decision to the held message.
    pub async fn decide(&mut self, decision: Decision) -> Result<Vec<AttackerAction>> {
        let actions = self.workflow.decide(decision)?;
        self.dispatch(actions).await
    }

    /// Ship `Send` actions to the server; hand everything else back.
    async fn dispatch(&mut self, actions: Vec<AttackerAction>) -> Result<Vec<AttackerAction>> {
        let mut surfaced = Vec::new();
        for action in actions {
            match action {
                AttackerAction::Send(event) => self
                    .to_server
                    .send(event)
                    .await
                    .map_err(|_| RelayError::LinkClosed)?,
                other => surfaced.push(other),
            }
        }
        Ok(surfaced)
    }
}
