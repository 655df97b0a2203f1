//! # Relay Server Core
//!
//! One service object owning all session state: the key directory,
//! the certificate authority, the message log, and the interception
//! controller. Each inbound [`ClientEvent`] is processed to
//! completion before the next (single logical writer), returning the
//! addressed [`Outbound`] events for the transport adapter to emit.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use wiretap_crypto::{
    encrypt, generate_keypair, private_key_pem, public_key_pem, sign, Certificate,
    CertificateAuthority, CryptoError, KeyDirectory, RsaPrivateKey, RsaPublicKey,
    DEFAULT_KEY_BITS,
};

use crate::events::{ClientEvent, Outbound, ServerEvent};
use crate::interception::{InterceptionController, RoutingVerdict};
use crate::message::{now_timestamp, Message, MessageId};
use crate::store::MessageStore;
use crate::{RelayError, Result};

/// The relay server's state, constructed once at boot and driven by
/// typed events. No ambient globals; request handlers receive this
/// object by reference.
///
/// The server holds each registered identity's private key so it can
/// sign and encrypt on the sender's behalf. That is a demo
/// convenience inherited from the original system, not a trust-model
/// claim.
pub struct RelayServer {
    keydir: KeyDirectory,
    authority: CertificateAuthority,
    private_keys: HashMap<String, RsaPrivateKey>,
    certificates: HashMap<String, Certificate>,
    store: MessageStore,
    controller: InterceptionController,
    key_bits: usize,
    /// Injectable clock so tests can pin timestamps.
    now_fn: Box<dyn Fn() -> String + Send>,
}

impl RelayServer {
    /// Create a server with a fresh authority using
    /// [`DEFAULT_KEY_BITS`] keys.
    pub fn new(issuer_name: &str) -> Result<Self> {
        Self::with_key_bits(issuer_name, DEFAULT_KEY_BITS)
    }

    /// Create a server generating identity and authority keys of the
    /// given size (small keys keep tests fast).
    pub fn with_key_bits(issuer_name: &str, key_bits: usize) -> Result<Self> {
        let authority = CertificateAuthority::with_key_bits(issuer_name, key_bits)?;
        Ok(Self {
            keydir: KeyDirectory::new(),
            authority,
            private_keys: HashMap::new(),
            certificates: HashMap::new(),
            store: MessageStore::new(),
            controller: InterceptionController::new(),
            key_bits,
            now_fn: Box::new(now_timestamp),
        })
    }

    /// Replace the timestamp source.
    pub fn set_clock(&mut self, now_fn: impl Fn() -> String + Send + 'static) {
        self.now_fn = Box::new(now_fn);
    }

    /// The authority's public key.
    pub fn authority_public_key(&self) -> &RsaPublicKey {
        self.authority.public_key()
    }

    /// Registered user ids, registration order.
    pub fn users(&self) -> Vec<String> {
        self.keydir.ids().map(str::to_owned).collect()
    }

    /// The message log.
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Whether tamper mode is currently on.
    pub fn tampering_active(&self) -> bool {
        self.controller.tampering_active()
    }

    /// Process one client event to completion.
    pub fn handle(&mut self, event: ClientEvent) -> Result<Vec<Outbound>> {
        match event {
            ClientEvent::RegisterIdentity { user_id } => self.register_identity(&user_id),
            ClientEvent::SendMessage {
                sender,
                recipient,
                message,
                encrypted,
            } => self.send_message(&sender, &recipient, &message, encrypted),
            ClientEvent::RequestIntercept => Ok(vec![Outbound::caller(
                ServerEvent::InterceptedMessages {
                    messages: self.store.all().to_vec(),
                },
            )]),
            ClientEvent::InterceptClaim {
                message_id,
                intercepted,
            } => {
                if intercepted {
                    self.controller.claim(message_id);
                }
                Ok(Vec::new())
            }
            ClientEvent::TamperedForward {
                message,
                original_message,
            } => self.tampered_forward(message, &original_message),
            ClientEvent::SetTamperingMode { active } => {
                self.controller.set_tampering(active);
                Ok(Vec::new())
            }
            ClientEvent::VerifyIdentity {
                user_id,
                certificate,
            } => {
                let verified =
                    CertificateAuthority::verify(&certificate, self.authority.public_key());
                tracing::info!(%user_id, verified, "certificate verification request");
                Ok(vec![Outbound::caller(ServerEvent::VerificationResult {
                    user_id,
                    verified,
                })])
            }
            ClientEvent::GetConversation {
                user_id,
                recipient_id,
            } => {
                let messages = self.store.conversation(&user_id, &recipient_id);
                tracing::info!(
                    %user_id,
                    %recipient_id,
                    count = messages.len(),
                    "conversation history request"
                );
                Ok(vec![Outbound::caller(ServerEvent::ConversationHistory {
                    conversation_with: recipient_id,
                    messages,
                })])
            }
            ClientEvent::ListUsers => Ok(vec![Outbound::caller(ServerEvent::Users {
                users: self.users(),
            })]),
        }
    }

    fn register_identity(&mut self, user_id: &str) -> Result<Vec<Outbound>> {
        let (private_key, public_key) = generate_keypair(self.key_bits)?;
        let certificate = self.authority.issue(user_id, &public_key)?;

        let key_event = ServerEvent::KeyGenerated {
            private_key_pem: private_key_pem(&private_key)?,
            public_key_pem: public_key_pem(&public_key)?,
            certificate: certificate.clone(),
            authority_public_key_pem: public_key_pem(self.authority.public_key())?,
        };

        self.keydir.register(user_id, public_key);
        self.private_keys.insert(user_id.to_owned(), private_key);
        self.certificates.insert(user_id.to_owned(), certificate);

        Ok(vec![
            Outbound::broadcast(ServerEvent::UserListUpdated {
                users: self.users(),
            }),
            Outbound::caller(key_event),
        ])
    }

    fn send_message(
        &mut self,
        sender: &str,
        recipient: &str,
        text: &str,
        encrypted: bool,
    ) -> Result<Vec<Outbound>> {
        if !self.keydir.contains(sender) {
            return Err(RelayError::UnknownSender(sender.to_owned()));
        }
        if !self.keydir.contains(recipient) {
            return Err(RelayError::UnknownRecipient(recipient.to_owned()));
        }

        let timestamp = (self.now_fn)();
        let mut message = Message::new(sender, recipient, &timestamp, text, encrypted);
        message.certificate = self.certificates.get(sender).cloned();

        if encrypted {
            let sender_key = self
                .private_keys
                .get(sender)
                .ok_or_else(|| RelayError::UnknownSender(sender.to_owned()))?;
            let recipient_key = self.keydir.public_key(recipient).map_err(|e| match e {
                CryptoError::UnknownIdentity(id) => RelayError::UnknownRecipient(id),
                other => RelayError::Crypto(other),
            })?;

            let signature = sign(text.as_bytes(), sender_key)?;
            message.signature = Some(BASE64.encode(signature));

            let ciphertext = encrypt(text.as_bytes(), recipient_key)?;
            message.ciphertext = Some(BASE64.encode(ciphertext));
        }

        tracing::info!(
            sender,
            recipient,
            encrypted,
            "message submitted"
        );

        // The sender always sees their own original message back
        // immediately, in both tamper states. Sender-side UX, not a
        // security property.
        let mut out = vec![Outbound::user(sender, ServerEvent::NewMessage {
            message: message.clone(),
        })];

        let id = message.id();
        self.store.append(message.clone());

        match self.controller.route_send(&id) {
            RoutingVerdict::Deliver => {
                tracing::info!(recipient, "delivered directly (no interception active)");
                out.push(Outbound::user(recipient, ServerEvent::NewMessage { message }));
            }
            RoutingVerdict::Withhold => {
                tracing::info!(recipient, "delivery withheld for interception");
            }
        }
        Ok(out)
    }

    fn tampered_forward(
        &mut self,
        message: Message,
        original_body: &str,
    ) -> Result<Vec<Outbound>> {
        tracing::warn!(
            sender = %message.sender,
            recipient = %message.recipient,
            "forwarded message received from attacker path"
        );

        match self.controller.forward_decision(message, original_body) {
            Some(delivered) => {
                let recipient = delivered.recipient.clone();
                tracing::info!(%recipient, "forwarded message delivered to recipient");
                Ok(vec![Outbound::user(
                    &recipient,
                    ServerEvent::NewMessage { message: delivered },
                )])
            }
            None => Ok(Vec::new()),
        }
    }

    /// Mark a message id claimed (test/adapter convenience mirroring
    /// [`ClientEvent::InterceptClaim`]).
    pub fn claim(&mut self, id: MessageId) {
        self.controller.claim(id);
    }
}
