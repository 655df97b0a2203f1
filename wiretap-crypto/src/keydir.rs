//! # Key Directory
//!
//! Owns the identity → public-key map for all registered
//! participants. One directory instance is constructed at server
//! boot and handed to request handlers by reference; there are no
//! ambient globals.

use std::collections::HashMap;

use rsa::RsaPublicKey;

use crate::{CryptoError, Result};

/// Registry of identity public keys, in registration order.
///
/// Private keys are never stored here; they belong to whoever
/// performed the registration. Other components see key material
/// only through [`KeyDirectory::public_key`].
#[derive(Debug, Default)]
pub struct KeyDirectory {
    /// Identity → public key.
    keys: HashMap<String, RsaPublicKey>,
    /// Registration order, for stable user listings.
    order: Vec<String>,
}

impl KeyDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity's public key.
    ///
    /// Re-registering an existing id replaces its key and is logged
    /// loudly: any certificate issued for the old key is now based on
    /// stale material and the caller must re-issue it.
    pub fn register(&mut self, id: &str, public_key: RsaPublicKey) {
        if self.keys.insert(id.to_owned(), public_key).is_some() {
            tracing::warn!(id, "re-registered identity; prior certificate is stale");
        } else {
            self.order.push(id.to_owned());
            tracing::info!(id, "registered identity");
        }
    }

    /// Look up an identity's public key.
    ///
    /// # Errors
    /// [`CryptoError::UnknownIdentity`] when the id has never been
    /// registered. Callers must abort rather than proceed keyless.
    pub fn public_key(&self, id: &str) -> Result<&RsaPublicKey> {
        self.keys
            .get(id)
            .ok_or_else(|| CryptoError::UnknownIdentity(id.to_owned()))
    }

    /// Whether the identity is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.keys.contains_key(id)
    }

    /// All registered ids, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of registered identities.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
