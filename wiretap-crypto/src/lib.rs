//! # Wiretap Crypto
//!
//! Trust protocol primitives for Project Wiretap:
//! - **RSA-2048 key pairs** for registered identities
//! - **PKCS#1 v1.5 + SHA-256** signatures over message plaintext
//! - **RSA-OAEP (SHA-256)** encryption to the recipient's public key
//! - **SHA-256 content hashes** for post-hoc integrity comparison
//! - **Certificates** binding an identity to its public key, signed
//!   by a demo authority ([`authority::CertificateAuthority`])
//!
//! The split matters for the demonstration this workspace exists for:
//! an in-path attacker can rewrite plaintext silently, but a rewrite
//! of a signed-and-hashed encrypted message is always detectable.
//!
//! ## Safety
//!
//! This crate forbids all unsafe code to maximize auditability.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wiretap_crypto::{generate_keypair, sign, verify_signature};
//!
//! let (sk, pk) = generate_keypair(2048).unwrap();
//! let sig = sign(b"hello", &sk).unwrap();
//! assert!(verify_signature(b"hello", &sig, &pk).unwrap());
//! assert!(!verify_signature(b"goodbye", &sig, &pk).unwrap());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod authority;
pub mod keydir;

pub use authority::{Certificate, CertificateAuthority};
pub use keydir::KeyDirectory;

// Re-exported so downstream crates share one `rsa` surface.
pub use rsa::{RsaPrivateKey, RsaPublicKey};

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pkcs1v15Sign};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors that can occur during Wiretap cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key pair generation failed in the underlying primitive.
    #[error("Key generation failed")]
    KeyGeneration,

    /// Key material is malformed or cannot be encoded.
    #[error("Invalid key material")]
    InvalidKey,

    /// The signature blob cannot possibly be valid for the key
    /// (wrong length or empty). A well-formed signature that simply
    /// does not match is *not* an error; verification returns `false`.
    #[error("Malformed signature")]
    MalformedSignature,

    /// Plaintext exceeds the OAEP capacity of the recipient key.
    #[error("Payload too large for key: {len} bytes exceeds {max}")]
    PayloadTooLarge {
        /// Length of the rejected plaintext in bytes.
        len: usize,
        /// Maximum plaintext length for the key.
        max: usize,
    },

    /// RSA-OAEP encryption failed in the underlying primitive.
    #[error("Encryption failed")]
    EncryptionFailed,

    /// RSA-OAEP decryption failed (wrong key or corrupted ciphertext).
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Signing failed in the underlying primitive.
    #[error("Signing failed")]
    SigningFailed,

    /// No key material registered for the given identity.
    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),
}

/// Result type for Wiretap crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Default RSA modulus size for identity key pairs.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// OAEP-SHA256 padding overhead in bytes (2 * hash_len + 2).
const OAEP_OVERHEAD: usize = 2 * 32 + 2;

/// Generate an RSA key pair for a new identity.
///
/// # Arguments
/// * `bits` - Modulus size; [`DEFAULT_KEY_BITS`] for production use,
///   smaller sizes are accepted for fast tests.
pub fn generate_keypair(bits: usize) -> Result<(RsaPrivateKey, RsaPublicKey)> {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, bits).map_err(|e| {
        tracing::error!(bits, error = %e, "RSA key generation failed");
        CryptoError::KeyGeneration
    })?;
    let public_key = RsaPublicKey::from(&private_key);
    tracing::info!(bits, "generated RSA key pair");
    Ok((private_key, public_key))
}

/// Sign a message: SHA-256 digest, then PKCS#1 v1.5.
///
/// The scheme is deterministic, so re-signing identical plaintext
/// with the same key yields an identical signature.
pub fn sign(message: &[u8], signer_key: &RsaPrivateKey) -> Result<Vec<u8>> {
    let digest = Sha256::digest(message);
    signer_key
        .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|e| {
            tracing::error!(error = %e, "message signing failed");
            CryptoError::SigningFailed
        })
}

/// Verify a PKCS#1 v1.5 signature over a message.
///
/// Returns `Ok(false)` on mismatch; a failed check is a normal
/// outcome, not an error. Only a structurally impossible signature
/// (empty, or not the key's modulus size) raises
/// [`CryptoError::MalformedSignature`].
pub fn verify_signature(
    message: &[u8],
    signature: &[u8],
    signer_key: &RsaPublicKey,
) -> Result<bool> {
    if signature.is_empty() || signature.len() != signer_key.size() {
        return Err(CryptoError::MalformedSignature);
    }
    let digest = Sha256::digest(message);
    match signer_key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature) {
        Ok(()) => Ok(true),
        Err(_) => {
            tracing::warn!("signature verification failed");
            Ok(false)
        }
    }
}

/// Maximum plaintext length encryptable to the given key with
/// OAEP-SHA256 padding.
pub fn max_plaintext_len(recipient_key: &RsaPublicKey) -> usize {
    recipient_key.size().saturating_sub(OAEP_OVERHEAD)
}

/// Encrypt a message to the recipient's public key with RSA-OAEP.
///
/// The plaintext length is checked against the key's OAEP capacity
/// *before* the primitive runs; oversized payloads fail with
/// [`CryptoError::PayloadTooLarge`] rather than being truncated or
/// surfacing as an opaque primitive error.
pub fn encrypt(message: &[u8], recipient_key: &RsaPublicKey) -> Result<Vec<u8>> {
    let max = max_plaintext_len(recipient_key);
    if message.len() > max {
        return Err(CryptoError::PayloadTooLarge {
            len: message.len(),
            max,
        });
    }
    let mut rng = rand::thread_rng();
    recipient_key
        .encrypt(&mut rng, Oaep::new::<Sha256>(), message)
        .map_err(|e| {
            tracing::error!(error = %e, "OAEP encryption failed");
            CryptoError::EncryptionFailed
        })
}

/// Decrypt an RSA-OAEP ciphertext with the recipient's private key.
pub fn decrypt(ciphertext: &[u8], recipient_key: &RsaPrivateKey) -> Result<Vec<u8>> {
    recipient_key
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// PEM (SPKI) encoding of a public key, for the wire.
pub fn public_key_pem(key: &RsaPublicKey) -> Result<String> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|_| CryptoError::InvalidKey)
}

/// Parse a PEM (SPKI) public key.
pub fn public_key_from_pem(pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem).map_err(|_| CryptoError::InvalidKey)
}

/// PEM (PKCS#8) encoding of a private key. Handed back to the owning
/// client at registration; never logged or embedded in errors.
pub fn private_key_pem(key: &RsaPrivateKey) -> Result<String> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|_| CryptoError::InvalidKey)
}

/// Parse a PEM (PKCS#8) private key.
pub fn private_key_from_pem(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem).map_err(|_| CryptoError::InvalidKey)
}

/// SHA-256 content hash of raw message bytes, lowercase hex.
///
/// Used purely for integrity comparison of tamper-forwarded
/// messages; never for key derivation.
pub fn content_hash(message: &[u8]) -> String {
    hex::encode(Sha256::digest(message))
}
