//! # Certificate Authority
//!
//! Issues and verifies certificates binding a registered identity to
//! its public key. The authority signs a canonical, versioned byte
//! encoding of the certificate fields; verification re-derives the
//! identical bytes and checks the signature, so the encoding must
//! stay byte-for-byte stable or every issued certificate becomes
//! unverifiable.
//!
//! This is a deliberately thin trust model for the demonstration:
//! one issuer, no chains, no revocation, and a fixed placeholder
//! validity date that nothing ever checks.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::{
    public_key_from_pem, public_key_pem, sign, verify_signature, CryptoError, Result,
    RsaPrivateKey, RsaPublicKey,
};

/// Version byte prefixed to the canonical signing encoding.
const CERT_ENCODING_VERSION: u8 = 1;

/// Placeholder validity date stamped into every certificate.
/// Nothing checks it; expiry is an explicit non-goal.
pub const VALIDITY_MARKER: &str = "2025-12-31";

/// An authority-signed binding of an identity to its public key.
///
/// The `signature` covers the canonical encoding of the other four
/// fields and is carried base64-encoded so the certificate can travel
/// as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Identity this certificate vouches for.
    pub subject_id: String,
    /// Subject's RSA public key, PEM (SPKI) encoded.
    pub subject_public_key_pem: String,
    /// Human-readable name of the issuing authority.
    pub issuer_name: String,
    /// Fixed placeholder validity date; never evaluated.
    pub validity_marker: String,
    /// Base64 PKCS#1 v1.5 signature by the authority.
    pub signature: String,
}

/// The canonical signing encoding: a version byte followed by each
/// field as a little-endian u16 length prefix plus UTF-8 bytes, in
/// fixed order (subject_id, public key PEM, issuer, validity).
///
/// Length prefixes make the encoding unambiguous: no concatenation
/// of different field values can collide.
fn canonical_bytes(
    subject_id: &str,
    subject_public_key_pem: &str,
    issuer_name: &str,
    validity_marker: &str,
) -> Result<Vec<u8>> {
    let fields = [
        subject_id.as_bytes(),
        subject_public_key_pem.as_bytes(),
        issuer_name.as_bytes(),
        validity_marker.as_bytes(),
    ];

    let mut buffer = Vec::with_capacity(1 + fields.iter().map(|f| 2 + f.len()).sum::<usize>());
    buffer.push(CERT_ENCODING_VERSION);
    for field in fields {
        let len = u16::try_from(field.len()).map_err(|_| CryptoError::InvalidKey)?;
        buffer.extend_from_slice(&len.to_le_bytes());
        buffer.extend_from_slice(field);
    }
    Ok(buffer)
}

/// Issues certificates with its own root RSA key pair, generated at
/// construction (the demo server builds one authority at boot).
pub struct CertificateAuthority {
    issuer_name: String,
    signing_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl CertificateAuthority {
    /// Create an authority with a freshly generated root key pair of
    /// [`crate::DEFAULT_KEY_BITS`].
    pub fn new(issuer_name: &str) -> Result<Self> {
        Self::with_key_bits(issuer_name, crate::DEFAULT_KEY_BITS)
    }

    /// Create an authority with an explicit root key size.
    pub fn with_key_bits(issuer_name: &str, bits: usize) -> Result<Self> {
        let (signing_key, public_key) = crate::generate_keypair(bits)?;
        tracing::info!(issuer = issuer_name, "certificate authority initialized");
        Ok(Self {
            issuer_name: issuer_name.to_owned(),
            signing_key,
            public_key,
        })
    }

    /// The authority's public key, distributed to clients so they can
    /// verify certificates themselves.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Issue a certificate for a subject's public key.
    ///
    /// Cannot be rejected for policy reasons in this design; it fails
    /// only if key encoding or the signing primitive fails.
    pub fn issue(&self, subject_id: &str, subject_key: &RsaPublicKey) -> Result<Certificate> {
        let pem = public_key_pem(subject_key)?;

        let bytes = canonical_bytes(subject_id, &pem, &self.issuer_name, VALIDITY_MARKER)?;
        let signature = sign(&bytes, &self.signing_key)?;

        tracing::info!(subject = subject_id, "issued certificate");
        Ok(Certificate {
            subject_id: subject_id.to_owned(),
            subject_public_key_pem: pem,
            issuer_name: self.issuer_name.clone(),
            validity_marker: VALIDITY_MARKER.to_owned(),
            signature: BASE64.encode(signature),
        })
    }

    /// Verify a certificate against an authority public key.
    ///
    /// A failed check is a normal outcome: mismatched signatures,
    /// undecodable fields, and structural defects all return `false`
    /// (with a warning logged), never an error.
    pub fn verify(certificate: &Certificate, authority_key: &RsaPublicKey) -> bool {
        let signature = match BASE64.decode(&certificate.signature) {
            Ok(sig) => sig,
            Err(_) => {
                tracing::warn!(
                    subject = %certificate.subject_id,
                    "certificate signature is not valid base64"
                );
                return false;
            }
        };

        // The embedded key must at least parse; a certificate over
        // garbage key material vouches for nothing.
        if public_key_from_pem(&certificate.subject_public_key_pem).is_err() {
            tracing::warn!(
                subject = %certificate.subject_id,
                "certificate carries an undecodable public key"
            );
            return false;
        }

        let bytes = match canonical_bytes(
            &certificate.subject_id,
            &certificate.subject_public_key_pem,
            &certificate.issuer_name,
            &certificate.validity_marker,
        ) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        match verify_signature(&bytes, &signature, authority_key) {
            Ok(true) => {
                tracing::info!(subject = %certificate.subject_id, "certificate verified");
                true
            }
            Ok(false) | Err(_) => {
                tracing::warn!(
                    subject = %certificate.subject_id,
                    "certificate failed verification"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_keypair;

    const TEST_BITS: usize = 1024;

    fn test_authority() -> CertificateAuthority {
        CertificateAuthority::with_key_bits("Wiretap Demo Authority", TEST_BITS)
            .expect("authority init failed")
    }

    #[test]
    fn test_issue_verify_roundtrip() {
        let ca = test_authority();
        let (_, alice_pk) = generate_keypair(TEST_BITS).expect("keygen failed");

        let cert = ca.issue("alice", &alice_pk).expect("issue failed");

        assert_eq!(cert.subject_id, "alice");
        assert_eq!(cert.validity_marker, VALIDITY_MARKER);
        assert!(CertificateAuthority::verify(&cert, ca.public_key()));
    }

    #[test]
    fn test_wrong_authority_key_rejects() {
        let ca = test_authority();
        let rogue = test_authority();
        let (_, pk) = generate_keypair(TEST_BITS).expect("keygen failed");

        let cert = ca.issue("alice", &pk).expect("issue failed");

        assert!(!CertificateAuthority::verify(&cert, rogue.public_key()));
    }

    #[test]
    fn test_any_field_mutation_rejects() {
        let ca = test_authority();
        let (_, pk) = generate_keypair(TEST_BITS).expect("keygen failed");
        let cert = ca.issue("alice", &pk).expect("issue failed");

        let mut renamed = cert.clone();
        renamed.subject_id = "mallory".into();
        assert!(!CertificateAuthority::verify(&renamed, ca.public_key()));

        let mut reissued = cert.clone();
        reissued.issuer_name = "Shady Authority".into();
        assert!(!CertificateAuthority::verify(&reissued, ca.public_key()));

        let mut extended = cert;
        extended.validity_marker = "2099-12-31".into();
        assert!(!CertificateAuthority::verify(&extended, ca.public_key()));
    }

    #[test]
    fn test_substituted_key_rejects() {
        let ca = test_authority();
        let (_, alice_pk) = generate_keypair(TEST_BITS).expect("keygen failed");
        let (_, mallory_pk) = generate_keypair(TEST_BITS).expect("keygen failed");

        let mut cert = ca.issue("alice", &alice_pk).expect("issue failed");
        cert.subject_public_key_pem = public_key_pem(&mallory_pk).expect("pem encoding failed");

        assert!(!CertificateAuthority::verify(&cert, ca.public_key()));
    }

    #[test]
    fn test_structural_defects_return_false_not_error() {
        let ca = test_authority();
        let (_, pk) = generate_keypair(TEST_BITS).expect("keygen failed");
        let cert = ca.issue("alice", &pk).expect("issue failed");

        let mut garbled_sig = cert.clone();
        garbled_sig.signature = "not!!base64##".into();
        assert!(!CertificateAuthority::verify(&garbled_sig, ca.public_key()));

        let mut truncated_sig = cert.clone();
        truncated_sig.signature = BASE64.encode([1u8, 2, 3]);
        assert!(!CertificateAuthority::verify(
            &truncated_sig,
            ca.public_key()
        ));

        let mut bad_key = cert;
        bad_key.subject_public_key_pem = "-----BEGIN PUBLIC KEY-----\ngarbage\n".into();
        assert!(!CertificateAuthority::verify(&bad_key, ca.public_key()));
    }

    #[test]
    fn test_canonical_encoding_is_deterministic() {
        let ca = test_authority();
        let (_, pk) = generate_keypair(TEST_BITS).expect("keygen failed");

        // PKCS#1 v1.5 is deterministic, so identical inputs must
        // produce identical certificates. If this breaks, the
        // canonical encoding drifted between issue and verify.
        let cert1 = ca.issue("alice", &pk).expect("issue failed");
        let cert2 = ca.issue("alice", &pk).expect("issue failed");
        assert_eq!(cert1, cert2);
    }

    #[test]
    fn test_canonical_bytes_length_prefixing_is_unambiguous() {
        // "ab" + "c" and "a" + "bc" must encode differently.
        let b1 = canonical_bytes("ab", "c", "x", "y").expect("encoding failed");
        let b2 = canonical_bytes("a", "bc", "x", "y").expect("encoding failed");
        assert_ne!(b1, b2);
    }
}
