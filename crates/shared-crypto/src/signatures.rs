//! # Ed25519 Signatures
//!
//! Verification for gossip event signatures plus a signing helper for tools
//! and tests. Verification takes the raw byte arrays carried in membership
//! views so callers never construct curve types themselves.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use shared_types::{PublicKey, Signature};

use crate::errors::CryptoError;

/// Verifies an Ed25519 signature over `message`.
///
/// Fails with `InvalidPublicKey` when the key bytes are not a valid curve
/// point and `SignatureVerificationFailed` when the signature does not match.
pub fn verify_event_signature(
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), CryptoError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key).map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature);
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}

/// Ed25519 keypair for producing event signatures.
///
/// Production nodes load key material from the operator's key store; this
/// type exists for local tooling and tests.
pub struct EventSigner {
    signing_key: SigningKey,
}

impl EventSigner {
    /// Generates a random keypair.
    #[must_use]
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Builds a keypair from a 32-byte seed. Deterministic, for tests.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        Self { signing_key }
    }

    /// The public half as raw bytes.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Signs `message`. Deterministic, no RNG involved.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message).to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_then_verify_round_trips() {
        let signer = EventSigner::from_seed([9u8; 32]);
        let message = b"event-id-bytes";
        let signature = signer.sign(message);
        assert!(verify_event_signature(&signer.public_key(), message, &signature).is_ok());
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let signer = EventSigner::from_seed([9u8; 32]);
        let other = EventSigner::from_seed([10u8; 32]);
        let signature = signer.sign(b"message");
        assert_eq!(
            verify_event_signature(&other.public_key(), b"message", &signature),
            Err(CryptoError::SignatureVerificationFailed)
        );
    }

    #[test]
    fn test_tampered_message_fails_verification() {
        let signer = EventSigner::generate();
        let signature = signer.sign(b"original");
        assert!(verify_event_signature(&signer.public_key(), b"tampered", &signature).is_err());
    }
}
