//! Crypto error types.

/// Errors from signature operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// Key bytes do not encode a valid curve point.
    #[error("invalid Ed25519 public key")]
    InvalidPublicKey,
    /// Signature does not verify against the key and message.
    #[error("signature verification failed")]
    SignatureVerificationFailed,
}
