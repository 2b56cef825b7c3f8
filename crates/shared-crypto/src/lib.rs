//! # Shared Crypto Crate
//!
//! Hashing and signature primitives behind one small surface so the rest of
//! the node never touches curve or digest internals directly. Key material
//! travels as the raw byte arrays defined in `shared-types`.

pub mod errors;
pub mod hashing;
pub mod signatures;

pub use errors::CryptoError;
pub use hashing::{salted_digest, sha256};
pub use signatures::{verify_event_signature, EventSigner};
