// surety-crypto/src/lib.rs

//! Identity and hashing primitives for the flight surety workspace
//!
//! This crate provides:
//! - 20-byte account addresses with `0x` hex encoding
//! - 32-byte hashes
//! - Keccak-256 hashing, as used for flight keys and the operation log chain

pub mod address;
pub mod hash;

pub use address::Address;
pub use hash::{keccak_parts, Hash, Hashable};

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while decoding identities and hashes
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid hash")]
    InvalidHash,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}
