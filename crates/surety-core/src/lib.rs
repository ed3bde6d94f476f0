// surety-core/src/lib.rs

//! Shared value types for the flight surety state machines
//!
//! This crate provides:
//! - Arbitrary precision wei amounts
//! - Timestamps
//! - The policy constants shared by the airline registry and the insurance ledger

pub mod policy;
pub mod types;

pub use policy::PolicyConfig;
pub use types::*;

/// Result type for core value operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while building amounts or policies
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),
}
