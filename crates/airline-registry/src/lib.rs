// airline-registry/src/lib.rs

//! Airline membership and multi-party admission
//!
//! This crate implements airline onboarding where:
//! - Airlines are added as pending candidates
//! - Airlines stake funds and become funded once the minimum is reached
//! - The first airlines are admitted unconditionally (bootstrap phase)
//! - Later candidates need votes from half of the registered airlines

pub mod airline;
pub mod registry;
pub mod voting;

pub use airline::{Airline, AirlineStatus};
pub use registry::AirlineRegistry;
pub use voting::{RegistrationOutcome, Tally};

use surety_core::CoreError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Rejections raised by the airline registry
///
/// Every variant leaves the registry untouched. A candidate still waiting for
/// votes is reported through [`RegistrationOutcome::Pending`], not as an error.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Airline {0} is not funded and registered")]
    NotFunded(String),

    #[error("Airline {0} is not eligible to vote")]
    NotEligibleVoter(String),

    #[error("Caller {caller} may not act for airline {airline}")]
    InsufficientCaller { caller: String, airline: String },

    #[error("Airline not found: {0}")]
    UnknownAirline(String),

    #[error("Policy error: {0}")]
    Policy(#[from] CoreError),
}
