// insurance-ledger/src/lib.rs

//! Flight insurance escrow and payout
//!
//! This crate provides:
//! - Flight registration gated on airline eligibility
//! - Passenger policies with a capped premium
//! - Payout credits on late-airline delays, settled once per flight
//! - Withdrawal of accumulated credits
//! - The oracle desk that agrees on flight statuses

pub mod flight;
pub mod ledger;
pub mod oracle;
pub mod policy;

pub use flight::{Flight, FlightKey, FlightStatus};
pub use ledger::{AirlineEligibility, InsuranceLedger, StatusOutcome};
pub use oracle::{OracleConfig, OracleDesk, OracleRequest, ResponseOutcome};
pub use policy::{InsurancePolicy, Payout, PayoutClaim};

use surety_core::CoreError;

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Rejections raised by the insurance ledger and the oracle desk
///
/// Every variant leaves the ledger untouched.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Airline {0} is not funded and registered")]
    AirlineNotEligible(String),

    #[error("Flight not found: {0}")]
    FlightNotFound(String),

    #[error("Premium {premium} exceeds cap {cap}")]
    PremiumExceedsCap { premium: String, cap: String },

    #[error("Premium must be positive")]
    ZeroPremium,

    #[error("Flight {0} already has a final status")]
    FlightAlreadySettled(String),

    #[error("No payout credit for passenger {0}")]
    NoCredit(String),

    #[error("Payout cannot be reinstated: {0}")]
    ReinstateMismatch(String),

    #[error("Invalid flight status: {0}")]
    InvalidStatus(String),

    #[error("Oracle fee {fee} below registration fee {required}")]
    OracleFeeTooLow { fee: String, required: String },

    #[error("Oracle already registered: {0}")]
    OracleAlreadyRegistered(String),

    #[error("Oracle not found: {0}")]
    UnknownOracle(String),

    #[error("Oracle {oracle} does not hold index {index}")]
    IndexMismatch { oracle: String, index: u8 },

    #[error("No open request for index {index} on flight {flight}")]
    RequestNotOpen { index: u8, flight: String },

    #[error("Invalid oracle configuration: {0}")]
    InvalidOracleConfig(String),

    #[error("Policy error: {0}")]
    Policy(#[from] CoreError),
}
