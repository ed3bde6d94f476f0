// flight-surety/src/lib.rs

//! Flight surety contract host
//!
//! This crate wires the airline registry, the insurance ledger and the oracle
//! desk into one contract facade and provides:
//! - Contract-owner controls (operational switch, authorized status reporters)
//! - A treasury tracking funds held by the contract
//! - A hash-chained operation log that rebuilds the state by replay
//! - An async service serializing access and paying out withdrawals
//! - The `flight-surety` command line tool

pub mod config;
pub mod contract;
pub mod oplog;
pub mod service;

pub use config::SuretyConfig;
pub use contract::{FlightSurety, OracleReport, SuretySummary};
pub use oplog::{LogEntry, Operation, OperationLog};
pub use service::{PayoutSink, SuretyService, TracingPayoutSink};

use airline_registry::RegistryError;
use insurance_ledger::LedgerError;
use surety_core::CoreError;

/// Result type for contract operations
pub type SuretyResult<T> = Result<T, SuretyError>;

/// Errors raised by the contract facade, its log and its service
#[derive(Debug, thiserror::Error)]
pub enum SuretyError {
    #[error("Contract is currently not operational")]
    NotOperational,

    #[error("Caller {0} is not the contract owner")]
    NotContractOwner(String),

    #[error("Caller {0} is not authorized to report flight statuses")]
    UnauthorizedCaller(String),

    #[error("Caller {caller} may not act for {expected}")]
    CallerMismatch { caller: String, expected: String },

    #[error("Treasury holds {available}, cannot pay {requested}")]
    InsufficientTreasury { requested: String, available: String },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Operation log corrupted: {0}")]
    LogCorrupted(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Payout transfer failed: {0}")]
    Payout(String),
}

impl From<bincode::Error> for SuretyError {
    fn from(e: bincode::Error) -> Self {
        SuretyError::Codec(e.to_string())
    }
}
