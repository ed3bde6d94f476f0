// flight-surety/src/oplog.rs
use crate::{SuretyError, SuretyResult};
use chrono::{DateTime, Utc};
use insurance_ledger::{FlightKey, FlightStatus, Payout};
use serde::{Deserialize, Serialize};
use std::path::Path;
use surety_core::Amount;
use surety_crypto::{Address, Hash, Hashable};

/// A committed contract mutation
///
/// Variants carry every outcome that was drawn at random so that replaying
/// the log reproduces the same state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    SetOperatingStatus { caller: Address, mode: bool },
    AuthorizeCaller { caller: Address, address: Address },
    DeauthorizeCaller { caller: Address, address: Address },
    AddAirline { caller: Address, candidate: Address },
    FundAirline { caller: Address, airline: Address, amount: Amount },
    Vote { voter: Address, candidate: Address },
    RegisterAirline { caller: Address, candidate: Address },
    RegisterFlight { caller: Address, flight: FlightKey },
    Buy { passenger: Address, flight: FlightKey, premium: Amount },
    ProcessFlightStatus { caller: Address, flight: FlightKey, status: FlightStatus },
    Withdraw { passenger: Address },
    /// Credits restored after a failed transfer
    ReinstatePayout { payout: Payout },
    RegisterOracle { oracle: Address, fee: Amount, indexes: Vec<u8> },
    FetchFlightStatus { requester: Address, flight: FlightKey, index: u8 },
    SubmitOracleResponse { oracle: Address, index: u8, flight: FlightKey, status: FlightStatus },
}

impl Operation {
    /// Short name for log output
    pub fn name(&self) -> &'static str {
        match self {
            Operation::SetOperatingStatus { .. } => "set_operating_status",
            Operation::AuthorizeCaller { .. } => "authorize_caller",
            Operation::DeauthorizeCaller { .. } => "deauthorize_caller",
            Operation::AddAirline { .. } => "add_airline",
            Operation::FundAirline { .. } => "fund_airline",
            Operation::Vote { .. } => "vote",
            Operation::RegisterAirline { .. } => "register_airline",
            Operation::RegisterFlight { .. } => "register_flight",
            Operation::Buy { .. } => "buy",
            Operation::ProcessFlightStatus { .. } => "process_flight_status",
            Operation::Withdraw { .. } => "withdraw",
            Operation::ReinstatePayout { .. } => "reinstate_payout",
            Operation::RegisterOracle { .. } => "register_oracle",
            Operation::FetchFlightStatus { .. } => "fetch_flight_status",
            Operation::SubmitOracleResponse { .. } => "submit_oracle_response",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub sequence: u64,
    /// Wall-clock time of the commit; not part of the hash
    pub recorded_at: DateTime<Utc>,
    pub operation: Operation,
    pub prev_hash: Hash,
    pub hash: Hash,
}

impl LogEntry {
    /// keccak256(prev_hash ‖ bincode(operation) ‖ sequence_be)
    pub fn compute_hash(sequence: u64, prev_hash: &Hash, operation: &Operation) -> SuretyResult<Hash> {
        let payload = bincode::serialize(operation)?;

        let mut preimage = Vec::with_capacity(prev_hash.as_bytes().len() + payload.len() + 8);
        preimage.extend_from_slice(prev_hash.as_bytes());
        preimage.extend_from_slice(&payload);
        preimage.extend_from_slice(&sequence.to_be_bytes());
        Ok(preimage.hash())
    }
}

/// Append-only, hash-chained record of committed operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationLog {
    entries: Vec<LogEntry>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Hash of the last entry, zero for an empty log
    pub fn head_hash(&self) -> Hash {
        self.entries.last().map(|e| e.hash).unwrap_or_else(Hash::zero)
    }

    /// Chain `operation` onto the log
    pub fn append(&mut self, operation: Operation) -> SuretyResult<&LogEntry> {
        let sequence = self.entries.len() as u64;
        let prev_hash = self.head_hash();
        let hash = LogEntry::compute_hash(sequence, &prev_hash, &operation)?;

        self.entries.push(LogEntry {
            sequence,
            recorded_at: Utc::now(),
            operation,
            prev_hash,
            hash,
        });

        let index = self.entries.len() - 1;
        Ok(&self.entries[index])
    }

    /// Check sequence numbers and every link of the hash chain
    pub fn verify(&self) -> SuretyResult<()> {
        let mut prev_hash = Hash::zero();

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.sequence != i as u64 {
                return Err(SuretyError::LogCorrupted(format!(
                    "entry {} carries sequence {}",
                    i, entry.sequence
                )));
            }
            if entry.prev_hash != prev_hash {
                return Err(SuretyError::LogCorrupted(format!(
                    "entry {} does not link to its predecessor",
                    i
                )));
            }

            let expected = LogEntry::compute_hash(entry.sequence, &entry.prev_hash, &entry.operation)?;
            if entry.hash != expected {
                return Err(SuretyError::LogCorrupted(format!(
                    "entry {} ({}) hash mismatch",
                    i,
                    entry.operation.name()
                )));
            }

            prev_hash = entry.hash;
        }

        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> SuretyResult<()> {
        let bytes = bincode::serialize(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Load and verify a log file
    pub fn load(path: impl AsRef<Path>) -> SuretyResult<Self> {
        let bytes = std::fs::read(path)?;
        let log: Self = bincode::deserialize(&bytes)?;
        log.verify()?;
        Ok(log)
    }

    /// Load a log file, or start an empty log if the file does not exist yet
    pub fn load_or_new(path: impl AsRef<Path>) -> SuretyResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Direct access for tamper tests
    #[cfg(test)]
    pub(crate) fn entries_mut(&mut self) -> &mut Vec<LogEntry> {
        &mut self.entries
    }
}
