// insurance-ledger/src/flight.rs

use crate::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use surety_core::Timestamp;
use surety_crypto::{keccak_parts, Address, Hash};

/// Flight status as reported by oracles, with the on-chain status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlightStatus {
    Unknown,
    OnTime,
    /// Delay caused by the airline: the only status that pays out
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl FlightStatus {
    pub const ALL: [FlightStatus; 6] = [
        FlightStatus::Unknown,
        FlightStatus::OnTime,
        FlightStatus::LateAirline,
        FlightStatus::LateWeather,
        FlightStatus::LateTechnical,
        FlightStatus::LateOther,
    ];

    /// Numeric status code (0, 10, 20, 30, 40, 50)
    pub fn code(&self) -> u8 {
        match self {
            FlightStatus::Unknown => 0,
            FlightStatus::OnTime => 10,
            FlightStatus::LateAirline => 20,
            FlightStatus::LateWeather => 30,
            FlightStatus::LateTechnical => 40,
            FlightStatus::LateOther => 50,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Whether this status is final
    pub fn is_settled(&self) -> bool {
        !matches!(self, FlightStatus::Unknown)
    }

    pub fn pays_out(&self) -> bool {
        matches!(self, FlightStatus::LateAirline)
    }

    fn name(&self) -> &'static str {
        match self {
            FlightStatus::Unknown => "unknown",
            FlightStatus::OnTime => "on-time",
            FlightStatus::LateAirline => "late-airline",
            FlightStatus::LateWeather => "late-weather",
            FlightStatus::LateTechnical => "late-technical",
            FlightStatus::LateOther => "late-other",
        }
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Accepts either a status name (`late-airline`) or its code (`20`)
impl FromStr for FlightStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code).ok_or_else(|| LedgerError::InvalidStatus(s.into()));
        }
        let normalized = s.to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|status| status.name() == normalized)
            .ok_or_else(|| LedgerError::InvalidStatus(s.into()))
    }
}

impl TryFrom<u8> for FlightStatus {
    type Error = LedgerError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| LedgerError::InvalidStatus(code.to_string()))
    }
}

/// Identity of a scheduled flight
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightKey {
    /// Operating airline
    pub airline: Address,
    /// Flight designator, e.g. `ND1309`
    pub designator: String,
    /// Scheduled departure
    pub timestamp: Timestamp,
}

impl FlightKey {
    pub fn new(airline: Address, designator: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            airline,
            designator: designator.into(),
            timestamp,
        }
    }

    /// `keccak256(airline ‖ designator ‖ uint256(timestamp))`
    pub fn id(&self) -> Hash {
        let mut timestamp = [0u8; 32];
        timestamp[24..].copy_from_slice(&self.timestamp.to_be_bytes());
        keccak_parts(&[
            self.airline.as_bytes().as_slice(),
            self.designator.as_bytes(),
            timestamp.as_slice(),
        ])
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.designator, self.timestamp, self.airline)
    }
}

/// A registered flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub key: FlightKey,
    pub status: FlightStatus,
}

impl Flight {
    pub fn new(key: FlightKey) -> Self {
        Self {
            key,
            status: FlightStatus::Unknown,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status.is_settled()
    }
}
