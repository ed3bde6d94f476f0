// insurance-ledger/src/oracle.rs

use crate::{
    flight::{FlightKey, FlightStatus},
    LedgerError, LedgerResult,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use surety_core::Amount;
use surety_crypto::{Address, Hash};

/// Configuration for the oracle desk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Fee an oracle pays to register (e.g., 1 ether)
    pub registration_fee: Amount,
    /// Matching responses needed to accept a status
    pub min_responses: usize,
    /// Indexes are drawn from `0..index_space`
    pub index_space: u8,
    /// Distinct indexes assigned to every oracle
    pub indexes_per_oracle: usize,
    /// Fixed RNG seed for deterministic in-process runs (tests); fresh entropy when absent.
    /// Not accepted from configuration files, where each run restarts the RNG.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            registration_fee: Amount::from_ether(1),
            min_responses: 3,
            index_space: 10,
            indexes_per_oracle: 3,
            seed: None,
        }
    }
}

impl OracleConfig {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.min_responses == 0 {
            return Err(LedgerError::InvalidOracleConfig("min_responses must be positive".into()));
        }
        if self.indexes_per_oracle == 0 || self.indexes_per_oracle > self.index_space as usize {
            return Err(LedgerError::InvalidOracleConfig(format!(
                "cannot draw {} distinct indexes from {}",
                self.indexes_per_oracle, self.index_space
            )));
        }
        Ok(())
    }
}

/// Outstanding request for a flight status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleRequest {
    /// Who asked for the status
    pub requester: Address,
    pub flight: FlightKey,
    /// Only oracles holding this index may answer
    pub index: u8,
    /// Closed once enough oracles agree
    pub is_open: bool,
    /// Responding oracles grouped by reported status
    pub responses: BTreeMap<FlightStatus, BTreeSet<Address>>,
}

impl OracleRequest {
    fn new(requester: Address, flight: FlightKey, index: u8) -> Self {
        Self {
            requester,
            flight,
            index,
            is_open: true,
            responses: BTreeMap::new(),
        }
    }

    fn has_responded(&self, oracle: &Address) -> bool {
        self.responses.values().any(|voters| voters.contains(oracle))
    }
}

/// Result of an accepted oracle response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseOutcome {
    /// Counted; not enough matching responses yet
    Recorded { status: FlightStatus, responses: usize },
    /// This response completed the quorum; the request is closed
    Agreed { status: FlightStatus },
    /// The oracle had already answered this request
    Duplicate,
}

/// Oracle registration and status request bookkeeping
#[derive(Debug, Clone)]
pub struct OracleDesk {
    config: OracleConfig,
    rng: StdRng,
    /// Assigned indexes per oracle
    oracles: HashMap<Address, Vec<u8>>,
    /// Requests keyed by index and flight id
    requests: HashMap<(u8, Hash), OracleRequest>,
}

impl OracleDesk {
    pub fn new(config: OracleConfig) -> LedgerResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            rng,
            oracles: HashMap::new(),
            requests: HashMap::new(),
        })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    pub fn oracle_indexes(&self, oracle: &Address) -> LedgerResult<&[u8]> {
        self.oracles
            .get(oracle)
            .map(Vec::as_slice)
            .ok_or_else(|| LedgerError::UnknownOracle(oracle.to_hex()))
    }

    pub fn request(&self, index: u8, flight: &FlightKey) -> Option<&OracleRequest> {
        self.requests.get(&(index, flight.id()))
    }

    /// Register an oracle with freshly drawn indexes
    pub fn register_oracle(&mut self, oracle: Address, fee: &Amount) -> LedgerResult<Vec<u8>> {
        self.check_registration(&oracle, fee)?;

        let indexes: Vec<u8> = rand::seq::index::sample(
            &mut self.rng,
            self.config.index_space as usize,
            self.config.indexes_per_oracle,
        )
        .into_iter()
        .map(|i| i as u8)
        .collect();

        self.register_oracle_with(oracle, fee, indexes.clone())?;
        Ok(indexes)
    }

    /// Register an oracle with known indexes (used when replaying)
    pub fn register_oracle_with(
        &mut self,
        oracle: Address,
        fee: &Amount,
        indexes: Vec<u8>,
    ) -> LedgerResult<()> {
        self.check_registration(&oracle, fee)?;

        let distinct: BTreeSet<u8> = indexes.iter().copied().collect();
        if indexes.len() != self.config.indexes_per_oracle
            || distinct.len() != indexes.len()
            || indexes.iter().any(|i| *i >= self.config.index_space)
        {
            return Err(LedgerError::InvalidOracleConfig(format!(
                "invalid index assignment {:?}",
                indexes
            )));
        }

        self.oracles.insert(oracle, indexes);
        Ok(())
    }

    fn check_registration(&self, oracle: &Address, fee: &Amount) -> LedgerResult<()> {
        if self.oracles.contains_key(oracle) {
            return Err(LedgerError::OracleAlreadyRegistered(oracle.to_hex()));
        }
        if *fee < self.config.registration_fee {
            return Err(LedgerError::OracleFeeTooLow {
                fee: fee.to_ether_string(),
                required: self.config.registration_fee.to_ether_string(),
            });
        }
        Ok(())
    }

    /// Open a status request on a random index. Returns the index.
    pub fn fetch_flight_status(&mut self, requester: Address, flight: FlightKey) -> LedgerResult<u8> {
        let index = self.rng.gen_range(0..self.config.index_space);
        self.open_request(requester, flight, index)?;
        Ok(index)
    }

    /// Open a status request on a known index, replacing any earlier request
    pub fn open_request(&mut self, requester: Address, flight: FlightKey, index: u8) -> LedgerResult<()> {
        if index >= self.config.index_space {
            return Err(LedgerError::InvalidOracleConfig(format!(
                "index {} outside 0..{}",
                index, self.config.index_space
            )));
        }

        let key = (index, flight.id());
        self.requests.insert(key, OracleRequest::new(requester, flight, index));
        Ok(())
    }

    /// Record an oracle's answer to an open request
    pub fn submit_response(
        &mut self,
        oracle: &Address,
        index: u8,
        flight: &FlightKey,
        status: FlightStatus,
    ) -> LedgerResult<ResponseOutcome> {
        if !self.oracle_indexes(oracle)?.contains(&index) {
            return Err(LedgerError::IndexMismatch {
                oracle: oracle.to_hex(),
                index,
            });
        }

        let request = self.requests
            .get_mut(&(index, flight.id()))
            .filter(|r| r.is_open)
            .ok_or_else(|| LedgerError::RequestNotOpen {
                index,
                flight: flight.to_string(),
            })?;

        if request.has_responded(oracle) {
            return Ok(ResponseOutcome::Duplicate);
        }

        let voters = request.responses.entry(status).or_default();
        voters.insert(*oracle);
        let responses = voters.len();

        if responses >= self.config.min_responses {
            request.is_open = false;
            return Ok(ResponseOutcome::Agreed { status });
        }

        Ok(ResponseOutcome::Recorded { status, responses })
    }
}
