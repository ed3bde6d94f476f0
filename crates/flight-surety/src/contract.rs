// flight-surety/src/contract.rs
use crate::{
    oplog::{Operation, OperationLog},
    SuretyConfig, SuretyError, SuretyResult,
};
use airline_registry::{Airline, AirlineRegistry, RegistrationOutcome};
use insurance_ledger::{
    Flight, FlightKey, FlightStatus, InsuranceLedger, LedgerError, OracleDesk, Payout,
    ResponseOutcome, StatusOutcome,
};
use serde::Serialize;
use std::collections::BTreeSet;
use surety_core::Amount;
use surety_crypto::{Address, Hash};

/// Result of an oracle response, including the settlement it triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OracleReport {
    pub response: ResponseOutcome,
    /// Present when this response completed the quorum
    pub settlement: Option<StatusOutcome>,
}

/// Point-in-time view of the contract, used for status output
#[derive(Debug, Clone, Serialize)]
pub struct SuretySummary {
    pub operational: bool,
    pub owner: Address,
    pub treasury: Amount,
    pub registered_airlines: usize,
    pub required_votes: usize,
    pub airlines: Vec<Airline>,
    pub flights: Vec<Flight>,
    pub authorized_callers: Vec<Address>,
    pub oracle_count: usize,
    pub log_length: usize,
    pub head_hash: Hash,
}

/// Contract facade over the registry, the ledger and the oracle desk
///
/// Every method either commits completely and appends one log entry, or
/// returns an error and leaves the state untouched.
#[derive(Debug, Clone)]
pub struct FlightSurety {
    config: SuretyConfig,
    operational: bool,
    /// Callers allowed to report flight statuses besides the owner
    authorized: BTreeSet<Address>,
    registry: AirlineRegistry,
    ledger: InsuranceLedger,
    oracles: OracleDesk,
    /// Funds held by the contract
    treasury: Amount,
    log: OperationLog,
}

impl FlightSurety {
    pub fn new(config: SuretyConfig) -> SuretyResult<Self> {
        config.validate()?;

        let registry = AirlineRegistry::new(config.policy.clone(), config.first_airline)?;
        let ledger = InsuranceLedger::new(config.policy.clone())?;
        let oracles = OracleDesk::new(config.oracle.clone())?;

        tracing::debug!(
            "Contract deployed: owner={}, first_airline={}",
            config.owner,
            config.first_airline
        );

        Ok(Self {
            config,
            operational: true,
            authorized: BTreeSet::new(),
            registry,
            ledger,
            oracles,
            treasury: Amount::zero(),
            log: OperationLog::new(),
        })
    }

    /// Rebuild a contract by re-applying every entry of a verified log
    pub fn replay(config: SuretyConfig, log: OperationLog) -> SuretyResult<Self> {
        log.verify()?;

        let mut surety = Self::new(config)?;
        for entry in log.entries() {
            surety.apply(entry.operation.clone()).map_err(|e| {
                SuretyError::LogCorrupted(format!(
                    "entry {} ({}) failed to replay: {}",
                    entry.sequence,
                    entry.operation.name(),
                    e
                ))
            })?;
        }

        if surety.log.head_hash() != log.head_hash() {
            return Err(SuretyError::LogCorrupted("replayed chain diverged".into()));
        }

        tracing::info!("Replayed {} operations", log.len());

        // Keep the logged commit times
        surety.log = log;
        Ok(surety)
    }

    /// Dispatch a logged operation
    pub fn apply(&mut self, operation: Operation) -> SuretyResult<()> {
        match operation {
            Operation::SetOperatingStatus { caller, mode } => {
                self.set_operating_status(&caller, mode)?;
            }
            Operation::AuthorizeCaller { caller, address } => {
                self.authorize_caller(&caller, address)?;
            }
            Operation::DeauthorizeCaller { caller, address } => {
                self.deauthorize_caller(&caller, &address)?;
            }
            Operation::AddAirline { caller, candidate } => {
                self.add_airline(&caller, candidate)?;
            }
            Operation::FundAirline { caller, airline, amount } => {
                self.fund_airline(&caller, &airline, amount)?;
            }
            Operation::Vote { voter, candidate } => {
                self.vote(&voter, &candidate)?;
            }
            Operation::RegisterAirline { caller, candidate } => {
                self.register_airline(&caller, &candidate)?;
            }
            Operation::RegisterFlight { caller, flight } => {
                self.register_flight(&caller, flight)?;
            }
            Operation::Buy { passenger, flight, premium } => {
                self.buy(&passenger, &flight, premium)?;
            }
            Operation::ProcessFlightStatus { caller, flight, status } => {
                self.process_flight_status(&caller, &flight, status)?;
            }
            Operation::Withdraw { passenger } => {
                self.withdraw(&passenger)?;
            }
            Operation::ReinstatePayout { payout } => {
                self.reinstate_payout(&payout)?;
            }
            Operation::RegisterOracle { oracle, fee, indexes } => {
                self.register_oracle_with(oracle, fee, indexes)?;
            }
            Operation::FetchFlightStatus { requester, flight, index } => {
                self.fetch_flight_status_at(requester, flight, index)?;
            }
            Operation::SubmitOracleResponse { oracle, index, flight, status } => {
                self.submit_oracle_response(&oracle, index, &flight, status)?;
            }
        }
        Ok(())
    }

    // ---- queries ----

    pub fn config(&self) -> &SuretyConfig {
        &self.config
    }

    pub fn owner(&self) -> &Address {
        &self.config.owner
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn is_authorized(&self, caller: &Address) -> bool {
        *caller == self.config.owner || self.authorized.contains(caller)
    }

    pub fn registry(&self) -> &AirlineRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &InsuranceLedger {
        &self.ledger
    }

    pub fn oracles(&self) -> &OracleDesk {
        &self.oracles
    }

    pub fn treasury(&self) -> &Amount {
        &self.treasury
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    pub fn summary(&self) -> SuretySummary {
        let mut flights: Vec<Flight> = self.ledger.flights().cloned().collect();
        flights.sort_by(|a, b| a.key.cmp(&b.key));

        SuretySummary {
            operational: self.operational,
            owner: self.config.owner,
            treasury: self.treasury.clone(),
            registered_airlines: self.registry.registered_count(),
            required_votes: self.registry.required_votes(),
            airlines: self.registry.airlines().cloned().collect(),
            flights,
            authorized_callers: self.authorized.iter().copied().collect(),
            oracle_count: self.oracles.oracle_count(),
            log_length: self.log.len(),
            head_hash: self.log.head_hash(),
        }
    }

    // ---- guards ----

    fn require_operational(&self) -> SuretyResult<()> {
        if !self.operational {
            return Err(SuretyError::NotOperational);
        }
        Ok(())
    }

    fn require_owner(&self, caller: &Address) -> SuretyResult<()> {
        if *caller != self.config.owner {
            return Err(SuretyError::NotContractOwner(caller.to_hex()));
        }
        Ok(())
    }

    fn require_caller(caller: &Address, expected: &Address) -> SuretyResult<()> {
        if caller != expected {
            return Err(SuretyError::CallerMismatch {
                caller: caller.to_hex(),
                expected: expected.to_hex(),
            });
        }
        Ok(())
    }

    fn record(&mut self, operation: Operation) -> SuretyResult<()> {
        let entry = self.log.append(operation)?;
        tracing::debug!(
            "Logged #{} {} ({})",
            entry.sequence,
            entry.operation.name(),
            entry.hash
        );
        Ok(())
    }

    // ---- contract owner ----

    /// Pause or resume the contract. Allowed while paused.
    pub fn set_operating_status(&mut self, caller: &Address, mode: bool) -> SuretyResult<()> {
        self.require_owner(caller)?;

        self.operational = mode;
        self.record(Operation::SetOperatingStatus { caller: *caller, mode })?;

        tracing::info!("Operating status set to {}", mode);
        Ok(())
    }

    pub fn authorize_caller(&mut self, caller: &Address, address: Address) -> SuretyResult<()> {
        self.require_owner(caller)?;

        self.authorized.insert(address);
        self.record(Operation::AuthorizeCaller { caller: *caller, address })?;

        tracing::info!("Authorized status reporter {}", address);
        Ok(())
    }

    pub fn deauthorize_caller(&mut self, caller: &Address, address: &Address) -> SuretyResult<()> {
        self.require_owner(caller)?;

        self.authorized.remove(address);
        self.record(Operation::DeauthorizeCaller { caller: *caller, address: *address })?;

        tracing::info!("Deauthorized status reporter {}", address);
        Ok(())
    }

    // ---- airlines ----

    /// Add a pending airline. Returns `false` if it already existed.
    pub fn add_airline(&mut self, caller: &Address, candidate: Address) -> SuretyResult<bool> {
        self.require_operational()?;

        let added = self.registry.add_airline(candidate);
        self.record(Operation::AddAirline { caller: *caller, candidate })?;

        if added {
            tracing::info!("Airline {} added as candidate", candidate);
        }
        Ok(added)
    }

    /// Stake funds for an airline. Returns `true` when the airline became funded.
    pub fn fund_airline(&mut self, caller: &Address, airline: &Address, amount: Amount) -> SuretyResult<bool> {
        self.require_operational()?;

        let funded = self.registry.fund(caller, airline, &amount)?;
        self.treasury = &self.treasury + &amount;
        self.record(Operation::FundAirline {
            caller: *caller,
            airline: *airline,
            amount: amount.clone(),
        })?;

        tracing::info!("Airline {} staked {} ether", airline, amount.to_ether_string());
        if funded {
            tracing::info!("✓ Airline {} reached the funding minimum", airline);
        }
        Ok(funded)
    }

    pub fn vote(&mut self, voter: &Address, candidate: &Address) -> SuretyResult<usize> {
        self.require_operational()?;

        let votes = self.registry.vote(voter, candidate)?;
        self.record(Operation::Vote { voter: *voter, candidate: *candidate })?;

        tracing::info!("Airline {} voted for {} ({} votes)", voter, candidate, votes);
        Ok(votes)
    }

    pub fn register_airline(&mut self, caller: &Address, candidate: &Address) -> SuretyResult<RegistrationOutcome> {
        self.require_operational()?;

        let outcome = self.registry.register_airline(candidate, caller)?;
        self.record(Operation::RegisterAirline { caller: *caller, candidate: *candidate })?;

        match outcome {
            RegistrationOutcome::Pending { votes, required } => {
                tracing::info!("Airline {} pending: {}/{} votes", candidate, votes, required);
            }
            RegistrationOutcome::AlreadyRegistered => {
                tracing::debug!("Airline {} already registered", candidate);
            }
            _ => {
                tracing::info!("✓ Airline {} registered ({:?})", candidate, outcome);
            }
        }
        Ok(outcome)
    }

    // ---- flights and insurance ----

    /// Register a flight. Only the operating airline may register it.
    pub fn register_flight(&mut self, caller: &Address, flight: FlightKey) -> SuretyResult<bool> {
        self.require_operational()?;
        Self::require_caller(caller, &flight.airline)?;

        let created = self.ledger.register_flight(&self.registry, flight.clone())?;
        self.record(Operation::RegisterFlight { caller: *caller, flight: flight.clone() })?;

        if created {
            tracing::info!("Flight {} registered", flight);
        }
        Ok(created)
    }

    /// Buy insurance; the premium is paid into the treasury
    pub fn buy(&mut self, passenger: &Address, flight: &FlightKey, premium: Amount) -> SuretyResult<()> {
        self.require_operational()?;

        self.ledger.buy(flight, *passenger, premium.clone())?;
        self.treasury = &self.treasury + &premium;
        self.record(Operation::Buy {
            passenger: *passenger,
            flight: flight.clone(),
            premium: premium.clone(),
        })?;

        tracing::info!(
            "Passenger {} insured on {} for {} ether",
            passenger,
            flight,
            premium.to_ether_string()
        );
        Ok(())
    }

    /// Report a flight status directly. Requires the owner or an authorized caller.
    pub fn process_flight_status(
        &mut self,
        caller: &Address,
        flight: &FlightKey,
        status: FlightStatus,
    ) -> SuretyResult<StatusOutcome> {
        self.require_operational()?;
        if !self.is_authorized(caller) {
            return Err(SuretyError::UnauthorizedCaller(caller.to_hex()));
        }

        let outcome = self.settle(flight, status)?;
        self.record(Operation::ProcessFlightStatus {
            caller: *caller,
            flight: flight.clone(),
            status,
        })?;
        Ok(outcome)
    }

    fn settle(&mut self, flight: &FlightKey, status: FlightStatus) -> SuretyResult<StatusOutcome> {
        let outcome = self.ledger.process_flight_status(flight, status)?;
        match outcome {
            StatusOutcome::Settled { status, credited } => {
                tracing::info!("Flight {} settled as {} ({} credited)", flight, status, credited);
            }
            StatusOutcome::Ignored { current } => {
                tracing::debug!("Status {} for {} ignored, current {}", status, flight, current);
            }
        }
        Ok(outcome)
    }

    /// Settle the passenger's credits and take the payout from the treasury
    pub fn withdraw(&mut self, passenger: &Address) -> SuretyResult<Payout> {
        self.require_operational()?;

        // Withdraw settles exactly the pending credit
        let owed = self.ledger.pending_credit(passenger);
        let remaining = self.treasury
            .checked_sub(&owed)
            .ok_or_else(|| SuretyError::InsufficientTreasury {
                requested: owed.to_ether_string(),
                available: self.treasury.to_ether_string(),
            })?;

        let payout = self.ledger.withdraw(passenger)?;
        self.treasury = remaining;
        self.record(Operation::Withdraw { passenger: *passenger })?;

        tracing::info!(
            "Passenger {} withdrew {} ether over {} claims",
            passenger,
            payout.amount.to_ether_string(),
            payout.claims.len()
        );
        Ok(payout)
    }

    /// Undo a withdrawal whose transfer failed
    ///
    /// Reached only from the service's failed-transfer path and from replay.
    pub(crate) fn reinstate_payout(&mut self, payout: &Payout) -> SuretyResult<()> {
        self.ledger.reinstate(payout)?;
        self.treasury = &self.treasury + &payout.amount;
        self.record(Operation::ReinstatePayout { payout: payout.clone() })?;

        tracing::warn!(
            "Reinstated {} ether of credit for {}",
            payout.amount.to_ether_string(),
            payout.passenger
        );
        Ok(())
    }

    // ---- oracles ----

    /// Register an oracle with random indexes; the fee goes to the treasury
    pub fn register_oracle(&mut self, oracle: Address, fee: Amount) -> SuretyResult<Vec<u8>> {
        self.require_operational()?;

        let indexes = self.oracles.register_oracle(oracle, &fee)?;
        self.commit_oracle(oracle, fee, indexes.clone())?;
        Ok(indexes)
    }

    /// Register an oracle with known indexes
    pub fn register_oracle_with(&mut self, oracle: Address, fee: Amount, indexes: Vec<u8>) -> SuretyResult<()> {
        self.require_operational()?;

        self.oracles.register_oracle_with(oracle, &fee, indexes.clone())?;
        self.commit_oracle(oracle, fee, indexes)
    }

    fn commit_oracle(&mut self, oracle: Address, fee: Amount, indexes: Vec<u8>) -> SuretyResult<()> {
        self.treasury = &self.treasury + &fee;
        tracing::info!("Oracle {} registered with indexes {:?}", oracle, indexes);
        self.record(Operation::RegisterOracle { oracle, fee, indexes })
    }

    fn require_flight(&self, flight: &FlightKey) -> SuretyResult<()> {
        if self.ledger.flight(flight).is_none() {
            return Err(LedgerError::FlightNotFound(flight.to_string()).into());
        }
        Ok(())
    }

    /// Ask the oracles for a flight's status. Returns the request index.
    pub fn fetch_flight_status(&mut self, requester: Address, flight: FlightKey) -> SuretyResult<u8> {
        self.require_operational()?;
        self.require_flight(&flight)?;

        let index = self.oracles.fetch_flight_status(requester, flight.clone())?;
        self.commit_request(requester, flight, index)?;
        Ok(index)
    }

    /// Open a status request on a known index
    pub fn fetch_flight_status_at(&mut self, requester: Address, flight: FlightKey, index: u8) -> SuretyResult<()> {
        self.require_operational()?;
        self.require_flight(&flight)?;

        self.oracles.open_request(requester, flight.clone(), index)?;
        self.commit_request(requester, flight, index)
    }

    fn commit_request(&mut self, requester: Address, flight: FlightKey, index: u8) -> SuretyResult<()> {
        tracing::info!("Oracle request for {} opened on index {}", flight, index);
        self.record(Operation::FetchFlightStatus { requester, flight, index })
    }

    /// Record an oracle response; settles the flight once the oracles agree
    pub fn submit_oracle_response(
        &mut self,
        oracle: &Address,
        index: u8,
        flight: &FlightKey,
        status: FlightStatus,
    ) -> SuretyResult<OracleReport> {
        self.require_operational()?;
        self.require_flight(flight)?;

        let response = self.oracles.submit_response(oracle, index, flight, status)?;
        let settlement = match response {
            ResponseOutcome::Agreed { status } => Some(self.settle(flight, status)?),
            _ => None,
        };

        self.record(Operation::SubmitOracleResponse {
            oracle: *oracle,
            index,
            flight: flight.clone(),
            status,
        })?;

        tracing::debug!("Oracle {} reported {} for {}: {:?}", oracle, status, flight, response);
        Ok(OracleReport { response, settlement })
    }
}
