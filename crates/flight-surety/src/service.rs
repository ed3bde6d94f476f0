// flight-surety/src/service.rs
use crate::{
    contract::{FlightSurety, OracleReport, SuretySummary},
    SuretyError, SuretyResult,
};
use airline_registry::RegistrationOutcome;
use async_trait::async_trait;
use insurance_ledger::{FlightKey, FlightStatus, Payout, StatusOutcome};
use std::path::Path;
use std::sync::Arc;
use surety_core::Amount;
use surety_crypto::Address;
use tokio::sync::Mutex;

/// Moves withdrawn funds to the passenger
#[async_trait]
pub trait PayoutSink: Send + Sync {
    /// Transfer `payout.amount` to `payout.passenger`
    async fn transfer(&self, payout: &Payout) -> anyhow::Result<()>;
}

/// Sink that only records the transfer in the log output
#[derive(Debug, Clone, Default)]
pub struct TracingPayoutSink;

#[async_trait]
impl PayoutSink for TracingPayoutSink {
    async fn transfer(&self, payout: &Payout) -> anyhow::Result<()> {
        tracing::info!(
            "Transferring {} ether to {}",
            payout.amount.to_ether_string(),
            payout.passenger
        );
        Ok(())
    }
}

/// Shared handle running every contract operation as one indivisible unit
#[derive(Clone)]
pub struct SuretyService {
    surety: Arc<Mutex<FlightSurety>>,
    sink: Arc<dyn PayoutSink>,
}

impl SuretyService {
    pub fn new(surety: FlightSurety, sink: Arc<dyn PayoutSink>) -> Self {
        Self {
            surety: Arc::new(Mutex::new(surety)),
            sink,
        }
    }

    /// Run a read-only closure against the current state
    pub async fn inspect<R>(&self, f: impl FnOnce(&FlightSurety) -> R) -> R {
        let surety = self.surety.lock().await;
        f(&surety)
    }

    pub async fn summary(&self) -> SuretySummary {
        self.surety.lock().await.summary()
    }

    /// Persist the operation log
    pub async fn save_log(&self, path: impl AsRef<Path>) -> SuretyResult<()> {
        self.surety.lock().await.log().save(path)
    }

    pub async fn set_operating_status(&self, caller: Address, mode: bool) -> SuretyResult<()> {
        self.surety.lock().await.set_operating_status(&caller, mode)
    }

    pub async fn authorize_caller(&self, caller: Address, address: Address) -> SuretyResult<()> {
        self.surety.lock().await.authorize_caller(&caller, address)
    }

    pub async fn deauthorize_caller(&self, caller: Address, address: Address) -> SuretyResult<()> {
        self.surety.lock().await.deauthorize_caller(&caller, &address)
    }

    pub async fn add_airline(&self, caller: Address, candidate: Address) -> SuretyResult<bool> {
        self.surety.lock().await.add_airline(&caller, candidate)
    }

    pub async fn fund_airline(&self, caller: Address, airline: Address, amount: Amount) -> SuretyResult<bool> {
        self.surety.lock().await.fund_airline(&caller, &airline, amount)
    }

    pub async fn vote(&self, voter: Address, candidate: Address) -> SuretyResult<usize> {
        self.surety.lock().await.vote(&voter, &candidate)
    }

    pub async fn register_airline(&self, caller: Address, candidate: Address) -> SuretyResult<RegistrationOutcome> {
        self.surety.lock().await.register_airline(&caller, &candidate)
    }

    pub async fn register_flight(&self, caller: Address, flight: FlightKey) -> SuretyResult<bool> {
        self.surety.lock().await.register_flight(&caller, flight)
    }

    pub async fn buy(&self, passenger: Address, flight: FlightKey, premium: Amount) -> SuretyResult<()> {
        self.surety.lock().await.buy(&passenger, &flight, premium)
    }

    pub async fn process_flight_status(
        &self,
        caller: Address,
        flight: FlightKey,
        status: FlightStatus,
    ) -> SuretyResult<StatusOutcome> {
        self.surety.lock().await.process_flight_status(&caller, &flight, status)
    }

    pub async fn register_oracle(&self, oracle: Address, fee: Amount) -> SuretyResult<Vec<u8>> {
        self.surety.lock().await.register_oracle(oracle, fee)
    }

    pub async fn fetch_flight_status(&self, requester: Address, flight: FlightKey) -> SuretyResult<u8> {
        self.surety.lock().await.fetch_flight_status(requester, flight)
    }

    /// Forward an oracle response; consensus settles the flight in the same step
    pub async fn submit_oracle_response(
        &self,
        oracle: Address,
        index: u8,
        flight: FlightKey,
        status: FlightStatus,
    ) -> SuretyResult<OracleReport> {
        self.surety.lock().await.submit_oracle_response(&oracle, index, &flight, status)
    }

    /// Withdraw and transfer the passenger's credit
    ///
    /// The lock is held across the transfer. If the sink fails the credit and
    /// the treasury are restored before the error is returned.
    pub async fn withdraw(&self, passenger: Address) -> SuretyResult<Payout> {
        let mut surety = self.surety.lock().await;
        let payout = surety.withdraw(&passenger)?;

        if let Err(e) = self.sink.transfer(&payout).await {
            tracing::warn!("Payout to {} failed: {}", passenger, e);
            surety.reinstate_payout(&payout)?;
            return Err(SuretyError::Payout(e.to_string()));
        }

        Ok(payout)
    }
}
