// insurance-ledger/src/ledger.rs

use crate::{
    flight::{Flight, FlightKey, FlightStatus},
    policy::{InsurancePolicy, Payout, PayoutClaim},
    LedgerError, LedgerResult,
};
use airline_registry::AirlineRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use surety_core::{Amount, PolicyConfig};
use surety_crypto::Address;

/// Read-only view of airline eligibility
pub trait AirlineEligibility {
    fn is_airline_eligible(&self, airline: &Address) -> bool;
}

impl AirlineEligibility for AirlineRegistry {
    fn is_airline_eligible(&self, airline: &Address) -> bool {
        AirlineRegistry::is_airline_eligible(self, airline)
    }
}

/// Result of a status report that was not rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusOutcome {
    /// The status was recorded; `credited` policies received a payout credit
    Settled { status: FlightStatus, credited: usize },
    /// The flight already had a final status (or the report was `Unknown`)
    Ignored { current: FlightStatus },
}

/// Insurance ledger: flights, policies and payout credits
#[derive(Debug, Clone)]
pub struct InsuranceLedger {
    /// Policy constants
    policy: PolicyConfig,
    /// Registered flights
    flights: HashMap<FlightKey, Flight>,
    /// Policies per flight, keyed by passenger
    policies: HashMap<FlightKey, BTreeMap<Address, InsurancePolicy>>,
    /// Flights each passenger holds a policy on
    by_passenger: HashMap<Address, BTreeSet<FlightKey>>,
}

impl InsuranceLedger {
    pub fn new(policy: PolicyConfig) -> LedgerResult<Self> {
        policy.validate()?;

        Ok(Self {
            policy,
            flights: HashMap::new(),
            policies: HashMap::new(),
            by_passenger: HashMap::new(),
        })
    }

    /// Get policy constants
    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn flight(&self, key: &FlightKey) -> Option<&Flight> {
        self.flights.get(key)
    }

    pub fn flights(&self) -> impl Iterator<Item = &Flight> {
        self.flights.values()
    }

    pub fn policy_for(&self, key: &FlightKey, passenger: &Address) -> Option<&InsurancePolicy> {
        self.policies.get(key).and_then(|p| p.get(passenger))
    }

    /// All policies a passenger holds, with their flights
    pub fn policies_for(&self, passenger: &Address) -> Vec<(&FlightKey, &InsurancePolicy)> {
        self.by_passenger
            .get(passenger)
            .into_iter()
            .flatten()
            .filter_map(|key| self.policy_for(key, passenger).map(|p| (key, p)))
            .collect()
    }

    /// Sum of unwithdrawn credits across a passenger's policies
    pub fn pending_credit(&self, passenger: &Address) -> Amount {
        self.policies_for(passenger)
            .into_iter()
            .map(|(_, p)| &p.payout_credit)
            .sum()
    }

    /// Register a flight for an eligible airline. Returns `false` if it already existed.
    pub fn register_flight(
        &mut self,
        airlines: &impl AirlineEligibility,
        key: FlightKey,
    ) -> LedgerResult<bool> {
        if !airlines.is_airline_eligible(&key.airline) {
            return Err(LedgerError::AirlineNotEligible(key.airline.to_hex()));
        }

        if self.flights.contains_key(&key) {
            return Ok(false);
        }

        self.flights.insert(key.clone(), Flight::new(key));
        Ok(true)
    }

    /// Insure `passenger` on a flight, replacing any earlier policy they held on it
    pub fn buy(&mut self, key: &FlightKey, passenger: Address, premium: Amount) -> LedgerResult<()> {
        let flight = self.flights.get(key)
            .ok_or_else(|| LedgerError::FlightNotFound(key.to_string()))?;

        if premium.is_zero() {
            return Err(LedgerError::ZeroPremium);
        }
        if premium > self.policy.max_premium {
            return Err(LedgerError::PremiumExceedsCap {
                premium: premium.to_ether_string(),
                cap: self.policy.max_premium.to_ether_string(),
            });
        }
        // Overwriting after settlement would erase a credit
        if flight.is_settled() {
            return Err(LedgerError::FlightAlreadySettled(key.to_string()));
        }

        self.policies
            .entry(key.clone())
            .or_default()
            .insert(passenger, InsurancePolicy::new(passenger, premium));
        self.by_passenger
            .entry(passenger)
            .or_default()
            .insert(key.clone());

        Ok(())
    }

    /// Record the final status of a flight and credit payouts on a late-airline delay
    pub fn process_flight_status(
        &mut self,
        key: &FlightKey,
        status: FlightStatus,
    ) -> LedgerResult<StatusOutcome> {
        let flight = self.flights.get_mut(key)
            .ok_or_else(|| LedgerError::FlightNotFound(key.to_string()))?;

        if flight.is_settled() || !status.is_settled() {
            return Ok(StatusOutcome::Ignored { current: flight.status });
        }

        flight.status = status;

        let mut credited = 0;
        if status.pays_out() {
            if let Some(policies) = self.policies.get_mut(key) {
                for policy in policies.values_mut() {
                    let payout = self.policy.payout_for(&policy.premium_paid);
                    if policy.credit(payout) {
                        credited += 1;
                    }
                }
            }
        }

        Ok(StatusOutcome::Settled { status, credited })
    }

    /// Settle every credited policy of `passenger` and return the total owed
    pub fn withdraw(&mut self, passenger: &Address) -> LedgerResult<Payout> {
        if self.pending_credit(passenger).is_zero() {
            return Err(LedgerError::NoCredit(passenger.to_hex()));
        }

        let keys: Vec<FlightKey> = self.by_passenger
            .get(passenger)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();

        let mut claims = Vec::new();
        for key in keys {
            let policy = self.policies
                .get_mut(&key)
                .and_then(|p| p.get_mut(passenger));

            if let Some(policy) = policy.filter(|p| p.has_credit()) {
                claims.push(PayoutClaim {
                    amount: policy.settle(),
                    flight: key,
                });
            }
        }

        let amount: Amount = claims.iter().map(|c| &c.amount).sum();
        Ok(Payout {
            passenger: *passenger,
            amount,
            claims,
        })
    }

    /// Restore the credits of a withdrawal whose transfer failed
    pub fn reinstate(&mut self, payout: &Payout) -> LedgerResult<()> {
        if payout.claims.is_empty() {
            return Err(LedgerError::ReinstateMismatch("payout has no claims".into()));
        }
        let total: Amount = payout.claims.iter().map(|c| &c.amount).sum();
        if total != payout.amount {
            return Err(LedgerError::ReinstateMismatch(format!(
                "payout total {} does not match claims {}",
                payout.amount.to_ether_string(),
                total.to_ether_string()
            )));
        }

        // Validate every claim before touching any policy
        let mut seen = BTreeSet::new();
        for claim in &payout.claims {
            if !seen.insert(&claim.flight) {
                return Err(LedgerError::ReinstateMismatch(format!(
                    "duplicate claim on {}", claim.flight
                )));
            }

            let policy = self.policy_for(&claim.flight, &payout.passenger)
                .ok_or_else(|| LedgerError::ReinstateMismatch(format!(
                    "no policy for {} on {}", payout.passenger, claim.flight
                )))?;
            if !policy.claimed || policy.has_credit() {
                return Err(LedgerError::ReinstateMismatch(format!(
                    "policy for {} on {} is not in a withdrawn state",
                    payout.passenger, claim.flight
                )));
            }

            // Only the credit the flight actually paid can come back
            let owed = self.policy.payout_for(&policy.premium_paid);
            if claim.amount != owed {
                return Err(LedgerError::ReinstateMismatch(format!(
                    "claim of {} on {} differs from credited {}",
                    claim.amount.to_ether_string(),
                    claim.flight,
                    owed.to_ether_string()
                )));
            }
        }

        for claim in &payout.claims {
            if let Some(policy) = self.policies
                .get_mut(&claim.flight)
                .and_then(|p| p.get_mut(&payout.passenger))
            {
                policy.payout_credit = claim.amount.clone();
                policy.claimed = false;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    /// Eligibility stub for ledger-only tests
    struct Eligible(HashSet<Address>);

    impl AirlineEligibility for Eligible {
        fn is_airline_eligible(&self, airline: &Address) -> bool {
            self.0.contains(airline)
        }
    }

    fn address(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn ledger_with_flight() -> (InsuranceLedger, FlightKey) {
        let mut ledger = InsuranceLedger::new(PolicyConfig::default()).unwrap();
        let airlines = Eligible([address(1)].into_iter().collect());
        let key = FlightKey::new(address(1), "ND1309", 1_700_000_000);
        assert!(ledger.register_flight(&airlines, key.clone()).unwrap());
        (ledger, key)
    }

    #[test]
    fn test_flight_registration_requires_eligibility() {
        let mut ledger = InsuranceLedger::new(PolicyConfig::default()).unwrap();
        let airlines = Eligible(HashSet::new());

        let result = ledger.register_flight(&airlines, FlightKey::new(address(2), "FLIGHT_2", 123));
        assert!(matches!(result, Err(LedgerError::AirlineNotEligible(_))));
        assert_eq!(ledger.flights().count(), 0);
    }

    #[test]
    fn test_registry_gate_five_versus_eleven_ether() {
        let mut registry = AirlineRegistry::new(PolicyConfig::default(), address(1)).unwrap();
        registry.fund(&address(1), &address(1), &Amount::from_ether(11)).unwrap();
        registry.add_airline(address(2));
        registry.register_airline(&address(2), &address(1)).unwrap();
        registry.fund(&address(2), &address(2), &Amount::from_ether(5)).unwrap();

        let mut ledger = InsuranceLedger::new(PolicyConfig::default()).unwrap();
        let result = ledger.register_flight(&registry, FlightKey::new(address(2), "FLIGHT_2", 123));
        assert!(matches!(result, Err(LedgerError::AirlineNotEligible(_))));

        let result = ledger.register_flight(&registry, FlightKey::new(address(1), "FLIGHT_1", 123));
        assert!(result.unwrap());
    }

    #[test]
    fn test_duplicate_flight_is_noop() {
        let (mut ledger, key) = ledger_with_flight();
        let airlines = Eligible([address(1)].into_iter().collect());
        assert!(!ledger.register_flight(&airlines, key).unwrap());
        assert_eq!(ledger.flights().count(), 1);
    }

    #[test]
    fn test_buy_rejections() {
        let (mut ledger, key) = ledger_with_flight();
        let missing = FlightKey::new(address(1), "ND0000", 1);

        assert!(matches!(
            ledger.buy(&missing, address(7), Amount::from_ether(1)),
            Err(LedgerError::FlightNotFound(_))
        ));
        assert!(matches!(
            ledger.buy(&key, address(7), Amount::parse_ether("1.01").unwrap()),
            Err(LedgerError::PremiumExceedsCap { .. })
        ));
        assert!(matches!(
            ledger.buy(&key, address(7), Amount::zero()),
            Err(LedgerError::ZeroPremium)
        ));
        assert!(ledger.policy_for(&key, &address(7)).is_none());
    }

    #[test]
    fn test_buy_overwrites_policy() {
        let (mut ledger, key) = ledger_with_flight();
        ledger.buy(&key, address(7), Amount::parse_ether("0.5").unwrap()).unwrap();
        ledger.buy(&key, address(7), Amount::from_ether(1)).unwrap();

        let policy = ledger.policy_for(&key, &address(7)).unwrap();
        assert_eq!(policy.premium_paid, Amount::from_ether(1));
        assert_eq!(ledger.policies_for(&address(7)).len(), 1);
    }

    #[test]
    fn test_late_airline_payout() {
        let (mut ledger, key) = ledger_with_flight();
        ledger.buy(&key, address(7), Amount::from_ether(1)).unwrap();
        ledger.buy(&key, address(8), Amount::parse_ether("0.2").unwrap()).unwrap();

        let outcome = ledger.process_flight_status(&key, FlightStatus::LateAirline).unwrap();
        assert_eq!(outcome, StatusOutcome::Settled { status: FlightStatus::LateAirline, credited: 2 });

        let payout = ledger.withdraw(&address(7)).unwrap();
        assert_eq!(payout.amount, Amount::parse_ether("1.5").unwrap());
        assert_eq!(payout.claims.len(), 1);

        let policy = ledger.policy_for(&key, &address(7)).unwrap();
        assert!(policy.claimed);
        assert!(policy.payout_credit.is_zero());

        assert!(matches!(ledger.withdraw(&address(7)), Err(LedgerError::NoCredit(_))));
        assert_eq!(ledger.pending_credit(&address(8)), Amount::parse_ether("0.3").unwrap());
    }

    #[test]
    fn test_status_is_write_once() {
        let (mut ledger, key) = ledger_with_flight();
        ledger.buy(&key, address(7), Amount::from_ether(1)).unwrap();

        ledger.process_flight_status(&key, FlightStatus::OnTime).unwrap();
        let outcome = ledger.process_flight_status(&key, FlightStatus::LateAirline).unwrap();

        assert_eq!(outcome, StatusOutcome::Ignored { current: FlightStatus::OnTime });
        assert_eq!(ledger.flight(&key).unwrap().status, FlightStatus::OnTime);
        assert!(ledger.pending_credit(&address(7)).is_zero());
        assert!(matches!(ledger.withdraw(&address(7)), Err(LedgerError::NoCredit(_))));
    }

    #[test]
    fn test_unknown_report_changes_nothing() {
        let (mut ledger, key) = ledger_with_flight();
        let outcome = ledger.process_flight_status(&key, FlightStatus::Unknown).unwrap();
        assert_eq!(outcome, StatusOutcome::Ignored { current: FlightStatus::Unknown });

        // The flight can still settle afterwards
        let outcome = ledger.process_flight_status(&key, FlightStatus::LateWeather).unwrap();
        assert!(matches!(outcome, StatusOutcome::Settled { credited: 0, .. }));
    }

    #[test]
    fn test_duplicate_late_trigger_does_not_recredit() {
        let (mut ledger, key) = ledger_with_flight();
        ledger.buy(&key, address(7), Amount::from_ether(1)).unwrap();

        ledger.process_flight_status(&key, FlightStatus::LateAirline).unwrap();
        ledger.withdraw(&address(7)).unwrap();
        let outcome = ledger.process_flight_status(&key, FlightStatus::LateAirline).unwrap();

        assert_eq!(outcome, StatusOutcome::Ignored { current: FlightStatus::LateAirline });
        assert!(ledger.pending_credit(&address(7)).is_zero());
    }

    #[test]
    fn test_buy_after_settlement_rejected() {
        let (mut ledger, key) = ledger_with_flight();
        ledger.buy(&key, address(7), Amount::from_ether(1)).unwrap();
        ledger.process_flight_status(&key, FlightStatus::LateAirline).unwrap();

        let result = ledger.buy(&key, address(7), Amount::from_ether(1));
        assert!(matches!(result, Err(LedgerError::FlightAlreadySettled(_))));
        assert_eq!(ledger.pending_credit(&address(7)), Amount::parse_ether("1.5").unwrap());
    }

    #[test]
    fn test_withdraw_aggregates_flights() {
        let (mut ledger, first) = ledger_with_flight();
        let airlines = Eligible([address(1)].into_iter().collect());
        let second = FlightKey::new(address(1), "ND1310", 1_700_003_600);
        ledger.register_flight(&airlines, second.clone()).unwrap();

        ledger.buy(&first, address(7), Amount::from_ether(1)).unwrap();
        ledger.buy(&second, address(7), Amount::parse_ether("0.5").unwrap()).unwrap();
        ledger.process_flight_status(&first, FlightStatus::LateAirline).unwrap();
        ledger.process_flight_status(&second, FlightStatus::LateAirline).unwrap();

        let payout = ledger.withdraw(&address(7)).unwrap();
        assert_eq!(payout.amount, Amount::parse_ether("2.25").unwrap());
        assert_eq!(payout.claims.len(), 2);
        assert!(ledger.pending_credit(&address(7)).is_zero());
    }

    #[test]
    fn test_reinstate_restores_credit() {
        let (mut ledger, key) = ledger_with_flight();
        ledger.buy(&key, address(7), Amount::from_ether(1)).unwrap();
        ledger.process_flight_status(&key, FlightStatus::LateAirline).unwrap();

        let payout = ledger.withdraw(&address(7)).unwrap();
        ledger.reinstate(&payout).unwrap();

        let policy = ledger.policy_for(&key, &address(7)).unwrap();
        assert!(!policy.claimed);
        assert_eq!(policy.payout_credit, Amount::parse_ether("1.5").unwrap());

        // Reinstating twice would mint credit
        assert!(matches!(ledger.reinstate(&payout), Err(LedgerError::ReinstateMismatch(_))));

        let again = ledger.withdraw(&address(7)).unwrap();
        assert_eq!(again.amount, payout.amount);
    }

    #[test]
    fn test_reinstate_rejects_forged_payout() {
        let (mut ledger, key) = ledger_with_flight();
        ledger.buy(&key, address(7), Amount::from_ether(1)).unwrap();
        ledger.process_flight_status(&key, FlightStatus::LateAirline).unwrap();
        let real = ledger.withdraw(&address(7)).unwrap();

        // Inflated claim
        let inflated = Payout {
            passenger: address(7),
            amount: Amount::from_ether(1000),
            claims: vec![PayoutClaim { flight: key.clone(), amount: Amount::from_ether(1000) }],
        };
        assert!(matches!(ledger.reinstate(&inflated), Err(LedgerError::ReinstateMismatch(_))));

        // Total disagreeing with the claims
        let padded = Payout { amount: Amount::from_ether(3), ..real.clone() };
        assert!(matches!(ledger.reinstate(&padded), Err(LedgerError::ReinstateMismatch(_))));

        // Same flight claimed twice
        let mut doubled = real.clone();
        doubled.claims.push(real.claims[0].clone());
        doubled.amount = Amount::from_ether(3);
        assert!(matches!(ledger.reinstate(&doubled), Err(LedgerError::ReinstateMismatch(_))));

        let policy = ledger.policy_for(&key, &address(7)).unwrap();
        assert!(policy.claimed);
        assert!(policy.payout_credit.is_zero());

        ledger.reinstate(&real).unwrap();
        assert_eq!(ledger.pending_credit(&address(7)), Amount::parse_ether("1.5").unwrap());
    }

    proptest! {
        #[test]
        fn prop_withdraw_pays_exactly_credit(premium in 1u64..=1_000_000_000_000_000_000u64) {
            let (mut ledger, key) = ledger_with_flight();
            ledger.buy(&key, address(7), Amount::from_u64(premium)).unwrap();
            ledger.process_flight_status(&key, FlightStatus::LateAirline).unwrap();

            let credited = ledger.pending_credit(&address(7));
            let payout = ledger.withdraw(&address(7)).unwrap();

            prop_assert_eq!(&payout.amount, &credited);
            prop_assert_eq!(payout.amount, Amount::from_u64(premium / 2 + premium));
            prop_assert!(ledger.withdraw(&address(7)).is_err());
        }
    }
}
