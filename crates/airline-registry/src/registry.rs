// airline-registry/src/registry.rs

use crate::{
    airline::Airline,
    voting::{RegistrationOutcome, Tally},
    RegistryError, RegistryResult,
};
use std::collections::HashMap;
use surety_core::{Amount, PolicyConfig};
use surety_crypto::Address;

/// Airline registry: membership, funding gate and admission consensus
///
/// The registry performs no locking. Callers must serialize mutations, since
/// the consensus threshold is read from the live membership count.
#[derive(Debug, Clone)]
pub struct AirlineRegistry {
    /// Policy constants
    policy: PolicyConfig,
    /// All airlines indexed by address
    airlines: HashMap<Address, Airline>,
    /// Addresses in the order they were first added
    order: Vec<Address>,
    /// Number of admitted airlines
    registered_count: usize,
}

impl AirlineRegistry {
    /// Create a registry whose founding airline is already admitted
    pub fn new(policy: PolicyConfig, founding_airline: Address) -> RegistryResult<Self> {
        policy.validate()?;

        let mut airlines = HashMap::new();
        airlines.insert(founding_airline, Airline::founding(founding_airline));

        Ok(Self {
            policy,
            airlines,
            order: vec![founding_airline],
            registered_count: 1,
        })
    }

    /// Get policy constants
    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Get an airline by address
    pub fn airline(&self, address: &Address) -> Option<&Airline> {
        self.airlines.get(address)
    }

    /// All airlines in the order they were added
    pub fn airlines(&self) -> impl Iterator<Item = &Airline> {
        self.order.iter().filter_map(|a| self.airlines.get(a))
    }

    /// Number of admitted airlines
    pub fn registered_count(&self) -> usize {
        self.registered_count
    }

    /// Votes a candidate needs right now (0 during bootstrap)
    pub fn required_votes(&self) -> usize {
        if self.policy.is_bootstrap(self.registered_count) {
            0
        } else {
            self.policy.required_votes(self.registered_count)
        }
    }

    /// Votes received by a candidate
    pub fn vote_count(&self, candidate: &Address) -> usize {
        self.airlines.get(candidate).map(Airline::vote_count).unwrap_or(0)
    }

    /// Tally a candidate against the current membership
    pub fn tally(&self, candidate: &Address) -> Option<Tally> {
        self.airlines
            .get(candidate)
            .map(|a| Tally::new(a, self.registered_count, &self.policy))
    }

    /// Whether an airline is admitted and has passed the funding gate
    pub fn is_airline_eligible(&self, airline: &Address) -> bool {
        self.airlines
            .get(airline)
            .map(|a| a.is_eligible(&self.policy.min_funding))
            .unwrap_or(false)
    }

    /// Add a pending candidate. Returns `false` if the airline already existed.
    pub fn add_airline(&mut self, candidate: Address) -> bool {
        if self.airlines.contains_key(&candidate) {
            return false;
        }

        self.airlines.insert(candidate, Airline::new(candidate));
        self.order.push(candidate);
        true
    }

    /// Stake funds for `airline`. Only the airline itself may fund.
    ///
    /// Returns `true` when this call made the airline funded.
    pub fn fund(&mut self, caller: &Address, airline: &Address, amount: &Amount) -> RegistryResult<bool> {
        if caller != airline {
            return Err(RegistryError::InsufficientCaller {
                caller: caller.to_hex(),
                airline: airline.to_hex(),
            });
        }

        let min_funding = self.policy.min_funding.clone();
        let record = self.airlines.get_mut(airline)
            .ok_or_else(|| RegistryError::UnknownAirline(airline.to_hex()))?;

        Ok(record.add_funding(amount, &min_funding))
    }

    /// Cast `voter`'s vote to admit `candidate`. Returns the candidate's vote count.
    pub fn vote(&mut self, voter: &Address, candidate: &Address) -> RegistryResult<usize> {
        if !self.is_airline_eligible(voter) {
            return Err(RegistryError::NotEligibleVoter(voter.to_hex()));
        }

        let record = self.airlines.get_mut(candidate)
            .ok_or_else(|| RegistryError::UnknownAirline(candidate.to_hex()))?;

        // Members carry no proposal
        if !record.is_registered {
            record.record_vote(*voter);
        }

        Ok(record.vote_count())
    }

    /// Attempt to admit `candidate` on behalf of `requested_by`
    pub fn register_airline(
        &mut self,
        candidate: &Address,
        requested_by: &Address,
    ) -> RegistryResult<RegistrationOutcome> {
        if !self.is_airline_eligible(requested_by) {
            return Err(RegistryError::NotFunded(requested_by.to_hex()));
        }

        let registered = self.registered_count;
        let record = self.airlines.get_mut(candidate)
            .ok_or_else(|| RegistryError::UnknownAirline(candidate.to_hex()))?;

        if record.is_registered {
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }

        let outcome = Tally::new(record, registered, &self.policy).outcome();
        if outcome.is_registered() {
            record.admit();
            self.registered_count += 1;
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn address(n: u8) -> Address {
        Address::new([n; 20])
    }

    /// Registry with `members` eligible airlines, addresses 1..=members
    fn registry_with_members(members: u8) -> AirlineRegistry {
        let mut registry = AirlineRegistry::new(PolicyConfig::default(), address(1)).unwrap();
        registry.fund(&address(1), &address(1), &Amount::from_ether(10)).unwrap();

        for n in 2..=members {
            let candidate = address(n);
            registry.add_airline(candidate);
            registry.fund(&candidate, &candidate, &Amount::from_ether(10)).unwrap();
            for voter in 1..n {
                registry.vote(&address(voter), &candidate).unwrap();
            }
            let outcome = registry.register_airline(&candidate, &address(1)).unwrap();
            assert!(outcome.is_registered());
        }
        registry
    }

    #[test]
    fn test_registry_creation() {
        let registry = AirlineRegistry::new(PolicyConfig::default(), address(1)).unwrap();
        assert_eq!(registry.registered_count(), 1);
        assert!(registry.airline(&address(1)).unwrap().is_registered);
        assert!(!registry.is_airline_eligible(&address(1)));
    }

    #[test]
    fn test_add_airline_is_idempotent() {
        let mut registry = AirlineRegistry::new(PolicyConfig::default(), address(1)).unwrap();
        assert!(registry.add_airline(address(2)));
        let before: Vec<Airline> = registry.airlines().cloned().collect();

        assert!(!registry.add_airline(address(2)));
        assert!(!registry.add_airline(address(1)));
        let after: Vec<Airline> = registry.airlines().cloned().collect();

        assert_eq!(before, after);
        assert_eq!(registry.registered_count(), 1);
    }

    #[test]
    fn test_fund_requires_airline_itself() {
        let mut registry = AirlineRegistry::new(PolicyConfig::default(), address(1)).unwrap();
        let result = registry.fund(&address(9), &address(1), &Amount::from_ether(10));
        assert!(matches!(result, Err(RegistryError::InsufficientCaller { .. })));
        assert!(registry.airline(&address(1)).unwrap().funded_amount.is_zero());
    }

    #[test]
    fn test_fund_unknown_airline() {
        let mut registry = AirlineRegistry::new(PolicyConfig::default(), address(1)).unwrap();
        let result = registry.fund(&address(5), &address(5), &Amount::from_ether(10));
        assert!(matches!(result, Err(RegistryError::UnknownAirline(_))));
    }

    #[test]
    fn test_unfunded_airline_cannot_register() {
        let mut registry = AirlineRegistry::new(PolicyConfig::default(), address(1)).unwrap();
        registry.add_airline(address(2));

        let result = registry.register_airline(&address(2), &address(1));
        assert!(matches!(result, Err(RegistryError::NotFunded(_))));
        assert!(!registry.airline(&address(2)).unwrap().is_registered);
    }

    #[test]
    fn test_bootstrap_registration() {
        let mut registry = AirlineRegistry::new(PolicyConfig::default(), address(1)).unwrap();
        registry.fund(&address(1), &address(1), &Amount::from_ether(10)).unwrap();
        assert!(registry.is_airline_eligible(&address(1)));

        registry.add_airline(address(2));
        let outcome = registry.register_airline(&address(2), &address(1)).unwrap();
        assert_eq!(outcome, RegistrationOutcome::Bootstrapped);
        assert_eq!(registry.registered_count(), 2);

        let outcome = registry.register_airline(&address(2), &address(1)).unwrap();
        assert_eq!(outcome, RegistrationOutcome::AlreadyRegistered);
        assert_eq!(registry.registered_count(), 2);
    }

    #[test]
    fn test_first_four_need_no_votes() {
        let mut registry = AirlineRegistry::new(PolicyConfig::default(), address(1)).unwrap();
        registry.fund(&address(1), &address(1), &Amount::from_ether(10)).unwrap();

        for n in 2..=4 {
            registry.add_airline(address(n));
            let outcome = registry.register_airline(&address(n), &address(1)).unwrap();
            assert_eq!(outcome, RegistrationOutcome::Bootstrapped);
        }
        assert_eq!(registry.registered_count(), 4);

        // Fifth needs ceil(4 / 2) = 2 votes
        registry.add_airline(address(5));
        let outcome = registry.register_airline(&address(5), &address(1)).unwrap();
        assert_eq!(outcome, RegistrationOutcome::Pending { votes: 0, required: 2 });
    }

    #[test]
    fn test_vote_requires_eligible_voter() {
        let mut registry = AirlineRegistry::new(PolicyConfig::default(), address(1)).unwrap();
        registry.add_airline(address(2));
        registry.add_airline(address(3));

        // Registered but unfunded
        let result = registry.vote(&address(1), &address(3));
        assert!(matches!(result, Err(RegistryError::NotEligibleVoter(_))));

        // Funded but not registered
        registry.fund(&address(2), &address(2), &Amount::from_ether(10)).unwrap();
        let result = registry.vote(&address(2), &address(3));
        assert!(matches!(result, Err(RegistryError::NotEligibleVoter(_))));

        assert_eq!(registry.vote_count(&address(3)), 0);
    }

    #[test]
    fn test_repeat_votes_count_once() {
        let mut registry = registry_with_members(2);
        registry.add_airline(address(9));

        assert_eq!(registry.vote(&address(1), &address(9)).unwrap(), 1);
        assert_eq!(registry.vote(&address(1), &address(9)).unwrap(), 1);
        assert_eq!(registry.vote(&address(2), &address(9)).unwrap(), 2);
    }

    #[test]
    fn test_fifty_percent_consensus() {
        let mut registry = registry_with_members(5);
        assert_eq!(registry.registered_count(), 5);
        assert_eq!(registry.required_votes(), 3);

        let candidate = address(6);
        registry.add_airline(candidate);
        registry.vote(&address(1), &candidate).unwrap();
        registry.vote(&address(2), &candidate).unwrap();

        let outcome = registry.register_airline(&candidate, &address(1)).unwrap();
        assert_eq!(outcome, RegistrationOutcome::Pending { votes: 2, required: 3 });
        assert_eq!(registry.registered_count(), 5);

        registry.vote(&address(3), &candidate).unwrap();
        let outcome = registry.register_airline(&candidate, &address(1)).unwrap();
        assert_eq!(outcome, RegistrationOutcome::Approved { votes: 3, required: 3 });
        assert_eq!(registry.registered_count(), 6);

        // Proposal is consumed on admission
        assert_eq!(registry.vote_count(&candidate), 0);
    }

    #[test]
    fn test_denominator_is_live() {
        let mut registry = registry_with_members(4);
        registry.add_airline(address(7));
        registry.add_airline(address(8));
        registry.vote(&address(1), &address(8)).unwrap();
        registry.vote(&address(2), &address(8)).unwrap();

        // Two votes satisfy ceil(4 / 2)
        assert!(registry.tally(&address(8)).unwrap().is_approved());

        // Admitting another member first raises the bar to ceil(5 / 2)
        registry.vote(&address(1), &address(7)).unwrap();
        registry.vote(&address(2), &address(7)).unwrap();
        assert!(registry.register_airline(&address(7), &address(1)).unwrap().is_registered());

        let outcome = registry.register_airline(&address(8), &address(1)).unwrap();
        assert_eq!(outcome, RegistrationOutcome::Pending { votes: 2, required: 3 });
    }

    proptest! {
        #[test]
        fn prop_funding_is_monotonic(chunks in proptest::collection::vec(0u64..5, 1..12)) {
            let mut registry = AirlineRegistry::new(PolicyConfig::default(), address(1)).unwrap();
            let mut total = 0u64;
            let mut flipped = false;

            for chunk in chunks {
                let became_funded = registry
                    .fund(&address(1), &address(1), &Amount::from_ether(chunk))
                    .unwrap();
                total += chunk;

                let airline = registry.airline(&address(1)).unwrap();
                prop_assert_eq!(&airline.funded_amount, &Amount::from_ether(total));
                prop_assert_eq!(airline.is_funded, total >= 10);
                // Flips exactly when the running total first reaches the minimum
                prop_assert_eq!(became_funded, total >= 10 && !flipped);
                flipped |= became_funded;
            }
        }

        #[test]
        fn prop_consensus_threshold(members in 4u8..10, voters in 0u8..10) {
            let mut registry = registry_with_members(members);
            let candidate = address(200);
            registry.add_airline(candidate);

            let voters = voters.min(members);
            for voter in 1..=voters {
                registry.vote(&address(voter), &candidate).unwrap();
            }

            let required = (members as usize).div_ceil(2);
            let outcome = registry.register_airline(&candidate, &address(1)).unwrap();
            prop_assert_eq!(outcome.is_registered(), voters as usize >= required);
        }
    }
}
