// airline-registry/src/airline.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use surety_core::Amount;
use surety_crypto::Address;

/// Membership status of an airline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AirlineStatus {
    /// Added, waiting for admission
    Pending,
    /// Admitted, but has not staked the minimum yet
    Registered,
    /// Admitted and staked: may vote, register airlines and flights
    Eligible,
}

/// Airline record owned by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airline {
    /// Airline address
    pub address: Address,
    /// Admitted to the registry
    pub is_registered: bool,
    /// Staked at least the minimum funding at some point
    pub is_funded: bool,
    /// Total staked so far
    pub funded_amount: Amount,
    /// Distinct eligible airlines that voted to admit this one
    pub votes_received: BTreeSet<Address>,
}

impl Airline {
    /// Create a pending candidate
    pub fn new(address: Address) -> Self {
        Self {
            address,
            is_registered: false,
            is_funded: false,
            funded_amount: Amount::zero(),
            votes_received: BTreeSet::new(),
        }
    }

    /// Create an airline that is admitted from the start (the founding airline)
    pub fn founding(address: Address) -> Self {
        Self {
            is_registered: true,
            ..Self::new(address)
        }
    }

    /// Whether the funding gate is passed and the airline is admitted
    pub fn is_eligible(&self, min_funding: &Amount) -> bool {
        self.is_registered && self.is_funded && self.funded_amount >= *min_funding
    }

    pub fn status(&self, min_funding: &Amount) -> AirlineStatus {
        if self.is_eligible(min_funding) {
            AirlineStatus::Eligible
        } else if self.is_registered {
            AirlineStatus::Registered
        } else {
            AirlineStatus::Pending
        }
    }

    /// Add stake. Returns `true` when this call flipped the airline to funded.
    pub fn add_funding(&mut self, amount: &Amount, min_funding: &Amount) -> bool {
        self.funded_amount = self.funded_amount.clone() + amount.clone();

        if !self.is_funded && self.funded_amount >= *min_funding {
            self.is_funded = true;
            return true;
        }
        false
    }

    /// Record a vote. Returns `false` if the voter had already voted.
    pub fn record_vote(&mut self, voter: Address) -> bool {
        self.votes_received.insert(voter)
    }

    pub fn vote_count(&self) -> usize {
        self.votes_received.len()
    }

    /// Admit the airline and discard the proposal votes
    pub(crate) fn admit(&mut self) {
        self.is_registered = true;
        self.votes_received.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn test_airline_creation() {
        let airline = Airline::new(address(1));
        assert!(!airline.is_registered);
        assert!(!airline.is_funded);
        assert!(airline.funded_amount.is_zero());
        assert_eq!(airline.status(&Amount::from_ether(10)), AirlineStatus::Pending);

        let founder = Airline::founding(address(2));
        assert_eq!(founder.status(&Amount::from_ether(10)), AirlineStatus::Registered);
    }

    #[test]
    fn test_funding_flips_once() {
        let min = Amount::from_ether(10);
        let mut airline = Airline::founding(address(1));

        assert!(!airline.add_funding(&Amount::from_ether(4), &min));
        assert!(airline.add_funding(&Amount::from_ether(6), &min));
        assert!(!airline.add_funding(&Amount::from_ether(1), &min));

        assert!(airline.is_funded);
        assert_eq!(airline.funded_amount, Amount::from_ether(11));
        assert_eq!(airline.status(&min), AirlineStatus::Eligible);
    }

    #[test]
    fn test_votes_are_deduplicated() {
        let mut airline = Airline::new(address(1));
        assert!(airline.record_vote(address(2)));
        assert!(!airline.record_vote(address(2)));
        assert!(airline.record_vote(address(3)));
        assert_eq!(airline.vote_count(), 2);

        airline.admit();
        assert!(airline.is_registered);
        assert_eq!(airline.vote_count(), 0);
    }
}
