// airline-registry/src/voting.rs

use crate::airline::Airline;
use serde::{Deserialize, Serialize};
use surety_core::PolicyConfig;

/// Result of a registration attempt that was not rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationOutcome {
    /// Admitted without votes during the bootstrap phase
    Bootstrapped,
    /// Admitted by consensus
    Approved { votes: usize, required: usize },
    /// Not enough votes yet; the candidate stays pending
    Pending { votes: usize, required: usize },
    /// The candidate was already a member; nothing changed
    AlreadyRegistered,
}

impl RegistrationOutcome {
    /// Whether the candidate is a member after the call
    pub fn is_registered(&self) -> bool {
        !matches!(self, RegistrationOutcome::Pending { .. })
    }
}

/// Vote count for a candidate against the live consensus threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Distinct votes received
    pub votes: usize,
    /// Votes needed at the current membership size (0 during bootstrap)
    pub required: usize,
    /// Registered airlines at the time of the tally
    pub registered: usize,
}

impl Tally {
    /// Tally `candidate` with `registered` airlines currently admitted
    pub fn new(candidate: &Airline, registered: usize, policy: &PolicyConfig) -> Self {
        let required = if policy.is_bootstrap(registered) {
            0
        } else {
            policy.required_votes(registered)
        };

        Self {
            votes: candidate.vote_count(),
            required,
            registered,
        }
    }

    pub fn is_bootstrap(&self) -> bool {
        self.required == 0
    }

    pub fn is_approved(&self) -> bool {
        self.votes >= self.required
    }

    /// Outcome this tally yields for a registration attempt
    pub fn outcome(&self) -> RegistrationOutcome {
        if self.is_bootstrap() {
            RegistrationOutcome::Bootstrapped
        } else if self.is_approved() {
            RegistrationOutcome::Approved {
                votes: self.votes,
                required: self.required,
            }
        } else {
            RegistrationOutcome::Pending {
                votes: self.votes,
                required: self.required,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surety_crypto::Address;

    fn candidate_with_votes(votes: u8) -> Airline {
        let mut airline = Airline::new(Address::new([0xff; 20]));
        for n in 0..votes {
            airline.record_vote(Address::new([n; 20]));
        }
        airline
    }

    #[test]
    fn test_bootstrap_tally() {
        let policy = PolicyConfig::default();
        let tally = Tally::new(&candidate_with_votes(0), 3, &policy);
        assert!(tally.is_bootstrap());
        assert_eq!(tally.outcome(), RegistrationOutcome::Bootstrapped);
    }

    #[test]
    fn test_consensus_tally() {
        let policy = PolicyConfig::default();

        let tally = Tally::new(&candidate_with_votes(2), 5, &policy);
        assert_eq!(tally.outcome(), RegistrationOutcome::Pending { votes: 2, required: 3 });
        assert!(!tally.outcome().is_registered());

        let tally = Tally::new(&candidate_with_votes(3), 5, &policy);
        assert_eq!(tally.outcome(), RegistrationOutcome::Approved { votes: 3, required: 3 });
        assert!(tally.outcome().is_registered());
    }

    #[test]
    fn test_fifth_airline_needs_two_of_four() {
        let policy = PolicyConfig::default();
        let tally = Tally::new(&candidate_with_votes(1), 4, &policy);
        assert_eq!(tally.required, 2);
        assert!(!tally.is_approved());
    }
}
