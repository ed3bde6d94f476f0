// insurance-ledger/src/policy.rs

use crate::flight::FlightKey;
use serde::{Deserialize, Serialize};
use surety_core::Amount;
use surety_crypto::Address;

/// A passenger's insurance on one flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    /// Insured passenger
    pub passenger: Address,
    /// Premium paid at purchase
    pub premium_paid: Amount,
    /// Credit owed after a late-airline delay, zero until credited
    pub payout_credit: Amount,
    /// Whether the credit has been withdrawn
    pub claimed: bool,
}

impl InsurancePolicy {
    pub fn new(passenger: Address, premium: Amount) -> Self {
        Self {
            passenger,
            premium_paid: premium,
            payout_credit: Amount::zero(),
            claimed: false,
        }
    }

    pub fn has_credit(&self) -> bool {
        !self.payout_credit.is_zero()
    }

    /// Credit `amount` unless the policy was already credited or claimed.
    /// Returns whether the credit was applied.
    pub fn credit(&mut self, amount: Amount) -> bool {
        if self.claimed || self.has_credit() {
            return false;
        }
        self.payout_credit = amount;
        true
    }

    /// Move the credit out and mark the policy claimed
    pub(crate) fn settle(&mut self) -> Amount {
        self.claimed = true;
        std::mem::take(&mut self.payout_credit)
    }
}

/// One policy's share of a withdrawal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutClaim {
    pub flight: FlightKey,
    pub amount: Amount,
}

/// Settled withdrawal, handed to the funds-transfer mechanism
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    /// Recipient
    pub passenger: Address,
    /// Total to transfer
    pub amount: Amount,
    /// Per-flight breakdown
    pub claims: Vec<PayoutClaim>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_once() {
        let mut policy = InsurancePolicy::new(Address::zero(), Amount::from_ether(1));
        assert!(!policy.has_credit());

        assert!(policy.credit(Amount::parse_ether("1.5").unwrap()));
        assert!(!policy.credit(Amount::from_ether(3)));
        assert_eq!(policy.payout_credit, Amount::parse_ether("1.5").unwrap());
    }

    #[test]
    fn test_settle_zeroes_credit() {
        let mut policy = InsurancePolicy::new(Address::zero(), Amount::from_ether(1));
        policy.credit(Amount::parse_ether("1.5").unwrap());

        let paid = policy.settle();
        assert_eq!(paid, Amount::parse_ether("1.5").unwrap());
        assert!(policy.claimed);
        assert!(!policy.has_credit());

        // A claimed policy is never credited again
        assert!(!policy.credit(Amount::from_ether(1)));
    }
}
