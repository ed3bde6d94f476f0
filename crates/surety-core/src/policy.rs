// surety-core/src/policy.rs

use crate::{types::Amount, CoreError, CoreResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Policy constants shared by the airline registry and the insurance ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Stake an airline must contribute before it may vote, register airlines or flights
    pub min_funding: Amount,
    /// Largest premium a passenger may pay for one policy
    pub max_premium: Amount,
    /// Payout as a multiple of the premium on a late-airline delay
    pub payout_multiplier: Decimal,
    /// Registrations admitted without consensus
    pub bootstrap_airlines: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_funding: Amount::from_ether(10),
            max_premium: Amount::from_ether(1),
            payout_multiplier: Decimal::new(15, 1), // 1.5x
            bootstrap_airlines: 4,
        }
    }
}

impl PolicyConfig {
    /// Reject configurations that would break the funding or payout invariants
    pub fn validate(&self) -> CoreResult<()> {
        if self.min_funding.is_zero() {
            return Err(CoreError::InvalidPolicy("min_funding must be positive".into()));
        }
        if self.max_premium.is_zero() {
            return Err(CoreError::InvalidPolicy("max_premium must be positive".into()));
        }
        if self.payout_multiplier <= Decimal::ZERO {
            return Err(CoreError::InvalidPolicy(format!(
                "payout_multiplier must be positive, got {}",
                self.payout_multiplier
            )));
        }
        Ok(())
    }

    /// Whether a registration with `registered` airlines already admitted skips consensus
    pub fn is_bootstrap(&self, registered: usize) -> bool {
        registered < self.bootstrap_airlines
    }

    /// Votes needed to admit a candidate: half the registered airlines, rounded up
    pub fn required_votes(&self, registered: usize) -> usize {
        registered.div_ceil(2)
    }

    /// Credit owed on a late-airline delay for `premium`
    pub fn payout_for(&self, premium: &Amount) -> Amount {
        premium.mul_decimal(&self.payout_multiplier)
    }
}
