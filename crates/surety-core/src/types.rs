// surety-core/src/types.rs

use crate::{CoreError, CoreResult};
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::Add;
use std::str::FromStr;

/// Timestamp in Unix epoch seconds
pub type Timestamp = u64;

/// Decimal places between ether and wei
pub const ETHER_DECIMALS: u32 = 18;

/// Token amount in wei (arbitrary precision, covers the full uint256 range)
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigUint);

impl Amount {
    pub fn new(value: BigUint) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(BigUint::from(value))
    }

    /// Whole ether, 1 ether = 10^18 wei
    pub fn from_ether(ether: u64) -> Self {
        Self(BigUint::from(ether) * wei_per_ether())
    }

    /// Parse a decimal ether string such as `"10"` or `"0.25"`
    pub fn parse_ether(s: &str) -> CoreResult<Self> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| CoreError::InvalidAmount(format!("{s}: {e}")))?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(CoreError::InvalidAmount(format!("{s}: negative amount")));
        }
        let scale = value.scale();
        if scale > ETHER_DECIMALS {
            return Err(CoreError::InvalidAmount(format!(
                "{s}: more than {ETHER_DECIMALS} decimal places"
            )));
        }
        let mantissa = BigUint::from(value.mantissa().unsigned_abs());
        Ok(Self(mantissa * BigUint::from(10u64).pow(ETHER_DECIMALS - scale)))
    }

    pub fn inner(&self) -> &BigUint {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_u128(&self) -> Option<u128> {
        self.0.to_u128()
    }

    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        Some(Amount(&self.0 + &other.0))
    }

    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if self.0 < other.0 {
            None
        } else {
            Some(Amount(&self.0 - &other.0))
        }
    }

    /// Multiply by a decimal factor, rounding down to whole wei.
    ///
    /// The sign of `factor` is ignored; `PolicyConfig::validate` rejects
    /// negative multipliers before they reach this point.
    pub fn mul_decimal(&self, factor: &Decimal) -> Amount {
        let numerator = BigUint::from(factor.mantissa().unsigned_abs());
        let denominator = BigUint::from(10u64).pow(factor.scale());
        Amount((&self.0 * numerator) / denominator)
    }

    /// Render as ether with trailing zeros trimmed, e.g. `"1.5"`
    pub fn to_ether_string(&self) -> String {
        let unit = wei_per_ether();
        let whole = &self.0 / &unit;
        let frac = &self.0 % &unit;
        if frac.is_zero() {
            return whole.to_string();
        }
        let frac = format!("{:0>width$}", frac.to_string(), width = ETHER_DECIMALS as usize);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

fn wei_per_ether() -> BigUint {
    BigUint::from(10u64).pow(ETHER_DECIMALS)
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, other: Amount) -> Amount {
        Amount(self.0 + other.0)
    }
}

impl<'a> Add<&'a Amount> for &'a Amount {
    type Output = Amount;

    fn add(self, other: &'a Amount) -> Amount {
        Amount(&self.0 + &other.0)
    }
}

impl<'a> std::iter::Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, a| Amount(acc.0 + &a.0))
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Amounts travel as decimal wei strings so TOML and JSON stay readable
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<BigUint>()
            .map(Amount)
            .map_err(serde::de::Error::custom)
    }
}
