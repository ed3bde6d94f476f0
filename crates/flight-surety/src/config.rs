// flight-surety/src/config.rs
use crate::{SuretyError, SuretyResult};
use insurance_ledger::OracleConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use surety_core::PolicyConfig;
use surety_crypto::Address;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuretyConfig {
    /// Contract owner; controls the operational switch and status reporters
    pub owner: Address,
    /// Airline registered at deployment
    pub first_airline: Address,
    /// Operation log file used by the command line tool
    pub log_path: String,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
}

fn numbered_address(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = n;
    Address::new(bytes)
}

impl Default for SuretyConfig {
    fn default() -> Self {
        Self {
            owner: numbered_address(1),
            first_airline: numbered_address(2),
            log_path: "./surety.log".into(),
            policy: PolicyConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl SuretyConfig {
    pub fn validate(&self) -> SuretyResult<()> {
        if self.owner.is_zero() {
            return Err(SuretyError::Config("owner must not be the zero address".into()));
        }
        if self.first_airline.is_zero() {
            return Err(SuretyError::Config("first_airline must not be the zero address".into()));
        }
        self.policy.validate()?;
        self.oracle.validate()?;
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        // Every CLI run replays from scratch, so a fixed seed would repeat the same draws
        if config.oracle.seed.is_some() {
            return Err(SuretyError::Config(
                "oracle.seed is for in-process use only; remove it from the file".into(),
            )
            .into());
        }
        Ok(config)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
