use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::serialize::deserialize_loose_u128_opt;

/// A validator entry as reported by the execution node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    pub address: String,
    #[serde(default, deserialize_with = "deserialize_loose_u128_opt")]
    pub stake: Option<u128>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Ordered, non-empty list of validator addresses.
///
/// Order matters: the proposer for a slot is looked up by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatorSet {
    validators: Vec<String>,
}

impl ValidatorSet {
    pub fn new(validators: Vec<String>) -> Result<Self, CoreError> {
        if validators.is_empty() {
            return Err(CoreError::EmptyValidatorSet);
        }
        Ok(ValidatorSet { validators })
    }

    /// Active validators from a live listing, in reported order
    pub fn from_records(records: &[ValidatorRecord]) -> Result<Self, CoreError> {
        let validators = records
            .iter()
            .filter(|record| record.active && !record.address.trim().is_empty())
            .map(|record| record.address.trim().to_string())
            .collect();
        Self::new(validators)
    }

    /// Deterministic stand-in set of `count` addresses `0x…01` through
    /// `0x…{count}`
    pub fn fallback(count: usize) -> Result<Self, CoreError> {
        Self::new((1..=count).map(fallback_address).collect())
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.validators.get(index).map(String::as_str)
    }

    /// Index of `address`, compared ASCII case-insensitively
    pub fn position_of(&self, address: &str) -> Option<usize> {
        self.validators
            .iter()
            .position(|validator| validator.eq_ignore_ascii_case(address))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.validators.iter().map(String::as_str)
    }
}

/// The `index`-th fallback address (1-based), as 20 bytes of hex
pub fn fallback_address(index: usize) -> String {
    format!("0x{index:040x}")
}
