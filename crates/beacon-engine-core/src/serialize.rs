use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

/// Parse a `0x`-prefixed hex quantity
pub fn parse_quantity(s: &str) -> Result<u64, CoreError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| CoreError::InvalidQuantity(s.to_string()))?;
    if digits.is_empty() {
        return Err(CoreError::InvalidQuantity(s.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|_| CoreError::InvalidQuantity(s.to_string()))
}

/// Format a value as a `0x`-prefixed hex quantity
pub fn format_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

/// Serde adapter for `u64` fields encoded as Engine API hex quantities
pub mod quantity {
    use super::*;

    pub fn serialize<S: serde::Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        format_quantity(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_quantity(&s).map_err(serde::de::Error::custom)
    }
}

/// Numbers reported by chain-introspection methods come back as JSON
/// numbers, decimal strings or hex quantities depending on the node.
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Int(u64),
    Float(f64),
    Text(String),
}

impl LooseNumber {
    fn into_u128(self) -> Result<u128, CoreError> {
        match self {
            LooseNumber::Int(n) => Ok(u128::from(n)),
            LooseNumber::Float(f) if f.is_finite() && f >= 0.0 => Ok(f as u128),
            LooseNumber::Float(f) => Err(CoreError::InvalidQuantity(f.to_string())),
            LooseNumber::Text(s) => {
                let trimmed = s.trim();
                let parsed = match trimmed.strip_prefix("0x") {
                    Some(digits) if !digits.is_empty() => u128::from_str_radix(digits, 16).ok(),
                    Some(_) => None,
                    None => trimmed.parse::<u128>().ok(),
                };
                parsed.ok_or(CoreError::InvalidQuantity(s))
            }
        }
    }
}

/// Deserialize a number that may be encoded as a JSON number, a decimal
/// string or a hex quantity
pub fn deserialize_loose_u128<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    LooseNumber::deserialize(deserializer)?
        .into_u128()
        .map_err(serde::de::Error::custom)
}

/// Optional variant of [`deserialize_loose_u128`]; `null` maps to `None`
pub fn deserialize_loose_u128_opt<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u128>, D::Error> {
    Option::<LooseNumber>::deserialize(deserializer)?
        .map(LooseNumber::into_u128)
        .transpose()
        .map_err(serde::de::Error::custom)
}

/// Decode a loosely encoded number out of an already parsed JSON value
pub fn loose_u64(value: serde_json::Value) -> Result<u64, CoreError> {
    let number: LooseNumber =
        serde_json::from_value(value).map_err(|e| CoreError::Deserialization(e.to_string()))?;
    let wide = number.into_u128()?;
    u64::try_from(wide).map_err(|_| CoreError::InvalidQuantity(wide.to_string()))
}
