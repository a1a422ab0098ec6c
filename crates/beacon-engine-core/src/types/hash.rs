use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CoreError;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const ZERO: $name = $name([0u8; $len]);
            pub const LEN: usize = $len;

            pub fn new(data: [u8; $len]) -> Self {
                $name(data)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn from_slice(slice: &[u8]) -> Result<Self, CoreError> {
                let bytes: [u8; $len] = slice.try_into().map_err(|_| CoreError::InvalidLength {
                    expected: $len,
                    got: slice.len(),
                })?;
                Ok($name(bytes))
            }

            /// Parse from hex, with or without the `0x` prefix
            pub fn from_hex(s: &str) -> Result<Self, CoreError> {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(digits)?;
                Self::from_slice(&bytes)
            }

            /// `0x`-prefixed lowercase hex
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                $name::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// A 32-byte value: block hashes, state roots and RANDAO mixes
    H256,
    32
);

fixed_bytes!(
    /// Opaque 8-byte identifier the execution node assigns to a payload build
    PayloadId,
    8
);

/// Execution block hash
pub type BlockHash = H256;

impl H256 {
    /// Fresh random value, used as the per-slot `prevRandao` seed
    pub fn random() -> Self {
        H256(rand::random())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0x3b8fb240d288781d4aac94d3fd16809ee413bc99294a085798a589dae51ddd4a";

    #[test]
    fn test_hex_with_and_without_prefix() {
        let prefixed = H256::from_hex(HASH).unwrap();
        let bare = H256::from_hex(HASH.trim_start_matches("0x")).unwrap();
        assert_eq!(prefixed, bare);
        assert_eq!(prefixed.to_hex(), HASH);
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        let err = H256::from_hex("0xdeadbeef").unwrap_err();
        assert!(matches!(err, CoreError::InvalidLength { expected: 32, got: 4 }));
        assert!(PayloadId::from_hex(HASH).is_err());
    }

    #[test]
    fn test_serde_uses_prefixed_hex() {
        let id = PayloadId::from_hex("0xa247243752eb10b4").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"0xa247243752eb10b4\"");
        let back: PayloadId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_random_values_differ() {
        assert_ne!(H256::random(), H256::random());
    }
}
