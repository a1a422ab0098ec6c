use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid byte length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Invalid hex quantity: {0}")]
    InvalidQuantity(String),

    #[error("Validator set must not be empty")]
    EmptyValidatorSet,

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
