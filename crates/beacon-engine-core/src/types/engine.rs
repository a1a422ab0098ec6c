//! Engine API request and response shapes (Shanghai, `V2` methods).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::serialize::quantity;
use crate::types::hash::{BlockHash, PayloadId, H256};

/// Head/safe/finalized block identifiers handed to `engine_forkchoiceUpdatedV2`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkChoiceState {
    pub head_block_hash: BlockHash,
    pub safe_block_hash: BlockHash,
    pub finalized_block_hash: BlockHash,
}

impl ForkChoiceState {
    /// The latest block is treated as safe and final
    pub fn at_head(head: BlockHash) -> Self {
        ForkChoiceState {
            head_block_hash: head,
            safe_block_hash: head,
            finalized_block_hash: head,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    #[serde(with = "quantity")]
    pub index: u64,
    #[serde(with = "quantity")]
    pub validator_index: u64,
    pub address: String,
    #[serde(with = "quantity")]
    pub amount: u64,
}

/// Attributes for a payload build; built fresh for every proposing slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadAttributes {
    #[serde(with = "quantity")]
    pub timestamp: u64,
    pub prev_randao: H256,
    pub suggested_fee_recipient: String,
    pub withdrawals: Vec<Withdrawal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadStatusKind {
    Valid,
    Invalid,
    Syncing,
    Accepted,
    InvalidBlockHash,
}

impl fmt::Display for PayloadStatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PayloadStatusKind::Valid => "VALID",
            PayloadStatusKind::Invalid => "INVALID",
            PayloadStatusKind::Syncing => "SYNCING",
            PayloadStatusKind::Accepted => "ACCEPTED",
            PayloadStatusKind::InvalidBlockHash => "INVALID_BLOCK_HASH",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadStatus {
    pub status: PayloadStatusKind,
    #[serde(default)]
    pub latest_valid_hash: Option<BlockHash>,
    #[serde(default)]
    pub validation_error: Option<String>,
}

impl PayloadStatus {
    pub fn is_valid(&self) -> bool {
        self.status == PayloadStatusKind::Valid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkchoiceUpdatedResponse {
    pub payload_status: PayloadStatus,
    #[serde(default)]
    pub payload_id: Option<PayloadId>,
}

/// A built execution payload.
///
/// Only the fields the engine reads are typed; everything else is kept in
/// `rest` and sent back to `engine_newPayloadV2` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayload {
    pub parent_hash: BlockHash,
    pub block_hash: BlockHash,
    #[serde(with = "quantity")]
    pub block_number: u64,
    #[serde(with = "quantity")]
    pub timestamp: u64,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPayloadResponse {
    pub execution_payload: ExecutionPayload,
    #[serde(default)]
    pub block_value: Option<String>,
}

/// The subset of an `eth_getBlockByNumber` result the engine needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub hash: BlockHash,
    #[serde(with = "quantity")]
    pub number: u64,
    #[serde(with = "quantity")]
    pub timestamp: u64,
}
