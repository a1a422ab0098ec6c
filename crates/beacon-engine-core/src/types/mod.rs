pub mod engine;
pub mod hash;
pub mod validator;

pub use engine::{
    BlockSummary, ExecutionPayload, ForkChoiceState, ForkchoiceUpdatedResponse,
    GetPayloadResponse, PayloadAttributes, PayloadStatus, PayloadStatusKind, Withdrawal,
};
pub use hash::{BlockHash, PayloadId, H256};
pub use validator::{fallback_address, ValidatorRecord, ValidatorSet};

/// Logical time unit index
pub type Slot = u64;

/// Epoch index (a fixed run of slots)
pub type Epoch = u64;
