#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use beacon_engine_core::{
    BlockSummary, ExecutionPayload, ForkChoiceState, ForkchoiceUpdatedResponse, PayloadAttributes,
    PayloadId, PayloadStatus, PayloadStatusKind, ValidatorRecord, H256,
};
use beacon_engine_rpc::{BlockTag, ExecutionClient, RpcError};

/// A call the engine made, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ForkchoiceUpdated(ForkChoiceState, Option<PayloadAttributes>),
    GetPayload(PayloadId),
    NewPayload(H256),
    BlockByNumber(BlockTag),
    BlockPeriod,
    Validators,
}

impl Call {
    pub fn is_engine(&self) -> bool {
        matches!(
            self,
            Call::ForkchoiceUpdated(..) | Call::GetPayload(_) | Call::NewPayload(_)
        )
    }
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    forkchoice: VecDeque<Result<ForkchoiceUpdatedResponse, RpcError>>,
    get_payload_errors: VecDeque<RpcError>,
    new_payload: VecDeque<Result<PayloadStatus, RpcError>>,
    validators: Option<Result<Vec<ValidatorRecord>, RpcError>>,
    block_period: Option<Result<u64, RpcError>>,
    latest: Option<BlockSummary>,
    genesis_timestamp: Option<u64>,
    next_block: u64,
}

/// Scripted in-memory execution node that records every call
#[derive(Clone, Default)]
pub struct MockExecution {
    script: Arc<Mutex<Script>>,
}

pub fn status(kind: PayloadStatusKind) -> PayloadStatus {
    PayloadStatus {
        status: kind,
        latest_valid_hash: None,
        validation_error: None,
    }
}

pub fn forkchoice(kind: PayloadStatusKind, payload_id: Option<u64>) -> ForkchoiceUpdatedResponse {
    ForkchoiceUpdatedResponse {
        payload_status: status(kind),
        payload_id: payload_id.map(|id| PayloadId::new(id.to_be_bytes())),
    }
}

/// Deterministic hash for block `number` built by the mock
pub fn block_hash(number: u64) -> H256 {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    bytes[0] = 0xbb;
    H256::new(bytes)
}

pub fn genesis_hash() -> H256 {
    H256::new([0x11; 32])
}

pub fn records(addresses: &[&str]) -> Vec<ValidatorRecord> {
    addresses
        .iter()
        .map(|address| ValidatorRecord {
            address: address.to_string(),
            stake: None,
            active: true,
        })
        .collect()
}

impl MockExecution {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.set_latest(BlockSummary {
            hash: genesis_hash(),
            number: 0,
            timestamp: 1_000,
        });
        mock.script().next_block = 1;
        mock
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn set_latest(&self, block: BlockSummary) {
        self.script().latest = Some(block);
    }

    pub fn clear_latest(&self) {
        self.script().latest = None;
    }

    pub fn set_validators(&self, result: Result<Vec<ValidatorRecord>, RpcError>) {
        self.script().validators = Some(result);
    }

    pub fn set_block_period(&self, result: Result<u64, RpcError>) {
        self.script().block_period = Some(result);
    }

    pub fn set_genesis_timestamp(&self, timestamp: u64) {
        self.script().genesis_timestamp = Some(timestamp);
    }

    pub fn push_forkchoice(&self, result: Result<ForkchoiceUpdatedResponse, RpcError>) {
        self.script().forkchoice.push_back(result);
    }

    /// Fail the next getPayload call with `error`
    pub fn push_get_payload_error(&self, error: RpcError) {
        self.script().get_payload_errors.push_back(error);
    }

    pub fn push_new_payload(&self, result: Result<PayloadStatus, RpcError>) {
        self.script().new_payload.push_back(result);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script().calls.clone()
    }

    pub fn engine_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_engine).collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.script().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Head hashes sent in forkchoiceUpdated, in call order
    pub fn forkchoice_heads(&self) -> Vec<H256> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::ForkchoiceUpdated(state, _) => Some(state.head_block_hash),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ExecutionClient for MockExecution {
    async fn forkchoice_updated(
        &self,
        state: ForkChoiceState,
        attributes: Option<PayloadAttributes>,
        _timeout: Duration,
    ) -> Result<ForkchoiceUpdatedResponse, RpcError> {
        let mut script = self.script();
        script.calls.push(Call::ForkchoiceUpdated(state, attributes));
        script
            .forkchoice
            .pop_front()
            .unwrap_or_else(|| Ok(forkchoice(PayloadStatusKind::Valid, Some(1))))
    }

    async fn get_payload(
        &self,
        payload_id: PayloadId,
        _timeout: Duration,
    ) -> Result<ExecutionPayload, RpcError> {
        let mut script = self.script();
        script.calls.push(Call::GetPayload(payload_id));
        if let Some(error) = script.get_payload_errors.pop_front() {
            return Err(error);
        }

        let parent = script.latest.unwrap_or(BlockSummary {
            hash: genesis_hash(),
            number: 0,
            timestamp: 1_000,
        });
        let number = script.next_block;
        Ok(ExecutionPayload {
            parent_hash: parent.hash,
            block_hash: block_hash(number),
            block_number: number,
            timestamp: parent.timestamp + 1,
            rest: Default::default(),
        })
    }

    async fn new_payload(
        &self,
        payload: &ExecutionPayload,
        _timeout: Duration,
    ) -> Result<PayloadStatus, RpcError> {
        let mut script = self.script();
        script.calls.push(Call::NewPayload(payload.block_hash));

        let result = script
            .new_payload
            .pop_front()
            .unwrap_or_else(|| Ok(status(PayloadStatusKind::Valid)));
        if matches!(&result, Ok(s) if s.is_valid()) {
            script.latest = Some(BlockSummary {
                hash: payload.block_hash,
                number: payload.block_number,
                timestamp: payload.timestamp,
            });
            script.next_block = payload.block_number + 1;
        }
        result
    }

    async fn block_by_number(
        &self,
        tag: BlockTag,
        _timeout: Duration,
    ) -> Result<Option<BlockSummary>, RpcError> {
        let mut script = self.script();
        script.calls.push(Call::BlockByNumber(tag));
        Ok(match tag {
            BlockTag::Latest => script.latest,
            BlockTag::Number(0) => script.genesis_timestamp.map(|timestamp| BlockSummary {
                hash: genesis_hash(),
                number: 0,
                timestamp,
            }),
            BlockTag::Number(_) => None,
        })
    }

    async fn block_period(&self, _timeout: Duration) -> Result<u64, RpcError> {
        let mut script = self.script();
        script.calls.push(Call::BlockPeriod);
        script
            .block_period
            .clone()
            .unwrap_or_else(|| Err(RpcError::Protocol {
                code: -32601,
                message: "method not found".to_string(),
            }))
    }

    async fn validators(&self, _timeout: Duration) -> Result<Vec<ValidatorRecord>, RpcError> {
        let mut script = self.script();
        script.calls.push(Call::Validators);
        script
            .validators
            .clone()
            .unwrap_or_else(|| Err(RpcError::Transport("connection refused".to_string())))
    }
}
