//! Per-slot Engine API handshake.
//!
//! On a local proposer slot the coordinator drives the slot through
//! `Idle -> HeadUpdated -> PayloadBuilt -> PayloadSubmitted -> Committed`,
//! or into `Failed` from any of those phases. A slot always reaches one of
//! the two terminal phases before the next slot is considered.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use beacon_engine_core::{
    BlockHash, ForkChoiceState, PayloadAttributes, PayloadStatusKind, Shutdown, ValidatorSet,
    H256,
};
use beacon_engine_rpc::{BlockTag, ErrorKind, ExecutionClient, RpcError};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, SlotTiming};
use crate::directory::ValidatorDirectory;
use crate::events::EngineEventSink;
use crate::proposer::{is_local, proposer_for};
use crate::scheduler::SlotTick;
use crate::stats::StatsCollector;

/// The head the engine builds on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadState {
    pub fork_choice: ForkChoiceState,
    pub number: u64,
    pub timestamp: u64,
}

impl HeadState {
    pub fn head(&self) -> BlockHash {
        self.fork_choice.head_block_hash
    }
}

/// Phases of a proposer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    Idle,
    HeadUpdated,
    PayloadBuilt,
    PayloadSubmitted,
    Committed,
    Failed,
}

impl fmt::Display for SlotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotPhase::Idle => "idle",
            SlotPhase::HeadUpdated => "head-updated",
            SlotPhase::PayloadBuilt => "payload-built",
            SlotPhase::PayloadSubmitted => "payload-submitted",
            SlotPhase::Committed => "committed",
            SlotPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a proposer slot failed
#[derive(Debug, Clone, Error)]
pub enum SlotFailure {
    #[error("Head unavailable: {0}")]
    HeadUnavailable(String),

    #[error("forkchoiceUpdated returned {0}")]
    ForkchoiceStatus(PayloadStatusKind),

    #[error("forkchoiceUpdated returned no payload id")]
    MissingPayloadId,

    #[error("newPayload returned {0}")]
    PayloadStatus(PayloadStatusKind),

    #[error("Interrupted by shutdown")]
    Interrupted,

    #[error("Proposer selection failed: {0}")]
    Selection(String),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
}

/// Result of processing one slot
#[derive(Debug, Clone)]
pub enum SlotOutcome {
    /// Another validator proposes; nothing was sent to the engine
    NotProposer { proposer: String },
    Committed {
        block_hash: BlockHash,
        block_number: u64,
    },
    Failed {
        /// Last phase reached before the failure
        failed_at: SlotPhase,
        reason: SlotFailure,
    },
}

impl SlotFailure {
    /// The Engine API refused our credentials: a bad secret or a clock
    /// skew larger than the token tolerance
    pub fn is_auth_failure(&self) -> bool {
        match self {
            SlotFailure::Rpc(e) => {
                e.kind() == ErrorKind::Auth || matches!(e, RpcError::HttpStatus(401 | 403))
            }
            _ => false,
        }
    }
}

fn fail(failed_at: SlotPhase, reason: impl Into<SlotFailure>) -> SlotOutcome {
    SlotOutcome::Failed {
        failed_at,
        reason: reason.into(),
    }
}

/// Runs the forkchoiceUpdated / getPayload / newPayload handshake on the
/// slots this node proposes, and owns the current fork-choice head.
pub struct ForkChoiceCoordinator<E: ExecutionClient> {
    client: Arc<E>,
    config: Arc<EngineConfig>,
    timing: SlotTiming,
    directory: ValidatorDirectory<E>,
    head: Option<HeadState>,
    stats: Arc<StatsCollector>,
    event_sink: Option<Arc<dyn EngineEventSink>>,
    shutdown: Shutdown,
}

impl<E: ExecutionClient> ForkChoiceCoordinator<E> {
    pub fn new(
        client: Arc<E>,
        config: Arc<EngineConfig>,
        timing: SlotTiming,
        directory: ValidatorDirectory<E>,
        stats: Arc<StatsCollector>,
        shutdown: Shutdown,
    ) -> Self {
        ForkChoiceCoordinator {
            client,
            config,
            timing,
            directory,
            head: None,
            stats,
            event_sink: None,
            shutdown,
        }
    }

    /// Set event sink for slot notifications
    pub fn set_event_sink(&mut self, sink: Arc<dyn EngineEventSink>) {
        self.event_sink = Some(sink);
    }

    /// Current head, once known
    pub fn head(&self) -> Option<&HeadState> {
        self.head.as_ref()
    }

    /// Process one slot tick to a terminal outcome
    pub async fn process_slot(&mut self, tick: &SlotTick) -> SlotOutcome {
        let started = Instant::now();

        if tick.skipped > 0 {
            self.stats.record_skipped(tick.skipped).await;
        }

        let validators: ValidatorSet = self.directory.validators_for(tick.slot).await.clone();

        let outcome = match proposer_for(tick.slot, &validators) {
            Err(e) => fail(SlotPhase::Idle, SlotFailure::Selection(e.to_string())),
            Ok(proposer) if is_local(proposer, &self.config.identity) => {
                info!("Slot {}: proposing as {}", tick.slot, proposer);
                self.propose(tick).await
            }
            Ok(proposer) => {
                debug!("Slot {}: proposer is {}", tick.slot, proposer);
                let outcome = SlotOutcome::NotProposer {
                    proposer: proposer.to_string(),
                };
                self.observe_chain().await;
                outcome
            }
        };

        let elapsed = started.elapsed();
        self.finish(tick, &outcome, elapsed).await;
        outcome
    }

    async fn finish(&self, tick: &SlotTick, outcome: &SlotOutcome, elapsed: Duration) {
        match outcome {
            SlotOutcome::Committed {
                block_hash,
                block_number,
            } => {
                info!(
                    "Slot {}: committed block #{} {} in {:?}",
                    tick.slot, block_number, block_hash, elapsed
                );
            }
            SlotOutcome::Failed { failed_at, reason } if reason.is_auth_failure() => {
                error!(
                    "Slot {}: Engine API authentication failed after phase {}: {}. Check the JWT secret shared with the execution node",
                    tick.slot, failed_at, reason
                );
            }
            SlotOutcome::Failed { failed_at, reason } => {
                error!(
                    "Slot {}: missed after phase {}: {}",
                    tick.slot, failed_at, reason
                );
            }
            SlotOutcome::NotProposer { .. } => {}
        }

        self.stats.record_slot(tick.slot, outcome, elapsed).await;

        if let Some(sink) = &self.event_sink {
            sink.on_slot_processed(tick, outcome, elapsed);
        }
    }

    async fn propose(&mut self, tick: &SlotTick) -> SlotOutcome {
        let timeout = self.timing.request_timeout;

        // Idle: make sure there is a head to build on
        let head = match self.head {
            Some(head) => head,
            None => match self.bootstrap_head().await {
                Ok(head) => head,
                Err(reason) => return fail(SlotPhase::Idle, reason),
            },
        };

        let attributes = PayloadAttributes {
            timestamp: tick.timestamp.max(head.timestamp.saturating_add(1)),
            prev_randao: H256::random(),
            suggested_fee_recipient: self.config.fee_recipient.clone(),
            withdrawals: Vec::new(),
        };

        // Idle -> HeadUpdated
        let response = match self
            .client
            .forkchoice_updated(head.fork_choice, Some(attributes), timeout)
            .await
        {
            Ok(response) => response,
            Err(e) => return fail(SlotPhase::Idle, e),
        };
        if !response.payload_status.is_valid() {
            if let Some(validation_error) = &response.payload_status.validation_error {
                warn!("forkchoiceUpdated rejected head {}: {}", head.head(), validation_error);
            }
            return fail(
                SlotPhase::HeadUpdated,
                SlotFailure::ForkchoiceStatus(response.payload_status.status),
            );
        }
        let Some(payload_id) = response.payload_id else {
            return fail(SlotPhase::HeadUpdated, SlotFailure::MissingPayloadId);
        };
        debug!("Slot {}: payload build started, id {}", tick.slot, payload_id);

        // Let the execution node build
        tokio::select! {
            biased;
            _ = self.shutdown.wait() => {
                return fail(SlotPhase::HeadUpdated, SlotFailure::Interrupted);
            }
            _ = tokio::time::sleep(self.timing.build_wait) => {}
        }

        // HeadUpdated -> PayloadBuilt
        let payload = match self.client.get_payload(payload_id, timeout).await {
            Ok(payload) => payload,
            Err(e) => return fail(SlotPhase::HeadUpdated, e),
        };
        if payload.parent_hash != head.head() {
            warn!(
                "Slot {}: payload parent {} differs from head {}",
                tick.slot,
                payload.parent_hash,
                head.head()
            );
        }

        // PayloadBuilt -> PayloadSubmitted
        let status = match self.client.new_payload(&payload, timeout).await {
            Ok(status) => status,
            Err(e) => return fail(SlotPhase::PayloadBuilt, e),
        };
        if !status.is_valid() {
            if let Some(validation_error) = &status.validation_error {
                warn!("newPayload rejected block {}: {}", payload.block_hash, validation_error);
            }
            return fail(
                SlotPhase::PayloadSubmitted,
                SlotFailure::PayloadStatus(status.status),
            );
        }

        // PayloadSubmitted -> Committed
        self.head = Some(HeadState {
            fork_choice: ForkChoiceState::at_head(payload.block_hash),
            number: payload.block_number,
            timestamp: payload.timestamp,
        });
        self.stats.set_chain_height(payload.block_number).await;

        SlotOutcome::Committed {
            block_hash: payload.block_hash,
            block_number: payload.block_number,
        }
    }

    async fn bootstrap_head(&mut self) -> Result<HeadState, SlotFailure> {
        let block = self
            .client
            .block_by_number(BlockTag::Latest, self.timing.request_timeout)
            .await
            .map_err(|e| SlotFailure::HeadUnavailable(e.to_string()))?
            .ok_or_else(|| SlotFailure::HeadUnavailable("no latest block".to_string()))?;

        info!("Bootstrapped head from chain: block #{} {}", block.number, block.hash);

        let head = HeadState {
            fork_choice: ForkChoiceState::at_head(block.hash),
            number: block.number,
            timestamp: block.timestamp,
        };
        self.head = Some(head);
        self.stats.set_chain_height(block.number).await;
        Ok(head)
    }

    async fn observe_chain(&self) {
        if !self.config.track_chain_height {
            return;
        }

        match self
            .client
            .block_by_number(BlockTag::Latest, self.timing.request_timeout)
            .await
        {
            Ok(Some(block)) => self.stats.set_chain_height(block.number).await,
            Ok(None) => debug!("Chain head unknown"),
            Err(e) => debug!("Chain height poll failed: {}", e),
        }
    }
}
