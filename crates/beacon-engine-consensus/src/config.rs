use std::time::Duration;

use beacon_engine_core::fallback_address;

use crate::error::ConsensusError;

/// Used when the slot duration is left to auto-detection and the execution
/// node cannot report its block period.
pub const DEFAULT_SLOT_DURATION: Duration = Duration::from_secs(12);
/// Longest slot duration accepted from configuration or the chain
pub const MAX_SLOT_DURATION: Duration = Duration::from_secs(86_400);
pub const DEFAULT_SLOTS_PER_EPOCH: u64 = 32;
pub const DEFAULT_VALIDATOR_COUNT: usize = 4;

/// Upper bound on the wait between `forkchoiceUpdated` and `getPayload`
pub const MAX_BUILD_WAIT: Duration = Duration::from_secs(2);

/// Deadline for one-off startup probes (block period, genesis block)
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Where slot 0 starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenesisAnchor {
    /// Slot 0 starts when the engine starts
    Start,
    /// Slot 0 starts at the execution node's genesis block timestamp
    Chain,
    /// Slot 0 starts at this unix timestamp (seconds)
    Timestamp(u64),
}

/// Values that only feed startup logging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TuningParams {
    pub finality_depth: u64,
    pub min_stake: u64,
    pub block_reward: u64,
}

/// Immutable engine configuration, built once at startup and shared
/// read-only by every component
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `None` means auto-detect from the execution node
    pub slot_duration: Option<Duration>,
    pub genesis: GenesisAnchor,
    pub slots_per_epoch: u64,
    /// Address of the local validator
    pub identity: String,
    pub fee_recipient: String,
    /// Size of the stand-in validator set used when the live list is unavailable
    pub default_validator_count: usize,
    pub min_validators: usize,
    pub max_validators: usize,
    /// `None` derives the deadline from the slot duration
    pub request_timeout: Option<Duration>,
    /// Poll the chain head on slots where we do not propose
    pub track_chain_height: bool,
    pub tuning: TuningParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let identity = fallback_address(1);
        EngineConfig {
            slot_duration: None,
            genesis: GenesisAnchor::Start,
            slots_per_epoch: DEFAULT_SLOTS_PER_EPOCH,
            fee_recipient: identity.clone(),
            identity,
            default_validator_count: DEFAULT_VALIDATOR_COUNT,
            min_validators: 1,
            max_validators: 64,
            request_timeout: None,
            track_chain_height: true,
            tuning: TuningParams::default(),
        }
    }
}

/// Per-slot time budget, fixed once the slot duration is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTiming {
    pub slot_duration: Duration,
    /// Deadline for each remote call; strictly shorter than a slot
    pub request_timeout: Duration,
    /// Time the execution node gets to build before `getPayload`
    pub build_wait: Duration,
}

impl EngineConfig {
    /// Checks that do not depend on the resolved slot duration
    pub fn validate(&self) -> Result<(), ConsensusError> {
        if self.identity.trim().is_empty() {
            return Err(ConsensusError::Config(
                "validator identity must be set".to_string(),
            ));
        }
        if self.fee_recipient.trim().is_empty() {
            return Err(ConsensusError::Config(
                "fee recipient must be set".to_string(),
            ));
        }
        if self.slots_per_epoch == 0 {
            return Err(ConsensusError::Config(
                "slots per epoch must be at least 1".to_string(),
            ));
        }
        if self.default_validator_count == 0 {
            return Err(ConsensusError::Config(
                "default validator count must be at least 1".to_string(),
            ));
        }
        if self.min_validators == 0 || self.min_validators > self.max_validators {
            return Err(ConsensusError::Config(format!(
                "invalid validator bounds: min {} max {}",
                self.min_validators, self.max_validators
            )));
        }
        if !(self.min_validators..=self.max_validators).contains(&self.default_validator_count) {
            return Err(ConsensusError::Config(format!(
                "default validator count {} outside bounds {}..={}",
                self.default_validator_count, self.min_validators, self.max_validators
            )));
        }
        if self.slot_duration == Some(Duration::ZERO) {
            return Err(ConsensusError::Config(
                "slot duration must be non-zero when set".to_string(),
            ));
        }
        if self.slot_duration.is_some_and(|d| d > MAX_SLOT_DURATION) {
            return Err(ConsensusError::Config(format!(
                "slot duration must not exceed {:?}",
                MAX_SLOT_DURATION
            )));
        }
        Ok(())
    }

    /// Derive the per-slot time budget for a resolved slot duration
    pub fn timing(&self, slot_duration: Duration) -> Result<SlotTiming, ConsensusError> {
        if slot_duration.is_zero() {
            return Err(ConsensusError::Config(
                "slot duration must be non-zero".to_string(),
            ));
        }

        let request_timeout = match self.request_timeout {
            Some(timeout) if timeout.is_zero() || timeout >= slot_duration => {
                return Err(ConsensusError::Config(format!(
                    "request timeout {timeout:?} must be non-zero and shorter than the slot duration {slot_duration:?}"
                )));
            }
            Some(timeout) => timeout,
            None => slot_duration / 3,
        };

        Ok(SlotTiming {
            slot_duration,
            request_timeout,
            build_wait: (slot_duration / 4).min(MAX_BUILD_WAIT),
        })
    }

    pub fn epoch_of(&self, slot: u64) -> u64 {
        slot / self.slots_per_epoch
    }
}
