use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use beacon_engine_consensus::{EngineConfig, GenesisAnchor, TuningParams};
use beacon_engine_core::fallback_address;
use beacon_engine_rpc::execution::{DEFAULT_BLOCK_PERIOD_METHOD, DEFAULT_VALIDATORS_METHOD};
use beacon_engine_rpc::ChainMethods;
use serde::{Deserialize, Serialize};

pub const DEFAULT_STATUS_PORT: u16 = 9100;

/// Where slot 0 starts, as written in the config file: `"start"`,
/// `"chain"`, or a unix timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenesisSetting {
    Timestamp(u64),
    Keyword(GenesisKeyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenesisKeyword {
    Start,
    Chain,
}

impl From<GenesisSetting> for GenesisAnchor {
    fn from(setting: GenesisSetting) -> Self {
        match setting {
            GenesisSetting::Timestamp(ts) => GenesisAnchor::Timestamp(ts),
            GenesisSetting::Keyword(GenesisKeyword::Start) => GenesisAnchor::Start,
            GenesisSetting::Keyword(GenesisKeyword::Chain) => GenesisAnchor::Chain,
        }
    }
}

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Authenticated Engine API endpoint
    pub engine_url: String,

    /// Plain JSON-RPC endpoint of the execution node
    pub rpc_url: String,

    /// Hex-encoded 32-byte JWT secret file
    pub jwt_secret_path: PathBuf,

    /// Slot duration in milliseconds, 0 to detect from the chain
    pub slot_duration_ms: u64,

    pub genesis: GenesisSetting,

    pub slots_per_epoch: u64,

    /// Local validator identity
    pub validator_address: String,

    /// Defaults to the validator address when empty
    pub fee_recipient: String,

    pub default_validator_count: usize,
    pub min_validators: usize,
    pub max_validators: usize,

    /// Per-call deadline in milliseconds, 0 for a third of the slot
    pub request_timeout_ms: u64,

    pub track_chain_height: bool,

    /// Stats log interval, 0 disables periodic reports
    pub stats_interval_secs: u64,

    /// Bind address of the HTTP status endpoint
    pub status_addr: Option<SocketAddr>,

    /// Chain method reporting the block period in seconds
    pub block_period_method: String,

    /// Chain method listing validators
    pub validators_method: String,

    pub finality_depth: u64,
    pub min_stake: u64,
    pub block_reward: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        NodeConfig {
            engine_url: "http://127.0.0.1:8551".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            jwt_secret_path: PathBuf::from("jwt.hex"),
            slot_duration_ms: 0,
            genesis: GenesisSetting::Keyword(GenesisKeyword::Start),
            slots_per_epoch: engine.slots_per_epoch,
            validator_address: engine.identity,
            fee_recipient: String::new(),
            default_validator_count: engine.default_validator_count,
            min_validators: engine.min_validators,
            max_validators: engine.max_validators,
            request_timeout_ms: 0,
            track_chain_height: engine.track_chain_height,
            stats_interval_secs: 30,
            status_addr: None,
            block_period_method: DEFAULT_BLOCK_PERIOD_METHOD.to_string(),
            validators_method: DEFAULT_VALIDATORS_METHOD.to_string(),
            finality_depth: 0,
            min_stake: 0,
            block_reward: 0,
        }
    }
}

impl NodeConfig {
    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Build the immutable engine configuration
    pub fn to_engine_config(&self) -> Result<EngineConfig> {
        if self.engine_url.trim().is_empty() || self.rpc_url.trim().is_empty() {
            bail!("engine_url and rpc_url must both be set");
        }

        let fee_recipient = if self.fee_recipient.trim().is_empty() {
            self.validator_address.clone()
        } else {
            self.fee_recipient.clone()
        };

        let engine = EngineConfig {
            slot_duration: non_zero_millis(self.slot_duration_ms),
            genesis: self.genesis.into(),
            slots_per_epoch: self.slots_per_epoch,
            identity: self.validator_address.clone(),
            fee_recipient,
            default_validator_count: self.default_validator_count,
            min_validators: self.min_validators,
            max_validators: self.max_validators,
            request_timeout: non_zero_millis(self.request_timeout_ms),
            track_chain_height: self.track_chain_height,
            tuning: TuningParams {
                finality_depth: self.finality_depth,
                min_stake: self.min_stake,
                block_reward: self.block_reward,
            },
        };
        engine.validate()?;
        Ok(engine)
    }

    pub fn chain_methods(&self) -> ChainMethods {
        ChainMethods {
            block_period: self.block_period_method.clone(),
            validators: self.validators_method.clone(),
        }
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Generate a sample configuration for a local devnet
pub fn generate_sample_config() -> NodeConfig {
    NodeConfig {
        validator_address: fallback_address(1),
        status_addr: Some(SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_STATUS_PORT))),
        ..Default::default()
    }
}
