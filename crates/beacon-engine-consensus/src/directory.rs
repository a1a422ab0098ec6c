use std::sync::Arc;
use std::time::Duration;

use beacon_engine_core::{Epoch, Slot, ValidatorSet};
use beacon_engine_rpc::ExecutionClient;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::ConsensusError;

/// Where the current validator set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetSource {
    Live,
    Fallback,
}

#[derive(Debug, Clone)]
struct CachedSet {
    epoch: Epoch,
    set: ValidatorSet,
    source: SetSource,
}

/// Resolves the active validator set, refreshed at most once per epoch.
///
/// Refreshing never fails: when the live listing is unreachable, malformed,
/// empty or outside the configured size bounds, the deterministic fallback
/// set is used instead.
pub struct ValidatorDirectory<E: ExecutionClient> {
    client: Arc<E>,
    config: Arc<EngineConfig>,
    timeout: Duration,
    fallback: ValidatorSet,
    cached: Option<CachedSet>,
}

impl<E: ExecutionClient> ValidatorDirectory<E> {
    pub fn new(
        client: Arc<E>,
        config: Arc<EngineConfig>,
        timeout: Duration,
    ) -> Result<Self, ConsensusError> {
        let fallback = ValidatorSet::fallback(config.default_validator_count)?;
        Ok(ValidatorDirectory {
            client,
            config,
            timeout,
            fallback,
            cached: None,
        })
    }

    /// Query the live validator list, falling back to the default set
    pub async fn refresh(&self) -> (ValidatorSet, SetSource) {
        let records = match self.client.validators(self.timeout).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Validator list unavailable, using {} default validators: {}", self.fallback.len(), e);
                return (self.fallback.clone(), SetSource::Fallback);
            }
        };

        let set = match ValidatorSet::from_records(&records) {
            Ok(set) => set,
            Err(e) => {
                warn!("Validator list unusable, using {} default validators: {}", self.fallback.len(), e);
                return (self.fallback.clone(), SetSource::Fallback);
            }
        };

        if set.len() < self.config.min_validators || set.len() > self.config.max_validators {
            warn!(
                "Validator list has {} entries, outside {}..={}; using {} default validators",
                set.len(),
                self.config.min_validators,
                self.config.max_validators,
                self.fallback.len()
            );
            return (self.fallback.clone(), SetSource::Fallback);
        }

        (set, SetSource::Live)
    }

    /// Validator set to use at `slot`, refreshing on epoch change
    pub async fn validators_for(&mut self, slot: Slot) -> &ValidatorSet {
        let epoch = self.config.epoch_of(slot);
        let stale = self.cached.as_ref().map_or(true, |cached| cached.epoch != epoch);

        if stale {
            let (set, source) = self.refresh().await;
            self.log_change(epoch, &set, source);
            self.cached = Some(CachedSet { epoch, set, source });
        }

        match &self.cached {
            Some(cached) => &cached.set,
            None => &self.fallback,
        }
    }

    /// Source of the cached set, if any slot has been served yet
    pub fn source(&self) -> Option<SetSource> {
        self.cached.as_ref().map(|cached| cached.source)
    }

    fn log_change(&self, epoch: Epoch, set: &ValidatorSet, source: SetSource) {
        let changed = self
            .cached
            .as_ref()
            .map_or(true, |cached| cached.set != *set || cached.source != source);

        if !changed {
            debug!("Validator set unchanged at epoch {}", epoch);
            return;
        }

        info!(
            "Validator set for epoch {}: {} validators ({:?})",
            epoch,
            set.len(),
            source
        );

        if set.position_of(&self.config.identity).is_none() {
            warn!(
                "Local identity {} is not in the validator set; it will not propose",
                self.config.identity
            );
        }
    }
}
