use std::sync::Arc;
use std::time::Duration;

use beacon_engine_core::ShutdownSignal;
use beacon_engine_rpc::{BlockTag, ExecutionClient};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::{EngineConfig, GenesisAnchor, PROBE_TIMEOUT};
use crate::coordinator::ForkChoiceCoordinator;
use crate::directory::ValidatorDirectory;
use crate::error::ConsensusError;
use crate::events::EngineEventSink;
use crate::scheduler::{resolve_slot_duration, SlotClock, SlotScheduler};
use crate::stats::StatsCollector;

/// Stops a running engine from another task
#[derive(Debug, Clone)]
pub struct EngineHandle {
    signal: Arc<ShutdownSignal>,
}

impl EngineHandle {
    /// Request shutdown. The slot in progress reaches a terminal phase,
    /// then `run` returns. Idempotent.
    pub fn stop(&self) {
        self.signal.trigger();
    }

    pub fn is_stopped(&self) -> bool {
        self.signal.is_triggered()
    }
}

/// Top-level slot loop: scheduler, proposer selection and the fork-choice
/// coordinator wired together
pub struct BeaconEngine<E: ExecutionClient> {
    config: Arc<EngineConfig>,
    client: Arc<E>,
    stats: Arc<StatsCollector>,
    event_sink: Option<Arc<dyn EngineEventSink>>,
    signal: Arc<ShutdownSignal>,
}

impl<E: ExecutionClient> BeaconEngine<E> {
    /// `signal` must be the one the client's transports were built with, so
    /// that stopping the engine also cancels in-flight calls.
    pub fn new(
        config: EngineConfig,
        client: Arc<E>,
        signal: Arc<ShutdownSignal>,
    ) -> Result<Self, ConsensusError> {
        config.validate()?;
        Ok(BeaconEngine {
            config: Arc::new(config),
            client,
            stats: Arc::new(StatsCollector::new()),
            event_sink: None,
            signal,
        })
    }

    pub fn set_event_sink(&mut self, sink: Arc<dyn EngineEventSink>) {
        self.event_sink = Some(sink);
    }

    pub fn stats(&self) -> Arc<StatsCollector> {
        self.stats.clone()
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            signal: self.signal.clone(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run slots until stopped. Uptime counts from this call.
    pub async fn run(&self) -> Result<(), ConsensusError> {
        self.stats.start().await;
        let result = self.run_slots().await;
        self.stats.stop().await;
        info!("Beacon engine stopped");
        result
    }

    async fn run_slots(&self) -> Result<(), ConsensusError> {
        let (slot_duration, source) =
            resolve_slot_duration(self.config.slot_duration, self.client.as_ref(), PROBE_TIMEOUT)
                .await;
        if let Some(sink) = &self.event_sink {
            sink.on_slot_duration_resolved(slot_duration, source);
        }

        let timing = self.config.timing(slot_duration)?;
        let clock = self.clock(slot_duration).await;
        let first_slot = match self.config.genesis {
            GenesisAnchor::Start => 0,
            _ => clock.first_slot_not_before(Instant::now()),
        };

        let directory =
            ValidatorDirectory::new(self.client.clone(), self.config.clone(), timing.request_timeout)?;
        let mut coordinator = ForkChoiceCoordinator::new(
            self.client.clone(),
            self.config.clone(),
            timing,
            directory,
            self.stats.clone(),
            self.signal.subscribe(),
        );
        if let Some(sink) = &self.event_sink {
            coordinator.set_event_sink(sink.clone());
        }

        info!(
            "Beacon engine starting: slot duration {:?} ({:?}), request timeout {:?}, build wait {:?}",
            timing.slot_duration, source, timing.request_timeout, timing.build_wait
        );
        info!(
            "Validator {}, fee recipient {}, {} slots per epoch, first slot {}",
            self.config.identity, self.config.fee_recipient, self.config.slots_per_epoch, first_slot
        );
        info!(
            "Tuning: finality depth {}, min stake {}, block reward {}",
            self.config.tuning.finality_depth,
            self.config.tuning.min_stake,
            self.config.tuning.block_reward
        );

        let mut scheduler = SlotScheduler::new(clock, first_slot, self.signal.subscribe());
        while let Some(tick) = scheduler.next_tick().await {
            coordinator.process_slot(&tick).await;
        }
        Ok(())
    }

    async fn clock(&self, slot_duration: Duration) -> SlotClock {
        match self.config.genesis {
            GenesisAnchor::Start => SlotClock::starting_now(slot_duration),
            GenesisAnchor::Timestamp(genesis) => SlotClock::from_genesis(genesis, slot_duration),
            GenesisAnchor::Chain => {
                match self.client.block_by_number(BlockTag::Number(0), PROBE_TIMEOUT).await {
                    Ok(Some(block)) => {
                        info!("Anchored slot 0 at chain genesis timestamp {}", block.timestamp);
                        SlotClock::from_genesis(block.timestamp, slot_duration)
                    }
                    Ok(None) => {
                        warn!("Genesis block not found, anchoring slot 0 at engine start");
                        SlotClock::starting_now(slot_duration)
                    }
                    Err(e) => {
                        warn!("Genesis block lookup failed ({}), anchoring slot 0 at engine start", e);
                        SlotClock::starting_now(slot_duration)
                    }
                }
            }
        }
    }
}
