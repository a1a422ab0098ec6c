use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use beacon_engine_consensus::{
    BeaconEngine, DurationSource, EngineConfig, EngineEventSink, SlotOutcome, SlotTick,
};
use beacon_engine_core::ShutdownSignal;
use beacon_engine_rpc::{HttpExecutionClient, JwtSecret, RpcClient};
use tracing::{error, info, warn};

use crate::config::NodeConfig;
use crate::reporter::{log_snapshot, run_reporter};
use crate::status;

/// Emits one structured event per processed slot
struct LogEventSink;

impl EngineEventSink for LogEventSink {
    fn on_slot_processed(&self, tick: &SlotTick, outcome: &SlotOutcome, elapsed: Duration) {
        match outcome {
            SlotOutcome::NotProposer { proposer } => {
                info!(
                    slot = tick.slot,
                    proposer = %proposer,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "slot observed"
                );
            }
            SlotOutcome::Committed {
                block_hash,
                block_number,
            } => {
                info!(
                    slot = tick.slot,
                    block = block_number,
                    hash = %block_hash,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "block proposed"
                );
            }
            SlotOutcome::Failed { failed_at, reason } => {
                warn!(
                    slot = tick.slot,
                    phase = %failed_at,
                    reason = %reason,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "slot missed"
                );
            }
        }
    }

    fn on_slot_duration_resolved(&self, duration: Duration, source: DurationSource) {
        info!(duration_ms = duration.as_millis() as u64, source = ?source, "slot duration resolved");
    }
}

/// The beacon engine process
pub struct Node {
    config: NodeConfig,
    engine_config: EngineConfig,
    secret: Arc<JwtSecret>,
}

impl Node {
    /// Validate configuration and load the JWT secret
    pub fn new(config: NodeConfig) -> Result<Self> {
        let engine_config = config.to_engine_config()?;
        let secret = JwtSecret::load(&config.jwt_secret_path)
            .with_context(|| format!("loading JWT secret {:?}", config.jwt_secret_path))?;

        Ok(Node {
            config,
            engine_config,
            secret: Arc::new(secret),
        })
    }

    /// Run until ctrl-c
    pub async fn run(self) -> Result<()> {
        info!("Starting beacon engine node");
        info!("Engine API {} / RPC {}", self.config.engine_url, self.config.rpc_url);

        let signal = Arc::new(ShutdownSignal::new());

        let engine_rpc = RpcClient::authenticated(
            self.config.engine_url.clone(),
            self.secret.clone(),
            signal.subscribe(),
        );
        let chain_rpc = RpcClient::plain(self.config.rpc_url.clone(), signal.subscribe());
        let client = Arc::new(HttpExecutionClient::new(
            engine_rpc,
            chain_rpc,
            self.config.chain_methods(),
        ));

        let mut engine = BeaconEngine::new(self.engine_config, client, signal.clone())?;
        engine.set_event_sink(Arc::new(LogEventSink));
        let stats = engine.stats();
        let handle = engine.handle();

        let reporter = self.config.stats_interval().map(|period| {
            tokio::spawn(run_reporter(stats.clone(), period, signal.subscribe()))
        });

        let status_server = self.config.status_addr.map(|addr| {
            let stats = stats.clone();
            let shutdown = signal.subscribe();
            tokio::spawn(async move {
                if let Err(e) = status::serve(addr, stats, shutdown).await {
                    error!("Status endpoint error: {}", e);
                }
            })
        });

        let ctrl_c = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown requested"),
                Err(e) => error!("Failed to listen for ctrl-c: {}", e),
            }
            handle.stop();
        });

        let result = engine.run().await;

        // The engine may also return on a startup error
        signal.trigger();
        ctrl_c.abort();
        if let Some(reporter) = reporter {
            reporter.await?;
        }
        if let Some(server) = status_server {
            server.await?;
        }

        log_snapshot("Final stats", &stats.snapshot().await);
        result?;
        Ok(())
    }
}
