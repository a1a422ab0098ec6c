use std::sync::Arc;
use std::time::Duration;

use beacon_engine_consensus::{StatsCollector, StatsSnapshot};
use beacon_engine_core::Shutdown;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

pub fn log_snapshot(label: &str, snapshot: &StatsSnapshot) {
    info!(
        "{}: slots {} proposed {} missed {} skipped {} avg slot {:?} uptime {:?} chain height {}",
        label,
        snapshot.slots_processed,
        snapshot.blocks_proposed,
        snapshot.missed_slots,
        snapshot.slots_skipped,
        snapshot.average_slot_time,
        snapshot.uptime,
        snapshot
            .chain_height
            .map_or_else(|| "unknown".to_string(), |h| h.to_string())
    );
}

/// Log a stats snapshot every `period` until shutdown
pub async fn run_reporter(stats: Arc<StatsCollector>, period: Duration, shutdown: Shutdown) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = ticker.tick() => log_snapshot("Stats", &stats.snapshot().await),
        }
    }
}
