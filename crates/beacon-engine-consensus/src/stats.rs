use std::time::Duration;

use beacon_engine_core::Slot;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::coordinator::SlotOutcome;

#[derive(Debug, Default)]
struct EngineStats {
    slots_processed: u64,
    blocks_proposed: u64,
    missed_slots: u64,
    slots_skipped: u64,
    total_slot_time: Duration,
    chain_height: Option<u64>,
    last_slot: Option<Slot>,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
}

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub slots_processed: u64,
    pub blocks_proposed: u64,
    pub missed_slots: u64,
    pub slots_skipped: u64,
    #[serde(with = "millis")]
    pub average_slot_time: Duration,
    #[serde(with = "millis")]
    pub uptime: Duration,
    pub chain_height: Option<u64>,
    pub last_slot: Option<Slot>,
    pub running: bool,
}

/// Concurrency-safe engine counters.
///
/// Written by the slot loop, read by reporters. Every snapshot is
/// internally consistent.
#[derive(Debug, Default)]
pub struct StatsCollector {
    inner: RwLock<EngineStats>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(&self) {
        let mut stats = self.inner.write().await;
        stats.started_at = Some(Instant::now());
        stats.stopped_at = None;
    }

    /// Freeze uptime
    pub async fn stop(&self) {
        let mut stats = self.inner.write().await;
        if stats.started_at.is_some() && stats.stopped_at.is_none() {
            stats.stopped_at = Some(Instant::now());
        }
    }

    pub async fn record_slot(&self, slot: Slot, outcome: &SlotOutcome, elapsed: Duration) {
        let mut stats = self.inner.write().await;
        stats.slots_processed += 1;
        stats.total_slot_time += elapsed;
        stats.last_slot = Some(slot);
        match outcome {
            SlotOutcome::Committed { .. } => stats.blocks_proposed += 1,
            SlotOutcome::Failed { .. } => stats.missed_slots += 1,
            SlotOutcome::NotProposer { .. } => {}
        }
    }

    pub async fn record_skipped(&self, count: u64) {
        self.inner.write().await.slots_skipped += count;
    }

    pub async fn set_chain_height(&self, height: u64) {
        self.inner.write().await.chain_height = Some(height);
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        let stats = self.inner.read().await;

        let average_slot_time = match u32::try_from(stats.slots_processed) {
            Ok(0) => Duration::ZERO,
            Ok(n) => stats.total_slot_time / n,
            Err(_) => Duration::from_secs_f64(
                stats.total_slot_time.as_secs_f64() / stats.slots_processed as f64,
            ),
        };

        let uptime = match (stats.started_at, stats.stopped_at) {
            (Some(start), Some(stop)) => stop.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            (None, _) => Duration::ZERO,
        };

        StatsSnapshot {
            slots_processed: stats.slots_processed,
            blocks_proposed: stats.blocks_proposed,
            missed_slots: stats.missed_slots,
            slots_skipped: stats.slots_skipped,
            average_slot_time,
            uptime,
            chain_height: stats.chain_height,
            last_slot: stats.last_slot,
            running: stats.started_at.is_some() && stats.stopped_at.is_none(),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
