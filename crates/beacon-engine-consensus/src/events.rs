use std::time::Duration;

use crate::coordinator::SlotOutcome;
use crate::scheduler::{DurationSource, SlotTick};

/// Engine event sink for observers outside the slot loop.
///
/// Callbacks run on the slot loop and must not block.
pub trait EngineEventSink: Send + Sync {
    fn on_slot_processed(&self, tick: &SlotTick, outcome: &SlotOutcome, elapsed: Duration);

    fn on_slot_duration_resolved(&self, _duration: Duration, _source: DurationSource) {}
}
