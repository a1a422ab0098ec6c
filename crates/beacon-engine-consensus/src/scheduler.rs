//! Slot clock and scheduler.
//!
//! Deadlines are always computed from the anchor (`t0 + k * slot_duration`),
//! never from the previous wake-up, so slow slots and timer jitter do not
//! accumulate into drift.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use beacon_engine_core::{Shutdown, Slot};
use beacon_engine_rpc::ExecutionClient;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use crate::config::{DEFAULT_SLOT_DURATION, MAX_SLOT_DURATION};

/// A tick this late past its deadline still counts as on time
pub const LATE_TICK_TOLERANCE: Duration = Duration::from_millis(50);

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Stand-in for deadlines too far out to represent
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// How the slot duration was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSource {
    Configured,
    Detected,
    Default,
}

/// Resolve the slot duration once, before the first tick.
///
/// A configured value wins. Otherwise the execution node's block period is
/// used; if that probe fails or reports zero or more than
/// [`MAX_SLOT_DURATION`], [`DEFAULT_SLOT_DURATION`].
pub async fn resolve_slot_duration<E: ExecutionClient + ?Sized>(
    configured: Option<Duration>,
    client: &E,
    timeout: Duration,
) -> (Duration, DurationSource) {
    if let Some(duration) = configured {
        return (duration, DurationSource::Configured);
    }

    match client.block_period(timeout).await {
        Ok(0) => {
            warn!(
                "Execution node reported a zero block period, using default slot duration {:?}",
                DEFAULT_SLOT_DURATION
            );
            (DEFAULT_SLOT_DURATION, DurationSource::Default)
        }
        Ok(seconds) if Duration::from_secs(seconds) > MAX_SLOT_DURATION => {
            warn!(
                "Execution node reported an implausible block period of {}s, using default slot duration {:?}",
                seconds, DEFAULT_SLOT_DURATION
            );
            (DEFAULT_SLOT_DURATION, DurationSource::Default)
        }
        Ok(seconds) => {
            let duration = Duration::from_secs(seconds);
            info!("Detected slot duration {:?} from chain block period", duration);
            (duration, DurationSource::Detected)
        }
        Err(e) => {
            warn!(
                "Block period auto-detection failed ({}), using default slot duration {:?}",
                e, DEFAULT_SLOT_DURATION
            );
            (DEFAULT_SLOT_DURATION, DurationSource::Default)
        }
    }
}

fn unix_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// Maps slot numbers to monotonic deadlines and wall-clock timestamps
#[derive(Debug, Clone, Copy)]
pub struct SlotClock {
    genesis_unix: Duration,
    slot_duration: Duration,
    reference: Instant,
    reference_unix: Duration,
}

impl SlotClock {
    /// Slot 0 starts now
    pub fn starting_now(slot_duration: Duration) -> Self {
        let reference_unix = unix_now();
        Self::with_reference(reference_unix, slot_duration, Instant::now(), reference_unix)
    }

    /// Slot 0 starts at `genesis_time` (unix seconds)
    pub fn from_genesis(genesis_time: u64, slot_duration: Duration) -> Self {
        Self::with_reference(
            Duration::from_secs(genesis_time),
            slot_duration,
            Instant::now(),
            unix_now(),
        )
    }

    /// Clock pinned to an explicit (monotonic, wall-clock) reference pair
    pub fn with_reference(
        genesis_unix: Duration,
        slot_duration: Duration,
        reference: Instant,
        reference_unix: Duration,
    ) -> Self {
        SlotClock {
            genesis_unix,
            slot_duration,
            reference,
            reference_unix,
        }
    }

    pub fn slot_duration(&self) -> Duration {
        self.slot_duration
    }

    fn offset(&self, slot: Slot) -> Option<Duration> {
        let nanos = self.slot_duration.as_nanos().checked_mul(u128::from(slot))?;
        let secs = u64::try_from(nanos / NANOS_PER_SEC).ok()?;
        Some(Duration::new(secs, (nanos % NANOS_PER_SEC) as u32))
    }

    /// Wall-clock start of `slot`, since the unix epoch. Saturates at
    /// `Duration::MAX`.
    pub fn slot_start_unix(&self, slot: Slot) -> Duration {
        self.offset(slot)
            .and_then(|offset| self.genesis_unix.checked_add(offset))
            .unwrap_or(Duration::MAX)
    }

    /// Unix timestamp (seconds) of the start of `slot`
    pub fn slot_timestamp(&self, slot: Slot) -> u64 {
        self.slot_start_unix(slot).as_secs()
    }

    /// Monotonic deadline at which `slot` starts
    pub fn deadline(&self, slot: Slot) -> Instant {
        let start = self.slot_start_unix(slot);
        if start >= self.reference_unix {
            let ahead = start - self.reference_unix;
            self.reference
                .checked_add(ahead.min(FAR_FUTURE))
                .unwrap_or(self.reference)
        } else {
            self.reference
                .checked_sub(self.reference_unix - start)
                .unwrap_or(self.reference)
        }
    }

    /// Slot in progress at `now`, `None` before genesis
    pub fn slot_at(&self, now: Instant) -> Option<Slot> {
        let now_unix = self.reference_unix + now.saturating_duration_since(self.reference);
        let since_genesis = now_unix.checked_sub(self.genesis_unix)?;
        Some((since_genesis.as_nanos() / self.slot_duration.as_nanos()) as Slot)
    }

    /// First slot whose start is not before `now`
    pub fn first_slot_not_before(&self, now: Instant) -> Slot {
        match self.slot_at(now) {
            None => 0,
            Some(slot) if self.deadline(slot) >= now => slot,
            Some(slot) => slot + 1,
        }
    }
}

/// One slot boundary delivered by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTick {
    pub slot: Slot,
    /// Monotonic deadline the tick was scheduled for
    pub scheduled: Instant,
    /// Unix timestamp (seconds) of the slot start
    pub timestamp: u64,
    /// Slots passed over since the previous tick because it overran
    pub skipped: u64,
}

/// Produces slot ticks on the anchor grid.
///
/// [`SlotScheduler::next_tick`] blocks until the next deadline or shutdown,
/// whichever comes first. Slots whose start has already passed when the
/// previous tick's processing ends are skipped, never queued.
pub struct SlotScheduler {
    clock: SlotClock,
    next: Slot,
    delivered: bool,
    shutdown: Shutdown,
}

impl SlotScheduler {
    pub fn new(clock: SlotClock, first_slot: Slot, shutdown: Shutdown) -> Self {
        SlotScheduler {
            clock,
            next: first_slot,
            delivered: false,
            shutdown,
        }
    }

    /// Wait for the next slot. Returns `None` once shutdown is requested.
    pub async fn next_tick(&mut self) -> Option<SlotTick> {
        if self.shutdown.is_triggered() {
            return None;
        }

        let mut skipped = 0;
        if self.delivered {
            let now = Instant::now();
            let late_after = self.clock.deadline(self.next).checked_add(LATE_TICK_TOLERANCE);
            if late_after.is_some_and(|late_after| late_after < now) {
                let caught_up = self.clock.first_slot_not_before(now).max(self.next + 1);
                skipped = caught_up - self.next;
                warn!(
                    "Slot processing overran; skipping slots {}..{}",
                    self.next, caught_up
                );
                self.next = caught_up;
            }
        }

        let deadline = self.clock.deadline(self.next);
        tokio::select! {
            biased;
            _ = self.shutdown.wait() => return None,
            _ = sleep_until(deadline) => {}
        }

        let tick = SlotTick {
            slot: self.next,
            scheduled: deadline,
            timestamp: self.clock.slot_timestamp(self.next),
            skipped,
        };
        self.next += 1;
        self.delivered = true;
        Some(tick)
    }
}
