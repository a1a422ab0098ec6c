//! Beacon Engine Consensus - slot scheduling, proposer rotation and the
//! Engine API fork-choice handshake

pub mod config;
pub mod coordinator;
pub mod directory;
pub mod engine;
pub mod error;
pub mod events;
pub mod proposer;
pub mod scheduler;
pub mod stats;

pub use config::{EngineConfig, GenesisAnchor, SlotTiming, TuningParams};
pub use coordinator::{ForkChoiceCoordinator, HeadState, SlotFailure, SlotOutcome, SlotPhase};
pub use directory::{SetSource, ValidatorDirectory};
pub use engine::{BeaconEngine, EngineHandle};
pub use error::ConsensusError;
pub use events::EngineEventSink;
pub use proposer::{is_local, is_proposer, proposer_for, proposer_index};
pub use scheduler::{
    resolve_slot_duration, DurationSource, SlotClock, SlotScheduler, SlotTick,
};
pub use stats::{StatsCollector, StatsSnapshot};
