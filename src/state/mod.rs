//! Match state derived from the event stream.

pub mod phase;

pub use phase::{
    AmbiguousTimerPolicy, EventOrigin, GameState, PhaseConfig, PhaseStateMachine, TimerReading,
    TrackedEvent, read_timer,
};
