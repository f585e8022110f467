//! Game events and their classification from detection text.

pub mod aliases;
pub mod classifier;
pub mod types;

pub use aliases::AliasTable;
pub use classifier::{EventClassifier, RULE_ORDER, Rule};
pub use types::{EventKey, EventKind, EventType, GameEvent, GamePhase};
