//! Typed game events produced by the classifier and the phase tracker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a round as read from the timer region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Prep,
    Buy,
    Action,
    PostRound,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Prep => "PREP",
            GamePhase::Buy => "BUY",
            GamePhase::Action => "ACTION",
            GamePhase::PostRound => "POST_ROUND",
        }
    }

    /// Phases in which a new round has already begun.
    pub fn is_round_start(&self) -> bool {
        matches!(self, GamePhase::Prep | GamePhase::Buy)
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of [`EventKind`], used as a key for channels and template banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Elimination,
    Headshot,
    RequestingWeapon,
    WeaponOwned,
    ShieldOwned,
    SpikePlant,
    SpikeDefuse,
    AbilityUsed,
    RoundPhaseChange,
    ScoreChange,
    GenericFiller,
}

impl EventType {
    pub const ALL: [EventType; 11] = [
        EventType::Elimination,
        EventType::Headshot,
        EventType::RequestingWeapon,
        EventType::WeaponOwned,
        EventType::ShieldOwned,
        EventType::SpikePlant,
        EventType::SpikeDefuse,
        EventType::AbilityUsed,
        EventType::RoundPhaseChange,
        EventType::ScoreChange,
        EventType::GenericFiller,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Elimination => "elimination",
            EventType::Headshot => "headshot",
            EventType::RequestingWeapon => "requesting_weapon",
            EventType::WeaponOwned => "weapon_owned",
            EventType::ShieldOwned => "shield_owned",
            EventType::SpikePlant => "spike_plant",
            EventType::SpikeDefuse => "spike_defuse",
            EventType::AbilityUsed => "ability_used",
            EventType::RoundPhaseChange => "round_phase_change",
            EventType::ScoreChange => "score_change",
            EventType::GenericFiller => "generic_filler",
        }
    }

    /// Importance assigned to freshly classified events of this type (1..=5).
    pub fn default_importance(&self) -> u8 {
        match self {
            EventType::Headshot | EventType::SpikePlant | EventType::SpikeDefuse => 5,
            EventType::Elimination => 4,
            EventType::RequestingWeapon
            | EventType::WeaponOwned
            | EventType::AbilityUsed
            | EventType::RoundPhaseChange => 3,
            EventType::ShieldOwned | EventType::ScoreChange | EventType::GenericFiller => 2,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event payload. Each variant carries exactly the fields its commentary needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Elimination {
        player: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weapon: Option<String>,
    },
    Headshot {
        player: String,
    },
    RequestingWeapon {
        player: String,
        weapon: String,
    },
    WeaponOwned {
        player: String,
        weapon: String,
    },
    ShieldOwned {
        player: String,
    },
    SpikePlant,
    SpikeDefuse,
    AbilityUsed {
        player: String,
        ability: String,
    },
    RoundPhaseChange {
        phase: GamePhase,
        round: u32,
    },
    ScoreChange {
        team1: u32,
        team2: u32,
        round: u32,
    },
    GenericFiller,
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::Elimination { .. } => EventType::Elimination,
            EventKind::Headshot { .. } => EventType::Headshot,
            EventKind::RequestingWeapon { .. } => EventType::RequestingWeapon,
            EventKind::WeaponOwned { .. } => EventType::WeaponOwned,
            EventKind::ShieldOwned { .. } => EventType::ShieldOwned,
            EventKind::SpikePlant => EventType::SpikePlant,
            EventKind::SpikeDefuse => EventType::SpikeDefuse,
            EventKind::AbilityUsed { .. } => EventType::AbilityUsed,
            EventKind::RoundPhaseChange { .. } => EventType::RoundPhaseChange,
            EventKind::ScoreChange { .. } => EventType::ScoreChange,
            EventKind::GenericFiller => EventType::GenericFiller,
        }
    }
}

/// Identity used to recognize the same event read on consecutive frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub event_type: EventType,
    pub subject: Option<String>,
    pub detail: Option<String>,
}

/// A classified, timestamped game event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub timestamp: f64,
    pub importance: u8,
    #[serde(flatten)]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl GameEvent {
    pub fn new(timestamp: f64, kind: EventKind) -> Self {
        let importance = kind.event_type().default_importance();
        Self {
            timestamp,
            importance,
            kind,
            location: None,
        }
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    /// Overrides the importance, clamped to 1..=5.
    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = importance.clamp(1, 5);
        self
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    pub fn player(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Elimination { player, .. }
            | EventKind::Headshot { player }
            | EventKind::RequestingWeapon { player, .. }
            | EventKind::WeaponOwned { player, .. }
            | EventKind::ShieldOwned { player }
            | EventKind::AbilityUsed { player, .. } => Some(player),
            _ => None,
        }
    }

    pub fn weapon(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Elimination { weapon, .. } => weapon.as_deref(),
            EventKind::RequestingWeapon { weapon, .. } | EventKind::WeaponOwned { weapon, .. } => {
                Some(weapon)
            }
            _ => None,
        }
    }

    pub fn key(&self) -> EventKey {
        let (subject, detail) = match &self.kind {
            EventKind::AbilityUsed { player, ability } => {
                (Some(player.clone()), Some(ability.clone()))
            }
            EventKind::RoundPhaseChange { phase, round } => {
                (Some(phase.to_string()), Some(round.to_string()))
            }
            EventKind::ScoreChange { team1, team2, .. } => {
                (Some(format!("{team1}-{team2}")), None)
            }
            _ => (
                self.player().map(str::to_string),
                self.weapon().map(str::to_string),
            ),
        };
        EventKey {
            event_type: self.event_type(),
            subject,
            detail,
        }
    }
}
