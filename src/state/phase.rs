//! Round phase and score tracking.
//!
//! The tracker reads the timer region once per frame and turns phase
//! transitions into events. Scoreboard readings are candidates only: a
//! reading that would move the round backwards, or repeat the current one,
//! is absorbed instead of announced.

use crate::defaults;
use crate::events::types::{EventKind, GameEvent, GamePhase};
use crate::perception::types::{DetectionRecord, Region};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static COUNTDOWN_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}:\d{2}(\.\d+)?|\d{1,3}(\.\d+)?)$").ok());

const POST_ROUND_WORDS: &[&str] = &["won", "lost", "victory", "defeat", "clutch", "flawless"];

/// What to do with timer text that matches no rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguousTimerPolicy {
    /// Keep the current phase.
    #[default]
    Hold,
    /// Switch to the configured fallback phase.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    pub initial_phase: GamePhase,
    pub ambiguous_timer: AmbiguousTimerPolicy,
    pub fallback_phase: GamePhase,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            initial_phase: defaults::FALLBACK_PHASE,
            ambiguous_timer: AmbiguousTimerPolicy::Hold,
            fallback_phase: defaults::FALLBACK_PHASE,
        }
    }
}

/// Interpretation of one piece of timer text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerReading {
    Phase(GamePhase),
    Ambiguous,
}

/// Reads timer-region text.
pub fn read_timer(text: &str) -> TimerReading {
    let lower = text.trim().to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if words.iter().any(|w| w.starts_with("buy")) {
        return TimerReading::Phase(GamePhase::Buy);
    }
    if words.iter().any(|w| w.starts_with("prep")) {
        return TimerReading::Phase(GamePhase::Prep);
    }
    if words.iter().any(|w| POST_ROUND_WORDS.contains(w)) || lower.contains("round over") {
        return TimerReading::Phase(GamePhase::PostRound);
    }
    let compact: String = lower.chars().filter(|c| !c.is_whitespace()).collect();
    if COUNTDOWN_RE
        .as_ref()
        .is_some_and(|re| re.is_match(&compact))
    {
        return TimerReading::Phase(GamePhase::Action);
    }
    TimerReading::Ambiguous
}

/// Session-wide match state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub phase: GamePhase,
    pub round: u32,
    pub score: (u32, u32),
    pub players: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl GameState {
    pub fn new(phase: GamePhase) -> Self {
        Self {
            phase,
            round: 1,
            score: (0, 0),
            players: BTreeSet::new(),
            map: None,
            agent: None,
        }
    }
}

/// Where an event routed through the tracker came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    /// Produced by the classifier and passed on.
    Classified,
    /// Synthesized by the tracker (phase transitions).
    Derived,
    /// A score candidate that did not advance the round.
    Absorbed,
}

/// An event with its origin, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEvent {
    pub event: GameEvent,
    pub origin: EventOrigin,
}

impl TrackedEvent {
    fn new(event: GameEvent, origin: EventOrigin) -> Self {
        Self { event, origin }
    }
}

/// Maintains [`GameState`] from per-frame detections and classified events.
#[derive(Debug, Clone)]
pub struct PhaseStateMachine {
    config: PhaseConfig,
    state: GameState,
}

impl PhaseStateMachine {
    pub fn new(config: PhaseConfig) -> Self {
        Self {
            config,
            state: GameState::new(config.initial_phase),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn set_context(&mut self, map: Option<String>, agent: Option<String>) {
        self.state.map = map;
        self.state.agent = agent;
    }

    /// Processes one frame.
    ///
    /// Timer text is read first, so a phase change is emitted ahead of the
    /// frame's classified events. Score candidates are resolved in place.
    pub fn observe(
        &mut self,
        timestamp: f64,
        detections: &[DetectionRecord],
        events: Vec<GameEvent>,
    ) -> Vec<TrackedEvent> {
        let mut out = Vec::with_capacity(events.len() + 1);

        if let Some(phase) = self.timer_phase(detections)
            && phase != self.state.phase
        {
            out.push(self.transition(timestamp, phase));
        }

        for event in events {
            if let Some(player) = event.player()
                && player != defaults::UNKNOWN_PLAYER
            {
                self.state.players.insert(player.to_string());
            }

            match event.kind {
                EventKind::ScoreChange {
                    team1,
                    team2,
                    round,
                } => {
                    if round <= self.state.round {
                        out.push(TrackedEvent::new(event, EventOrigin::Absorbed));
                        continue;
                    }
                    tracing::debug!(
                        from = self.state.round,
                        to = round,
                        "Score {team1}-{team2} advances the round"
                    );
                    self.state.round = round;
                    self.state.score = (team1, team2);
                    let ts = event.timestamp;
                    out.push(TrackedEvent::new(event, EventOrigin::Classified));
                    if !self.state.phase.is_round_start() {
                        out.push(self.transition(ts, GamePhase::Prep));
                    }
                }
                _ => out.push(TrackedEvent::new(event, EventOrigin::Classified)),
            }
        }
        out
    }

    fn timer_phase(&self, detections: &[DetectionRecord]) -> Option<GamePhase> {
        let mut saw_timer = false;
        for record in detections.iter().filter(|d| d.region == Region::Timer) {
            let Some(text) = record.text.as_deref() else {
                continue;
            };
            saw_timer = true;
            if let TimerReading::Phase(phase) = read_timer(text) {
                return Some(phase);
            }
        }
        match (saw_timer, self.config.ambiguous_timer) {
            (true, AmbiguousTimerPolicy::Fallback) => Some(self.config.fallback_phase),
            _ => None,
        }
    }

    fn transition(&mut self, timestamp: f64, phase: GamePhase) -> TrackedEvent {
        tracing::debug!(
            from = %self.state.phase,
            to = %phase,
            round = self.state.round,
            "Phase change"
        );
        self.state.phase = phase;
        TrackedEvent::new(
            GameEvent::new(
                timestamp,
                EventKind::RoundPhaseChange {
                    phase,
                    round: self.state.round,
                },
            ),
            EventOrigin::Derived,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::EventType;

    fn timer(text: &str, t: f64) -> DetectionRecord {
        DetectionRecord::text(Region::Timer, text, 0.95, t)
    }

    fn score(team1: u32, team2: u32, t: f64) -> GameEvent {
        GameEvent::new(
            t,
            EventKind::ScoreChange {
                team1,
                team2,
                round: team1 + team2 + 1,
            },
        )
    }

    #[test]
    fn test_read_timer_rules() {
        assert_eq!(read_timer("BUY PHASE"), TimerReading::Phase(GamePhase::Buy));
        assert_eq!(read_timer("Prep"), TimerReading::Phase(GamePhase::Prep));
        assert_eq!(read_timer("1:39"), TimerReading::Phase(GamePhase::Action));
        assert_eq!(read_timer("0:05.3"), TimerReading::Phase(GamePhase::Action));
        assert_eq!(read_timer("45"), TimerReading::Phase(GamePhase::Action));
        assert_eq!(
            read_timer("ROUND WON"),
            TimerReading::Phase(GamePhase::PostRound)
        );
        assert_eq!(read_timer("~~??"), TimerReading::Ambiguous);
    }

    #[test]
    fn test_initial_phase_is_fallback_default() {
        let tracker = PhaseStateMachine::new(PhaseConfig::default());
        assert_eq!(tracker.state().phase, GamePhase::Action);
        assert_eq!(tracker.state().round, 1);
    }

    #[test]
    fn test_buy_text_forces_buy_phase() {
        let mut tracker = PhaseStateMachine::new(PhaseConfig::default());
        let out = tracker.observe(5.0, &[timer("BUY PHASE", 5.0)], Vec::new());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].origin, EventOrigin::Derived);
        assert_eq!(
            out[0].event.kind,
            EventKind::RoundPhaseChange {
                phase: GamePhase::Buy,
                round: 1
            }
        );
        assert_eq!(tracker.state().phase, GamePhase::Buy);

        // Same phase again emits nothing.
        assert!(
            tracker
                .observe(5.5, &[timer("BUY PHASE", 5.5)], Vec::new())
                .is_empty()
        );
    }

    #[test]
    fn test_ambiguous_timer_holds_by_default() {
        let mut tracker = PhaseStateMachine::new(PhaseConfig {
            initial_phase: GamePhase::Buy,
            ..Default::default()
        });
        let out = tracker.observe(1.0, &[timer("??", 1.0)], Vec::new());
        assert!(out.is_empty());
        assert_eq!(tracker.state().phase, GamePhase::Buy);
    }

    #[test]
    fn test_ambiguous_timer_fallback_policy() {
        let mut tracker = PhaseStateMachine::new(PhaseConfig {
            initial_phase: GamePhase::Buy,
            ambiguous_timer: AmbiguousTimerPolicy::Fallback,
            fallback_phase: GamePhase::Action,
        });
        let out = tracker.observe(1.0, &[timer("??", 1.0)], Vec::new());
        assert_eq!(out.len(), 1);
        assert_eq!(tracker.state().phase, GamePhase::Action);
    }

    #[test]
    fn test_no_timer_text_keeps_phase() {
        let mut tracker = PhaseStateMachine::new(PhaseConfig {
            ambiguous_timer: AmbiguousTimerPolicy::Fallback,
            initial_phase: GamePhase::Buy,
            fallback_phase: GamePhase::Action,
        });
        assert!(tracker.observe(1.0, &[], Vec::new()).is_empty());
        assert_eq!(tracker.state().phase, GamePhase::Buy);
    }

    #[test]
    fn test_score_advance_emits_round_start() {
        let mut tracker = PhaseStateMachine::new(PhaseConfig::default());
        let out = tracker.observe(30.0, &[], vec![score(12, 10, 30.0)]);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].origin, EventOrigin::Classified);
        assert_eq!(
            out[0].event.kind,
            EventKind::ScoreChange {
                team1: 12,
                team2: 10,
                round: 23
            }
        );
        assert_eq!(out[1].event.event_type(), EventType::RoundPhaseChange);
        assert_eq!(
            out[1].event.kind,
            EventKind::RoundPhaseChange {
                phase: GamePhase::Prep,
                round: 23
            }
        );
        assert_eq!(tracker.state().round, 23);
        assert_eq!(tracker.state().score, (12, 10));
        assert_eq!(tracker.state().phase, GamePhase::Prep);
    }

    #[test]
    fn test_score_in_buy_phase_skips_prep_change() {
        let mut tracker = PhaseStateMachine::new(PhaseConfig {
            initial_phase: GamePhase::Buy,
            ..Default::default()
        });
        let out = tracker.observe(1.0, &[], vec![score(1, 0, 1.0)]);
        assert_eq!(out.len(), 1);
        assert_eq!(tracker.state().phase, GamePhase::Buy);
    }

    #[test]
    fn test_stale_score_absorbed_round_never_decreases() {
        let mut tracker = PhaseStateMachine::new(PhaseConfig::default());
        tracker.observe(1.0, &[], vec![score(5, 5, 1.0)]);
        assert_eq!(tracker.state().round, 11);

        let out = tracker.observe(2.0, &[], vec![score(5, 5, 2.0), score(2, 1, 2.0)]);
        assert!(out.iter().all(|t| t.origin == EventOrigin::Absorbed));
        assert_eq!(tracker.state().round, 11);
        assert_eq!(tracker.state().score, (5, 5));
    }

    #[test]
    fn test_players_collected() {
        let mut tracker = PhaseStateMachine::new(PhaseConfig::default());
        let events = vec![
            GameEvent::new(
                1.0,
                EventKind::Headshot {
                    player: "TenZ".to_string(),
                },
            ),
            GameEvent::new(
                1.0,
                EventKind::Headshot {
                    player: "Player".to_string(),
                },
            ),
        ];
        tracker.observe(1.0, &[], events);
        assert!(tracker.state().players.contains("TenZ"));
        assert_eq!(tracker.state().players.len(), 1);
    }

    #[test]
    fn test_timer_change_precedes_frame_events() {
        let mut tracker = PhaseStateMachine::new(PhaseConfig::default());
        let out = tracker.observe(
            3.0,
            &[timer("BUY PHASE", 3.0)],
            vec![GameEvent::new(3.0, EventKind::SpikePlant)],
        );
        assert_eq!(out[0].event.event_type(), EventType::RoundPhaseChange);
        assert_eq!(out[1].event.event_type(), EventType::SpikePlant);
    }
}
