//! Decides when to speak.
//!
//! Two throttle channels apply to events below the override importance: the
//! global channel (any segment in the last `min_interval` seconds) and, when
//! enabled, one channel per event type. Repeated readings of the same event
//! are dropped regardless of importance.
//!
//! Filler is produced on a cadence after the last segment. A filler candidate
//! is held until its proximity window has passed so that a real event landing
//! just after it can still cancel it; this keeps segments in timestamp order
//! while streaming.

use crate::commentary::types::{CommentaryRequest, CommentaryStyle};
use crate::defaults;
use crate::events::types::{EventKey, EventKind, EventType, GameEvent};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between low-importance segments on the global channel.
    pub min_interval: f64,
    /// Importance at which throttling no longer applies.
    pub override_importance: u8,
    /// Seconds between low-importance segments of one type (0 disables).
    pub type_interval: f64,
    pub dedupe_window: f64,
    pub fill_cadence: f64,
    pub filler_proximity: f64,
    pub fill_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval: defaults::MIN_INTERVAL_SECS,
            override_importance: defaults::OVERRIDE_IMPORTANCE,
            type_interval: 0.0,
            dedupe_window: defaults::DEDUPE_WINDOW_SECS,
            fill_cadence: defaults::FILL_CADENCE_SECS,
            filler_proximity: defaults::FILLER_PROXIMITY_SECS,
            fill_enabled: true,
        }
    }
}

/// Why an event produced no segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    /// Global channel still inside `min_interval`.
    Throttled,
    /// Per-type channel still inside `type_interval`.
    ChannelBusy,
    /// Same event already spoken inside the dedupe window.
    Duplicate,
    /// Score reading that did not advance the round.
    Absorbed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Emit(CommentaryRequest),
    Suppress(SuppressReason),
}

#[derive(Debug, Clone)]
pub struct CommentaryScheduler {
    config: SchedulerConfig,
    preferred_style: Option<CommentaryStyle>,
    anchor: Option<f64>,
    last_global: Option<f64>,
    last_by_type: HashMap<EventType, f64>,
    recent: VecDeque<(f64, EventKey)>,
    segment_times: VecDeque<f64>,
    pending_filler: Option<f64>,
    fillers_emitted: usize,
}

impl CommentaryScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            preferred_style: None,
            anchor: None,
            last_global: None,
            last_by_type: HashMap::new(),
            recent: VecDeque::new(),
            segment_times: VecDeque::new(),
            pending_filler: None,
            fillers_emitted: 0,
        }
    }

    /// Style used for events below the override importance.
    pub fn with_preferred_style(mut self, style: Option<CommentaryStyle>) -> Self {
        self.preferred_style = style;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Advances time to `now`, committing any filler whose proximity window
    /// has elapsed. Call before offering the events observed at `now`.
    pub fn tick(&mut self, now: f64) -> Vec<CommentaryRequest> {
        self.anchor.get_or_insert(now);
        let mut out = Vec::new();
        if !self.config.fill_enabled {
            return out;
        }
        while let Some(candidate) = self.next_candidate(now) {
            if candidate + self.config.filler_proximity > now {
                self.pending_filler = Some(candidate);
                break;
            }
            self.pending_filler = None;
            if let Some(request) = self.commit_filler(candidate) {
                out.push(request);
            }
        }
        out
    }

    /// Decides whether `event` is spoken.
    pub fn offer(&mut self, event: &GameEvent) -> Decision {
        let t = event.timestamp;
        self.anchor.get_or_insert(t);
        self.prune(t);

        let key = event.key();
        if self
            .recent
            .iter()
            .any(|(seen, k)| *k == key && t - seen < self.config.dedupe_window)
        {
            return Decision::Suppress(SuppressReason::Duplicate);
        }

        let event_type = event.event_type();
        if event.importance < self.config.override_importance {
            if self
                .last_global
                .is_some_and(|last| t - last < self.config.min_interval)
            {
                return Decision::Suppress(SuppressReason::Throttled);
            }
            if self.config.type_interval > 0.0
                && self
                    .last_by_type
                    .get(&event_type)
                    .is_some_and(|last| t - last < self.config.type_interval)
            {
                return Decision::Suppress(SuppressReason::ChannelBusy);
            }
        }

        if let Some(pending) = self.pending_filler
            && (t - pending).abs() < self.config.filler_proximity
        {
            tracing::trace!(pending, t, "Filler cancelled by event");
            self.pending_filler = None;
        }

        self.record(t, event_type);
        self.recent.push_back((t, key));
        self.anchor = Some(self.anchor.map_or(t, |a| a.max(t)));

        let style = if event.importance >= self.config.override_importance {
            CommentaryStyle::Excitement
        } else {
            self.preferred_style.unwrap_or(CommentaryStyle::PlayByPlay)
        };
        Decision::Emit(CommentaryRequest {
            event: event.clone(),
            style,
        })
    }

    /// Ends the session at `end`, committing any filler due at or before it.
    pub fn flush(&mut self, end: f64) -> Vec<CommentaryRequest> {
        let mut out = self.tick(end);
        if !self.config.fill_enabled {
            return out;
        }
        while let Some(candidate) = self.next_candidate(end) {
            self.pending_filler = None;
            match self.commit_filler(candidate) {
                Some(request) => out.push(request),
                None => self.anchor = Some(candidate),
            }
        }
        out
    }

    fn next_candidate(&self, now: f64) -> Option<f64> {
        if let Some(pending) = self.pending_filler {
            return Some(pending);
        }
        if self.config.fill_cadence <= 0.0 {
            return None;
        }
        let candidate = self.anchor? + self.config.fill_cadence;
        (candidate <= now).then_some(candidate)
    }

    fn commit_filler(&mut self, t: f64) -> Option<CommentaryRequest> {
        self.anchor = Some(t);
        let near_segment = self
            .segment_times
            .iter()
            .any(|s| (s - t).abs() < self.config.filler_proximity);
        let throttled = self
            .last_global
            .is_some_and(|last| (t - last).abs() < self.config.min_interval);
        if near_segment || throttled {
            tracing::trace!(t, "Filler skipped near an existing segment");
            return None;
        }

        self.record(t, EventType::GenericFiller);
        let cycle = &CommentaryStyle::FILLER_CYCLE;
        let style = cycle[self.fillers_emitted % cycle.len()];
        self.fillers_emitted += 1;
        Some(CommentaryRequest {
            event: GameEvent::new(t, EventKind::GenericFiller),
            style,
        })
    }

    fn record(&mut self, t: f64, event_type: EventType) {
        self.last_global = Some(self.last_global.map_or(t, |last| last.max(t)));
        self.last_by_type.insert(event_type, t);
        self.segment_times.push_back(t);
    }

    fn prune(&mut self, now: f64) {
        let window = self.config.dedupe_window;
        while self.recent.front().is_some_and(|(t, _)| now - t >= window) {
            self.recent.pop_front();
        }
        let horizon = self.anchor.unwrap_or(now) - self.config.filler_proximity;
        while self.segment_times.front().is_some_and(|t| *t < horizon) {
            self.segment_times.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requesting(t: f64, player: &str) -> GameEvent {
        GameEvent::new(
            t,
            EventKind::RequestingWeapon {
                player: player.to_string(),
                weapon: "Vandal".to_string(),
            },
        )
    }

    fn emitted(decision: &Decision) -> bool {
        matches!(decision, Decision::Emit(_))
    }

    fn no_fill() -> SchedulerConfig {
        SchedulerConfig {
            fill_enabled: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_event_emits_immediately() {
        let mut scheduler = CommentaryScheduler::new(SchedulerConfig::default());
        assert!(scheduler.tick(12.0).is_empty());
        let decision = scheduler.offer(&requesting(12.0, "TenZ"));
        match decision {
            Decision::Emit(request) => {
                assert_eq!(request.event.timestamp, 12.0);
                assert_eq!(request.style, CommentaryStyle::PlayByPlay);
            }
            other => panic!("expected emit, got {other:?}"),
        }
    }

    #[test]
    fn test_low_importance_throttled() {
        let mut scheduler = CommentaryScheduler::new(no_fill());
        assert!(emitted(&scheduler.offer(&requesting(12.0, "TenZ"))));
        assert_eq!(
            scheduler.offer(&requesting(12.5, "ScreaM")),
            Decision::Suppress(SuppressReason::Throttled)
        );
        assert!(emitted(&scheduler.offer(&requesting(14.0, "ScreaM"))));
    }

    #[test]
    fn test_high_importance_bypasses_throttle() {
        let mut scheduler = CommentaryScheduler::new(no_fill());
        assert!(emitted(&scheduler.offer(&requesting(12.0, "TenZ"))));
        let plant = GameEvent::new(12.3, EventKind::SpikePlant);
        match scheduler.offer(&plant) {
            Decision::Emit(request) => assert_eq!(request.style, CommentaryStyle::Excitement),
            other => panic!("expected emit, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicates_suppressed_even_when_important() {
        let mut scheduler = CommentaryScheduler::new(no_fill());
        let plant = GameEvent::new(10.0, EventKind::SpikePlant);
        assert!(emitted(&scheduler.offer(&plant)));
        let again = GameEvent::new(11.0, EventKind::SpikePlant);
        assert_eq!(
            scheduler.offer(&again),
            Decision::Suppress(SuppressReason::Duplicate)
        );
        let later = GameEvent::new(13.5, EventKind::SpikePlant);
        assert!(emitted(&scheduler.offer(&later)));
    }

    #[test]
    fn test_type_channel() {
        let mut scheduler = CommentaryScheduler::new(SchedulerConfig {
            type_interval: 10.0,
            ..no_fill()
        });
        assert!(emitted(&scheduler.offer(&requesting(0.0, "TenZ"))));
        assert_eq!(
            scheduler.offer(&requesting(5.0, "ScreaM")),
            Decision::Suppress(SuppressReason::ChannelBusy)
        );
        let shield = GameEvent::new(
            5.0,
            EventKind::ShieldOwned {
                player: "Shroud".to_string(),
            },
        );
        assert!(emitted(&scheduler.offer(&shield)));
    }

    #[test]
    fn test_preferred_style_for_low_importance() {
        let mut scheduler = CommentaryScheduler::new(no_fill())
            .with_preferred_style(Some(CommentaryStyle::Analysis));
        match scheduler.offer(&requesting(1.0, "TenZ")) {
            Decision::Emit(request) => assert_eq!(request.style, CommentaryStyle::Analysis),
            other => panic!("expected emit, got {other:?}"),
        }
    }

    #[test]
    fn test_filler_cadence_over_quiet_stream() {
        let mut scheduler = CommentaryScheduler::new(SchedulerConfig::default());
        let mut fillers = Vec::new();
        for second in 0..25 {
            fillers.extend(scheduler.tick(second as f64));
        }
        fillers.extend(scheduler.flush(24.0));

        let times: Vec<f64> = fillers.iter().map(|r| r.event.timestamp).collect();
        assert_eq!(times, vec![12.0, 24.0]);
        assert_eq!(fillers[0].style, CommentaryStyle::PlayByPlay);
        assert_eq!(fillers[1].style, CommentaryStyle::Analysis);
    }

    #[test]
    fn test_filler_held_until_proximity_passes() {
        let mut scheduler = CommentaryScheduler::new(SchedulerConfig::default());
        scheduler.tick(0.0);
        assert!(scheduler.tick(12.0).is_empty());
        assert!(scheduler.tick(16.5).is_empty());
        let committed = scheduler.tick(17.0);
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].event.timestamp, 12.0);
    }

    #[test]
    fn test_event_cancels_nearby_filler() {
        let mut scheduler = CommentaryScheduler::new(SchedulerConfig::default());
        scheduler.tick(0.0);
        assert!(scheduler.tick(13.0).is_empty());
        assert!(emitted(&scheduler.offer(&requesting(13.0, "TenZ"))));
        // The next candidate counts from the real segment.
        assert!(scheduler.tick(20.0).is_empty());
        let fillers = scheduler.tick(30.0);
        assert_eq!(fillers.len(), 1);
        assert_eq!(fillers[0].event.timestamp, 25.0);
    }

    #[test]
    fn test_fillers_respect_proximity_of_real_segments() {
        let mut scheduler = CommentaryScheduler::new(SchedulerConfig::default());
        let mut segments = Vec::new();
        let mut fillers = Vec::new();
        for step in 0..=80 {
            let t = step as f64 * 0.5;
            fillers.extend(scheduler.tick(t));
            if step == 30 {
                if let Decision::Emit(r) = scheduler.offer(&requesting(t, "TenZ")) {
                    segments.push(r.event.timestamp);
                }
            }
        }
        fillers.extend(scheduler.flush(40.0));
        for filler in &fillers {
            for real in &segments {
                assert!((filler.event.timestamp - real).abs() >= 5.0);
            }
        }
        assert!(!fillers.is_empty());
    }

    #[test]
    fn test_fill_disabled() {
        let mut scheduler = CommentaryScheduler::new(no_fill());
        for second in 0..60 {
            assert!(scheduler.tick(second as f64).is_empty());
        }
        assert!(scheduler.flush(60.0).is_empty());
    }

    #[test]
    fn test_flush_without_activity() {
        let mut scheduler = CommentaryScheduler::new(SchedulerConfig::default());
        assert!(scheduler.flush(5.0).is_empty());
    }
}
