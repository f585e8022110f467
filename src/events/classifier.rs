//! Rule-based classification of detection text into game events.
//!
//! Classification is a pure function of the detection records and the
//! classifier's tables: no clock, no randomness, no state. Each record is
//! matched against [`RULE_ORDER`]; the first rule that matches decides the
//! event and later rules are not consulted.

use crate::defaults;
use crate::events::aliases::{AliasTable, display_name, keywords};
use crate::events::types::{EventKind, GameEvent};
use crate::perception::types::{DetectionRecord, Region};
use regex::Regex;
use std::sync::LazyLock;

static SCORE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\d:])(\d{1,2})\s*-\s*(\d{1,2})(?:$|[^\d:])").ok());

/// Classification rules in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Elimination,
    Headshot,
    SpikePlant,
    SpikeDefuse,
    RequestingWeapon,
    WeaponOwned,
    ShieldOwned,
    AbilityUsed,
    Score,
}

pub const RULE_ORDER: [Rule; 9] = [
    Rule::Elimination,
    Rule::Headshot,
    Rule::SpikePlant,
    Rule::SpikeDefuse,
    Rule::RequestingWeapon,
    Rule::WeaponOwned,
    Rule::ShieldOwned,
    Rule::AbilityUsed,
    Rule::Score,
];

/// Lowercased, tokenized view of one record's text.
struct TextView<'a> {
    region: Region,
    normalized: String,
    tokens: Vec<String>,
    original: Vec<&'a str>,
}

impl<'a> TextView<'a> {
    fn new(region: Region, text: &'a str) -> Self {
        let original: Vec<&str> = text
            .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == ':'))
            .filter(|t| !t.is_empty())
            .collect();
        let tokens: Vec<String> = original.iter().map(|t| t.to_lowercase()).collect();
        Self {
            region,
            normalized: tokens.join(" "),
            tokens,
            original,
        }
    }

    fn has_any(&self, words: &[&str]) -> bool {
        self.tokens.iter().any(|t| words.contains(&t.as_str()))
    }

    fn has_prefix(&self, prefix: &str) -> bool {
        self.tokens.iter().any(|t| t.starts_with(prefix))
    }
}

/// Keyword tables plus the known roster.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    weapons: AliasTable,
    abilities: AliasTable,
    locations: AliasTable,
    roster: Vec<String>,
    extract_locations: bool,
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new(
            defaults::DEFAULT_ROSTER
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

impl EventClassifier {
    pub fn new(roster: Vec<String>) -> Self {
        Self {
            weapons: AliasTable::weapons(),
            abilities: AliasTable::abilities(),
            locations: AliasTable::locations(),
            roster,
            extract_locations: true,
        }
    }

    pub fn with_weapons(mut self, weapons: AliasTable) -> Self {
        self.weapons = weapons;
        self
    }

    pub fn with_location_extraction(mut self, enabled: bool) -> Self {
        self.extract_locations = enabled;
        self
    }

    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// Classifies every record, keeping record order, then orders the result
    /// by timestamp (stable, so same-time events keep record order).
    pub fn classify(&self, records: &[DetectionRecord]) -> Vec<GameEvent> {
        let mut events: Vec<GameEvent> = records
            .iter()
            .filter_map(|record| self.classify_record(record))
            .collect();
        events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        events
    }

    /// Classifies a single record, or `None` when no rule matches.
    pub fn classify_record(&self, record: &DetectionRecord) -> Option<GameEvent> {
        let text = record.text.as_deref()?;
        let view = TextView::new(record.region, text);
        if view.tokens.is_empty() {
            return None;
        }
        let kind = RULE_ORDER
            .iter()
            .find_map(|&rule| self.apply(rule, &view))?;
        let location = if self.extract_locations {
            self.locations
                .resolve_phrase(&view.normalized)
                .map(display_name)
        } else {
            None
        };
        Some(GameEvent::new(record.timestamp, kind).with_location(location))
    }

    fn apply(&self, rule: Rule, view: &TextView<'_>) -> Option<EventKind> {
        match rule {
            Rule::Elimination => {
                let weapon = self.weapon(view);
                let by_keyword = view.has_any(keywords::KILL);
                let by_feed = view.region == Region::KillFeed && weapon.is_some();
                (by_keyword || by_feed).then(|| EventKind::Elimination {
                    player: self.player(view),
                    weapon,
                })
            }
            Rule::Headshot => view
                .has_any(keywords::HEADSHOT)
                .then(|| EventKind::Headshot {
                    player: self.player(view),
                }),
            Rule::SpikePlant => {
                let planted = view.has_prefix(keywords::PLANT_PREFIX);
                let spike_only =
                    view.has_any(keywords::SPIKE) && !view.has_prefix(keywords::DEFUSE_PREFIX);
                (planted || spike_only).then_some(EventKind::SpikePlant)
            }
            Rule::SpikeDefuse => view
                .has_prefix(keywords::DEFUSE_PREFIX)
                .then_some(EventKind::SpikeDefuse),
            Rule::RequestingWeapon => {
                if !view.has_any(keywords::REQUESTING) {
                    return None;
                }
                self.weapon(view).map(|weapon| EventKind::RequestingWeapon {
                    player: self.player(view),
                    weapon,
                })
            }
            Rule::WeaponOwned => {
                if !view.has_any(keywords::OWNED) {
                    return None;
                }
                self.weapon(view).map(|weapon| EventKind::WeaponOwned {
                    player: self.player(view),
                    weapon,
                })
            }
            Rule::ShieldOwned => {
                if !(view.has_any(keywords::SHIELD) && view.has_any(keywords::OWNED)) {
                    return None;
                }
                Some(EventKind::ShieldOwned {
                    player: self.player(view),
                })
            }
            Rule::AbilityUsed => self.abilities.resolve(&view.tokens).map(|ability| {
                EventKind::AbilityUsed {
                    player: self.player(view),
                    ability: display_name(ability),
                }
            }),
            Rule::Score => {
                let caps = SCORE_RE.as_ref()?.captures(&view.normalized)?;
                let team1: u32 = caps.get(1)?.as_str().parse().ok()?;
                let team2: u32 = caps.get(2)?.as_str().parse().ok()?;
                Some(EventKind::ScoreChange {
                    team1,
                    team2,
                    round: team1 + team2 + 1,
                })
            }
        }
    }

    fn weapon(&self, view: &TextView<'_>) -> Option<String> {
        self.weapons.resolve(&view.tokens).map(display_name)
    }

    fn is_keyword(&self, token: &str) -> bool {
        [
            keywords::KILL,
            keywords::HEADSHOT,
            keywords::REQUESTING,
            keywords::OWNED,
            keywords::SHIELD,
            keywords::SPIKE,
        ]
        .iter()
        .any(|group| group.contains(&token))
            || token.starts_with(keywords::PLANT_PREFIX)
            || token.starts_with(keywords::DEFUSE_PREFIX)
            || self.weapons.contains_token(token)
            || self.abilities.contains_token(token)
            || self.locations.contains_word(token)
    }

    /// Roster name if any token matches one (case-insensitive, roster
    /// spelling kept); otherwise the first token that is not a keyword.
    fn player(&self, view: &TextView<'_>) -> String {
        if let Some(name) = self.roster.iter().find(|name| {
            let lower = name.to_lowercase();
            view.tokens.iter().any(|t| *t == lower)
        }) {
            return name.clone();
        }

        view.original
            .iter()
            .zip(&view.tokens)
            .find(|(_, lower)| {
                lower.chars().count() > 1
                    && lower.chars().any(|c| c.is_alphabetic())
                    && !self.is_keyword(lower)
                    && !lower.contains(':')
            })
            .map(|(original, _)| normalize_name(original))
            .unwrap_or_else(|| defaults::UNKNOWN_PLAYER.to_string())
    }
}

/// OCR often returns names in one case; give those a readable form and keep
/// mixed-case names as they are.
fn normalize_name(token: &str) -> String {
    let all_upper = token.chars().all(|c| !c.is_lowercase());
    let all_lower = token.chars().all(|c| !c.is_uppercase());
    if all_upper || all_lower {
        let lower = token.to_lowercase();
        display_name(&lower)
    } else {
        token.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::EventType;

    fn record(region: Region, text: &str) -> DetectionRecord {
        DetectionRecord::text(region, text, 0.9, 12.0)
    }

    fn classify(region: Region, text: &str) -> Option<EventKind> {
        EventClassifier::default()
            .classify_record(&record(region, text))
            .map(|e| e.kind)
    }

    #[test]
    fn test_requesting_weapon_with_roster_player() {
        let kind = classify(Region::Center, "REQUESTING VANDAL TENZ").unwrap();
        assert_eq!(
            kind,
            EventKind::RequestingWeapon {
                player: "TenZ".to_string(),
                weapon: "Vandal".to_string(),
            }
        );
    }

    #[test]
    fn test_requesting_importance() {
        let event = EventClassifier::default()
            .classify_record(&record(Region::Center, "REQUESTING VANDAL TENZ"))
            .unwrap();
        assert_eq!(event.importance, 3);
        assert_eq!(event.timestamp, 12.0);
    }

    #[test]
    fn test_misspelled_weapon_owned() {
        let kind = classify(Region::Center, "OWNED FANTOM ScreaM").unwrap();
        assert_eq!(
            kind,
            EventKind::WeaponOwned {
                player: "ScreaM".to_string(),
                weapon: "Phantom".to_string(),
            }
        );
    }

    #[test]
    fn test_equipped_counts_as_owned() {
        let kind = classify(Region::Center, "EQUIPPED Operator Shroud").unwrap();
        assert_eq!(kind.event_type(), EventType::WeaponOwned);
    }

    #[test]
    fn test_first_declared_weapon_wins() {
        let kind = classify(Region::Center, "OWNED vandal ghost TenZ").unwrap();
        assert_eq!(
            kind,
            EventKind::WeaponOwned {
                player: "TenZ".to_string(),
                weapon: "Vandal".to_string(),
            }
        );
        let kind = classify(Region::Center, "OWNED ghost vandal TenZ").unwrap();
        assert!(matches!(kind, EventKind::WeaponOwned { weapon, .. } if weapon == "Vandal"));
    }

    #[test]
    fn test_kill_feed_weapon_is_elimination() {
        let kind = classify(Region::KillFeed, "Shroud Vandal").unwrap();
        assert_eq!(
            kind,
            EventKind::Elimination {
                player: "Shroud".to_string(),
                weapon: Some("Vandal".to_string()),
            }
        );
    }

    #[test]
    fn test_weapon_outside_kill_feed_is_not_elimination() {
        assert_eq!(classify(Region::Center, "Shroud Vandal"), None);
    }

    #[test]
    fn test_kill_keyword_beats_headshot() {
        let kind = classify(Region::Center, "TenZ eliminated headshot").unwrap();
        assert_eq!(kind.event_type(), EventType::Elimination);
    }

    #[test]
    fn test_headshot() {
        let kind = classify(Region::Center, "HEADSHOT Player1").unwrap();
        assert_eq!(
            kind,
            EventKind::Headshot {
                player: "Player1".to_string()
            }
        );
    }

    #[test]
    fn test_spike_plant_and_defuse() {
        assert_eq!(
            classify(Region::Center, "SPIKE PLANTED"),
            Some(EventKind::SpikePlant)
        );
        assert_eq!(
            classify(Region::Center, "SPIKE DEFUSED"),
            Some(EventKind::SpikeDefuse)
        );
        assert_eq!(
            classify(Region::Center, "defusing"),
            Some(EventKind::SpikeDefuse)
        );
    }

    #[test]
    fn test_shield_owned() {
        let kind = classify(Region::BuyMenu, "HEAVY SHIELDS OWNED").unwrap();
        assert_eq!(
            kind,
            EventKind::ShieldOwned {
                player: "Heavy".to_string()
            }
        );
    }

    #[test]
    fn test_shield_without_owned_keyword() {
        assert_eq!(classify(Region::BuyMenu, "HEAVY SHIELDS"), None);
    }

    #[test]
    fn test_ability_used() {
        let kind = classify(Region::Abilities, "ScreaM SMOKES").unwrap();
        assert_eq!(
            kind,
            EventKind::AbilityUsed {
                player: "ScreaM".to_string(),
                ability: "Smoke".to_string(),
            }
        );
    }

    #[test]
    fn test_score_candidate() {
        let kind = classify(Region::Scoreboard, "12-10").unwrap();
        assert_eq!(
            kind,
            EventKind::ScoreChange {
                team1: 12,
                team2: 10,
                round: 23,
            }
        );
        assert_eq!(
            classify(Region::Scoreboard, "3 - 4"),
            Some(EventKind::ScoreChange {
                team1: 3,
                team2: 4,
                round: 8
            })
        );
    }

    #[test]
    fn test_timer_is_not_score() {
        assert_eq!(classify(Region::Timer, "1:39"), None);
        assert_eq!(classify(Region::Timer, "BUY PHASE"), None);
    }

    #[test]
    fn test_unknown_player_fallback() {
        let kind = classify(Region::Center, "REQUESTING VANDAL").unwrap();
        assert_eq!(
            kind,
            EventKind::RequestingWeapon {
                player: "Player".to_string(),
                weapon: "Vandal".to_string(),
            }
        );
    }

    #[test]
    fn test_unrosted_player_normalized() {
        let kind = classify(Region::Center, "REQUESTING ODIN YAY").unwrap();
        assert_eq!(
            kind,
            EventKind::RequestingWeapon {
                player: "Yay".to_string(),
                weapon: "Odin".to_string(),
            }
        );
    }

    #[test]
    fn test_location_extracted() {
        let event = EventClassifier::default()
            .classify_record(&record(Region::Center, "SPIKE PLANTED A SITE"))
            .unwrap();
        assert_eq!(event.location.as_deref(), Some("A Site"));

        let event = EventClassifier::default()
            .with_location_extraction(false)
            .classify_record(&record(Region::Center, "SPIKE PLANTED A SITE"))
            .unwrap();
        assert_eq!(event.location, None);
    }

    #[test]
    fn test_no_text_no_event() {
        let mut r = record(Region::Center, "");
        assert!(EventClassifier::default().classify_record(&r).is_none());
        r.text = None;
        assert!(EventClassifier::default().classify_record(&r).is_none());
    }

    #[test]
    fn test_classify_is_pure_and_ordered() {
        let classifier = EventClassifier::default();
        let records = vec![
            DetectionRecord::text(Region::Center, "SPIKE PLANTED", 0.9, 5.0),
            DetectionRecord::text(Region::Center, "REQUESTING VANDAL TENZ", 0.9, 2.0),
            DetectionRecord::text(Region::Center, "nothing here", 0.9, 3.0),
        ];
        let first = classifier.classify(&records);
        let second = classifier.classify(&records);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first[0].timestamp <= first[1].timestamp);
    }
}
