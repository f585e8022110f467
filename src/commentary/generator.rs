//! Renders commentary requests into text.

use crate::commentary::templates::{TemplateBank, fill};
use crate::commentary::types::{CommentaryRequest, CommentarySegment, CommentaryStyle};
use crate::events::types::{EventKind, EventType};
use crate::state::GameState;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::HashMap;

/// Identifies one template list for repeat avoidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BankKey {
    Event(EventType, CommentaryStyle),
    Generic,
}

/// Template selection with an injectable random source.
///
/// Which template is picked depends on the RNG; how it is filled does not.
/// The same template is never picked twice in a row for a bank that has
/// more than one usable entry.
pub struct CommentaryGenerator {
    bank: TemplateBank,
    rng: Box<dyn RngCore + Send>,
    last_pick: HashMap<BankKey, String>,
}

impl CommentaryGenerator {
    pub fn new(bank: TemplateBank, rng: impl RngCore + Send + 'static) -> Self {
        Self {
            bank,
            rng: Box::new(rng),
            last_pick: HashMap::new(),
        }
    }

    /// Built-in templates with a reproducible seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(TemplateBank::builtin(), StdRng::seed_from_u64(seed))
    }

    /// Built-in templates, seeded from `seed` if given, else from entropy.
    pub fn with_optional_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::new(TemplateBank::builtin(), StdRng::from_entropy()),
        }
    }

    /// Renders `request` against the current match state.
    pub fn render(&mut self, request: &CommentaryRequest, state: &GameState) -> CommentarySegment {
        let event_type = request.event.event_type();
        let value = |name: &str| placeholder_value(name, &request.event.kind, state);

        let mut chosen = None;
        for style in [request.style, CommentaryStyle::PlayByPlay] {
            let usable: Vec<(String, String)> = self
                .bank
                .get(event_type, style)
                .iter()
                .filter_map(|t| fill(t, value).map(|text| (t.clone(), text)))
                .collect();
            if !usable.is_empty() {
                chosen = Some(self.pick(BankKey::Event(event_type, style), usable));
                break;
            }
        }

        let mut text = match chosen {
            Some(text) => text,
            None => {
                let generic: Vec<(String, String)> = self
                    .bank
                    .generic()
                    .iter()
                    .map(|t| (t.clone(), t.clone()))
                    .collect();
                if generic.is_empty() {
                    event_type.as_str().replace('_', " ")
                } else {
                    self.pick(BankKey::Generic, generic)
                }
            }
        };

        if let Some(location) = &request.event.location {
            text.push_str(&format!(" Position: {location}."));
        }
        CommentarySegment::new(request, text)
    }

    fn pick(&mut self, key: BankKey, usable: Vec<(String, String)>) -> String {
        let last = self.last_pick.get(&key);
        let mut candidates: Vec<&(String, String)> = usable
            .iter()
            .filter(|(template, _)| Some(template) != last)
            .collect();
        if candidates.is_empty() {
            candidates = usable.iter().collect();
        }
        let index = self.rng.gen_range(0..candidates.len());
        let (template, text) = candidates[index].clone();
        self.last_pick.insert(key, template);
        text
    }
}

fn placeholder_value(name: &str, kind: &EventKind, state: &GameState) -> Option<String> {
    match (name, kind) {
        ("player", EventKind::Elimination { player, .. })
        | ("player", EventKind::Headshot { player })
        | ("player", EventKind::RequestingWeapon { player, .. })
        | ("player", EventKind::WeaponOwned { player, .. })
        | ("player", EventKind::ShieldOwned { player })
        | ("player", EventKind::AbilityUsed { player, .. }) => Some(player.clone()),
        ("weapon", EventKind::Elimination { weapon, .. }) => weapon.clone(),
        ("weapon", EventKind::RequestingWeapon { weapon, .. })
        | ("weapon", EventKind::WeaponOwned { weapon, .. }) => Some(weapon.clone()),
        ("ability", EventKind::AbilityUsed { ability, .. }) => Some(ability.clone()),
        ("score", EventKind::ScoreChange { team1, team2, .. }) => Some(format!("{team1}-{team2}")),
        ("score", _) => Some(format!("{}-{}", state.score.0, state.score.1)),
        ("round", EventKind::ScoreChange { round, .. })
        | ("round", EventKind::RoundPhaseChange { round, .. }) => Some(round.to_string()),
        ("round", _) => Some(state.round.to_string()),
        ("phase", EventKind::RoundPhaseChange { phase, .. }) => {
            Some(phase.as_str().to_lowercase().replace('_', "-"))
        }
        ("map", _) => state.map.clone(),
        ("agent", _) => state.agent.clone(),
        _ => None,
    }
}
