//! Template banks keyed by event type and style.
//!
//! Templates use `{name}` placeholders. A template is only eligible when
//! every placeholder it names can be filled for the event at hand.

use crate::commentary::types::CommentaryStyle;
use crate::events::types::EventType;
use std::collections::HashMap;

/// Placeholder names a template may use.
pub const PLACEHOLDERS: &[&str] = &[
    "player", "weapon", "score", "round", "ability", "phase", "map", "agent",
];

#[derive(Debug, Clone, Default)]
pub struct TemplateBank {
    entries: HashMap<(EventType, CommentaryStyle), Vec<String>>,
    generic: Vec<String>,
}

impl TemplateBank {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert<I, S>(&mut self, event_type: EventType, style: CommentaryStyle, templates: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .entry((event_type, style))
            .or_default()
            .extend(templates.into_iter().map(Into::into));
    }

    /// Lines used when no bank for the event type has a usable template.
    /// They must not contain placeholders.
    pub fn set_generic<I, S>(&mut self, templates: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generic = templates.into_iter().map(Into::into).collect();
    }

    pub fn get(&self, event_type: EventType, style: CommentaryStyle) -> &[String] {
        self.entries
            .get(&(event_type, style))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn generic(&self) -> &[String] {
        &self.generic
    }

    /// The stock commentary lines.
    pub fn builtin() -> Self {
        use CommentaryStyle::*;
        use EventType::*;

        let mut bank = Self::empty();

        bank.insert(
            Elimination,
            PlayByPlay,
            [
                "{player} takes the fight with the {weapon} and wins it.",
                "{player} picks one off with the {weapon}.",
                "{player} gets the frag. One fewer on the other side.",
                "Another one down, courtesy of {player}.",
            ],
        );
        bank.insert(
            Elimination,
            Excitement,
            [
                "{player} with the {weapon}! Down goes another one!",
                "What a frag from {player}! The aggression is paying off!",
                "{player} deletes them! The momentum is building!",
                "Clean elimination from {player}, and this could swing the round!",
            ],
        );
        bank.insert(
            Elimination,
            Analysis,
            [
                "{player} held that angle perfectly and got rewarded for it.",
                "Good trade potential there from {player}; watch the follow-up.",
            ],
        );

        bank.insert(
            Headshot,
            Excitement,
            [
                "HEADSHOT! {player} with pure precision!",
                "One tap from {player}! That's how you do it!",
                "{player} clicks heads, and the crowd goes wild!",
                "Crosshair placement pays off again for {player}!",
            ],
        );
        bank.insert(
            Headshot,
            PlayByPlay,
            [
                "Headshot from {player}.",
                "{player} lands it right on the head.",
            ],
        );

        bank.insert(
            SpikePlant,
            Excitement,
            [
                "Spike is down! The pressure is on the defenders now!",
                "Plant secured, and now it's all about the retake!",
                "The spike is down and the clock is ticking!",
                "They get the plant off! This round just got intense!",
            ],
        );
        bank.insert(
            SpikePlant,
            PlayByPlay,
            [
                "The spike has been planted in round {round}.",
                "Plant goes down. Defenders have to come to them now.",
            ],
        );

        bank.insert(
            SpikeDefuse,
            Excitement,
            [
                "They're on the defuse! Can they get it?",
                "Defuse in progress and the tension is unbearable!",
                "Clutch defuse attempt, everything on the line!",
                "Going for the defuse, and this could save the round!",
            ],
        );
        bank.insert(
            SpikeDefuse,
            PlayByPlay,
            ["Defuse attempt underway.", "Someone is tapping the spike."],
        );

        bank.insert(
            RequestingWeapon,
            PlayByPlay,
            [
                "{player} is calling for a {weapon}. The team needs to step up!",
                "{player} asks for the {weapon}. Will somebody drop one?",
                "{player} is short on credits and wants a {weapon}.",
                "Request on the board: {weapon} for {player}.",
            ],
        );
        bank.insert(
            RequestingWeapon,
            Analysis,
            [
                "{player} asking for a {weapon} tells you exactly where this economy is.",
                "A {weapon} request from {player}; teams that share credits win rounds like this.",
            ],
        );

        bank.insert(
            WeaponOwned,
            PlayByPlay,
            [
                "{player} locks in the {weapon}. Let's go!",
                "{player} has the {weapon} ready for this round.",
                "{player} is equipped with the {weapon}.",
                "The {weapon} is in the hands of {player}.",
            ],
        );
        bank.insert(
            WeaponOwned,
            Analysis,
            [
                "The {weapon} on {player} shapes how this team will play the round.",
                "{player} on the {weapon} means they want to hold angles.",
            ],
        );

        bank.insert(
            ShieldOwned,
            PlayByPlay,
            [
                "{player} picks up shields.",
                "Armor on {player}. Smart buy.",
                "{player} is not going in naked this round.",
            ],
        );

        bank.insert(
            AbilityUsed,
            PlayByPlay,
            [
                "{player} uses the {ability}.",
                "{ability} from {player}, and the setup is developing.",
                "Utility out: {player} with the {ability}.",
                "{player} throws the {ability} at the perfect moment.",
            ],
        );

        bank.insert(
            RoundPhaseChange,
            PlayByPlay,
            [
                "Round {round} is in the {phase} phase.",
                "We move into {phase} for round {round}.",
                "Round {round}: {phase}.",
            ],
        );
        bank.insert(
            RoundPhaseChange,
            Excitement,
            [
                "Round {round} is live, so let's see what they've got!",
                "Here we go, round {round}!",
            ],
        );

        bank.insert(
            ScoreChange,
            PlayByPlay,
            [
                "The score is {score} heading into round {round}.",
                "{score} on the board. Economy plays a crucial role in this next round.",
                "It's {score}. The buy decisions are about to matter.",
                "Round {round} coming up at {score}, and the economic call will be key.",
            ],
        );
        bank.insert(
            ScoreChange,
            Analysis,
            [
                "At {score}, both sides have to think hard about their economy.",
                "{score}: the last round's result will shape the buys we see now.",
            ],
        );

        bank.insert(
            GenericFiller,
            PlayByPlay,
            [
                "The tactical positioning continues to evolve.",
                "Both teams are feeling each other out right now.",
                "Quiet moment, but nobody is relaxing.",
                "Players are weighing their options carefully; every credit counts.",
                "Team coordination is key as they allocate resources.",
                "Round {round} keeps ticking along.",
            ],
        );
        bank.insert(
            GenericFiller,
            Analysis,
            [
                "From a tactical standpoint, the spacing here makes a lot of sense.",
                "Notice how they are saving utility for the retake.",
                "The risk and reward calculation in this round is fascinating.",
                "This default gives them information without overcommitting.",
                "Map control on {map} has been the story of this half.",
            ],
        );
        bank.insert(
            GenericFiller,
            Excitement,
            [
                "You can feel the energy building!",
                "Something is about to break open here!",
                "The intensity is palpable!",
                "Championship-level decision making right before our eyes!",
            ],
        );
        bank.insert(
            GenericFiller,
            Educational,
            [
                "For newer players: watch how they balance weapons and utility.",
                "Crosshair placement at head level wins more duels than fast flicks.",
                "Pay attention to how they trade for each other.",
                "Communication during the buy phase decides a lot of rounds.",
                "On {agent}, timing your utility with the team is everything.",
            ],
        );

        bank.set_generic([
            "The action continues.",
            "Both sides are playing it carefully.",
            "Let's keep an eye on how this develops.",
        ]);

        bank
    }
}

/// Placeholder names used by `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                names.push(&after[..close]);
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    names
}

/// Substitutes placeholders. Returns `None` if any placeholder has no value.
pub fn fill(template: &str, value: impl Fn(&str) -> Option<String>) -> Option<String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}')?;
        out.push_str(&value(&after[..close])?);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}
