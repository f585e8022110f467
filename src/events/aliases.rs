//! Keyword and alias tables used to read noisy HUD text.
//!
//! OCR output is inconsistent: "VANDL", "fantom", "OPERATR". Each table maps
//! a canonical name to the spellings that should resolve to it. Matching is
//! token based and case-insensitive; when several entries match, the one
//! declared first wins.

/// Ordered table of canonical names and their accepted spellings.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasTable {
    entries: Vec<AliasEntry>,
}

#[derive(Debug, Clone, PartialEq)]
struct AliasEntry {
    canonical: String,
    aliases: Vec<String>,
}

impl AliasTable {
    /// Builds a table from `(canonical, aliases)` pairs.
    ///
    /// The canonical name itself always matches, whether or not it is listed.
    pub fn new<I, S, A>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, A)>,
        S: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(canonical, aliases)| {
                let canonical = canonical.into().to_lowercase();
                let mut aliases: Vec<String> = aliases
                    .into_iter()
                    .map(|a| a.into().to_lowercase())
                    .collect();
                if !aliases.contains(&canonical) {
                    aliases.insert(0, canonical.clone());
                }
                AliasEntry { canonical, aliases }
            })
            .collect();
        Self { entries }
    }

    /// Weapon table covering the full arsenal and common misreads.
    pub fn weapons() -> Self {
        Self::new([
            ("vandal", vec!["vandal", "vandl", "vanda"]),
            ("phantom", vec!["phantom", "fantom", "phant"]),
            ("operator", vec!["operator", "op", "opertr", "operatr"]),
            ("ghost", vec!["ghost", "gost", "ghst"]),
            ("sheriff", vec!["sheriff", "sherif"]),
            ("classic", vec!["classic", "clasic"]),
            ("spectre", vec!["spectre", "specter"]),
            ("judge", vec!["judge", "juge"]),
            ("odin", vec!["odin", "odn"]),
            ("ares", vec!["ares"]),
            ("bulldog", vec!["bulldog", "buldog"]),
            ("guardian", vec!["guardian", "guardain"]),
            ("marshal", vec!["marshal", "marshall"]),
            ("outlaw", vec!["outlaw"]),
            ("frenzy", vec!["frenzy", "frenzi"]),
            ("stinger", vec!["stinger"]),
            ("bucky", vec!["bucky"]),
            ("shorty", vec!["shorty"]),
        ])
    }

    /// Agent ability keywords as they appear on kill feed and ability HUD.
    pub fn abilities() -> Self {
        let names = [
            "flash",
            "smoke",
            "wall",
            "dart",
            "drone",
            "trap",
            "heal",
            "resurrection",
            "teleport",
            "dash",
            "updraft",
            "shock",
            "molly",
            "grenade",
            "barrier",
            "cage",
            "orb",
            "blade",
        ];
        Self::new(names.into_iter().map(|name| {
            let plural = if name.ends_with('h') || name.ends_with('s') {
                format!("{name}es")
            } else {
                format!("{name}s")
            };
            (name.to_string(), vec![name.to_string(), plural])
        }))
    }

    /// Map callouts, longest phrases first so "a site" beats "site".
    pub fn locations() -> Self {
        Self::new([
            ("a site", vec!["a site"]),
            ("b site", vec!["b site"]),
            ("c site", vec!["c site"]),
            ("connector", vec!["connector"]),
            ("balcony", vec!["balcony"]),
            ("heaven", vec!["heaven"]),
            ("hell", vec!["hell"]),
            ("mid", vec!["mid"]),
            ("long", vec!["long"]),
            ("short", vec!["short"]),
            ("ramp", vec!["ramp"]),
            ("stairs", vec!["stairs"]),
            ("window", vec!["window"]),
            ("default", vec!["default"]),
        ])
    }

    /// Returns the canonical name of the first declared entry with a spelling
    /// among `tokens`. Tokens must already be lowercase.
    pub fn resolve<S: AsRef<str>>(&self, tokens: &[S]) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| {
                tokens
                    .iter()
                    .any(|token| entry.aliases.iter().any(|alias| alias == token.as_ref()))
            })
            .map(|entry| entry.canonical.as_str())
    }

    /// Like [`resolve`](Self::resolve) but matches whole phrases inside
    /// whitespace-normalized lowercase text.
    pub fn resolve_phrase(&self, normalized: &str) -> Option<&str> {
        let padded = format!(" {normalized} ");
        self.entries
            .iter()
            .find(|entry| {
                entry
                    .aliases
                    .iter()
                    .any(|alias| padded.contains(&format!(" {alias} ")))
            })
            .map(|entry| entry.canonical.as_str())
    }

    /// True when `token` is any spelling in the table.
    pub fn contains_token(&self, token: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.aliases.iter().any(|alias| alias == token))
    }

    /// True when `token` is one word of any (possibly multi-word) spelling.
    pub fn contains_word(&self, token: &str) -> bool {
        self.entries.iter().any(|entry| {
            entry
                .aliases
                .iter()
                .any(|alias| alias.split_whitespace().any(|word| word == token))
        })
    }
}

/// Plain keyword groups that drive rule matching.
pub mod keywords {
    pub const KILL: &[&str] = &["killed", "kill", "kills", "eliminated", "elim", "elims"];
    pub const HEADSHOT: &[&str] = &["headshot", "hs"];
    pub const REQUESTING: &[&str] = &["requesting", "request", "req", "requested"];
    pub const OWNED: &[&str] = &["owned", "ownd", "own", "equipped", "omned"];
    pub const SHIELD: &[&str] = &["shield", "shields", "armor"];
    pub const SPIKE: &[&str] = &["spike"];
    pub const PLANT_PREFIX: &str = "plant";
    pub const DEFUSE_PREFIX: &str = "defus";
}

/// Title-cases a canonical name for display ("a site" becomes "A Site").
pub fn display_name(canonical: &str) -> String {
    canonical
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
