//! Shared normalization for area names, geo names and property types.
//!
//! Every component that compares free-text locations goes through
//! [`GeoNormalizer`] so that matching behaves the same in the matcher, the
//! signal router and the concentration check.

use std::collections::HashMap;

const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("jvc", "jumeirah village circle"),
    ("jvt", "jumeirah village triangle"),
    ("jlt", "jumeirah lake towers"),
    ("jbr", "jumeirah beach residence"),
    ("difc", "dubai international financial centre"),
    ("dip", "dubai investments park"),
    ("mbr city", "mohammed bin rashid city"),
    ("apt", "apartment"),
    ("flat", "apartment"),
];

#[derive(Clone, Debug)]
pub struct GeoNormalizer {
    aliases: HashMap<String, String>,
}

impl Default for GeoNormalizer {
    fn default() -> Self {
        Self::with_aliases(DEFAULT_ALIASES.iter().copied())
    }
}

impl GeoNormalizer {
    pub fn with_aliases<'a>(aliases: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let aliases = aliases
            .into_iter()
            .map(|(alias, canonical)| (fold(alias), fold(canonical)))
            .filter(|(alias, canonical)| !alias.is_empty() && !canonical.is_empty())
            .collect();
        Self { aliases }
    }

    /// Lowercase, punctuation folded to spaces, whitespace collapsed, then a
    /// whole-string alias lookup.
    pub fn normalize(&self, value: &str) -> String {
        let folded = fold(value);
        self.aliases.get(&folded).cloned().unwrap_or(folded)
    }

    /// Equal, or one side contains the other after normalization.
    pub fn matches(&self, candidate: &str, preference: &str) -> bool {
        let candidate = self.normalize(candidate);
        let preference = self.normalize(preference);
        if candidate.is_empty() || preference.is_empty() {
            return false;
        }
        candidate == preference
            || candidate.contains(preference.as_str())
            || preference.contains(candidate.as_str())
    }

    /// First preference that matches the candidate, in preference order.
    pub fn first_match<'a>(&self, candidate: &str, preferences: &'a [String]) -> Option<&'a str> {
        preferences
            .iter()
            .find(|preference| self.matches(candidate, preference))
            .map(String::as_str)
    }
}

fn fold(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|character| if character.is_alphanumeric() { character } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
