//! Canonicalises free-form team and referee strings into the identifiers the
//! data tables are keyed by. Sources disagree on suffixes ("FC"), short forms
//! and localised spellings; every lookup funnels through here so no evaluator
//! ever branches on a raw feed string. Resolution fails soft: an unresolved
//! string comes back unchanged and downstream treats the entity as unknown.

use rustc_hash::{FxHashMap, FxHashSet};
use strsim::jaro_winkler;
use tracing::debug;

use crate::store::{NameMapping, Store, StoreError};

/// Suffix/prefix noise stripped during normalisation.
const STOP_TOKENS: &[&str] = &["fc", "cf", "afc", "sc", "ac", "cd"];

/// Localised articles that some feeds prepend.
const ARTICLES: &[&str] = &["the", "el", "la", "le", "los", "las", "al", "de"];

/// Closed short-form substitutions, applied on the whole normalised string.
const SHORTFORMS: &[(&str, &str)] = &[
    ("spurs", "tottenham hotspur"),
    ("man utd", "manchester united"),
    ("man united", "manchester united"),
    ("man city", "manchester city"),
    ("wolves", "wolverhampton wanderers"),
    ("barca", "barcelona"),
    ("inter", "internazionale"),
    ("psg", "paris saint-germain"),
];

const MIN_WORD_OVERLAP: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Canonical(String),
    Candidates(Vec<String>),
}

struct Entry {
    canonical: String,
    normalized: String,
    words: FxHashSet<String>,
}

pub struct NameResolver {
    entries: Vec<Entry>,
    aliases: FxHashMap<String, String>,
}

/// Lower-cases, drops stop tokens, year digits and leading articles, and
/// collapses whitespace. "Borussia Dortmund 1909 FC" and "borussia dortmund"
/// normalise to the same string.
pub fn normalise(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let mut words: Vec<&str> = lowered
        .split_whitespace()
        .filter(|word| {
            if STOP_TOKENS.contains(word) {
                return false;
            }
            if word.len() == 4 && word.chars().all(|ch| ch.is_ascii_digit()) {
                return false;
            }
            true
        })
        .collect();
    while let Some(first) = words.first() {
        if ARTICLES.contains(first) {
            words.remove(0);
        } else {
            break;
        }
    }
    let mut joined = words.join(" ");
    for (short, full) in SHORTFORMS {
        if joined == *short {
            joined = (*full).into();
            break;
        }
    }
    joined
}

fn word_set(normalized: &str) -> FxHashSet<String> {
    normalized.split_whitespace().map(Into::into).collect()
}

fn overlap(a: &FxHashSet<String>, b: &FxHashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}

impl NameResolver {
    pub fn new(mappings: &[NameMapping]) -> Self {
        let mut seen = FxHashSet::default();
        let mut entries = Vec::new();
        let mut aliases: FxHashMap<String, String> = FxHashMap::default();
        // verified mappings win over unverified ones for the same source string
        let mut verified: FxHashMap<String, bool> = FxHashMap::default();
        for mapping in mappings {
            if seen.insert(mapping.canonical_name.clone()) {
                let normalized = normalise(&mapping.canonical_name);
                entries.push(Entry {
                    canonical: mapping.canonical_name.clone(),
                    words: word_set(&normalized),
                    normalized,
                });
            }
            let alias_key = normalise(&mapping.source_name);
            let existing_verified = verified.get(&alias_key).copied().unwrap_or(false);
            if !existing_verified || mapping.is_verified {
                aliases.insert(alias_key.clone(), mapping.canonical_name.clone());
                verified.insert(alias_key, mapping.is_verified);
            }
        }
        Self { entries, aliases }
    }

    pub async fn load(store: &dyn Store) -> Result<Self, StoreError> {
        let mappings = store.name_mappings().await?;
        debug!("loaded {} name mappings", mappings.len());
        Ok(Self::new(&mappings))
    }

    /// Ladder: exact canonical, alias, substring, word-set overlap (ranked by
    /// Jaro-Winkler within a band). Unresolved input echoes back.
    pub fn resolve(&self, input: &str) -> Resolution {
        let needle = normalise(input);
        if needle.is_empty() {
            return Resolution::Canonical(input.trim().into());
        }

        for entry in &self.entries {
            if entry.normalized == needle {
                return Resolution::Canonical(entry.canonical.clone());
            }
        }

        if let Some(canonical) = self.aliases.get(&needle) {
            return Resolution::Canonical(canonical.clone());
        }

        let substring: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|entry| {
                entry.normalized.contains(&needle) || needle.contains(&entry.normalized)
            })
            .collect();
        match substring.len() {
            1 => return Resolution::Canonical(substring[0].canonical.clone()),
            n if n > 1 => return Resolution::Candidates(ranked(&substring, &needle)),
            _ => {}
        }

        let needle_words = word_set(&needle);
        let mut overlapping: Vec<(&Entry, f64)> = self
            .entries
            .iter()
            .map(|entry| (entry, overlap(&entry.words, &needle_words)))
            .filter(|(_, score)| *score >= MIN_WORD_OVERLAP)
            .collect();
        overlapping.sort_by(|(entry_a, score_a), (entry_b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| entry_a.canonical.cmp(&entry_b.canonical))
        });
        match overlapping.len() {
            0 => Resolution::Canonical(input.trim().into()),
            1 => Resolution::Canonical(overlapping[0].0.canonical.clone()),
            _ => {
                let entries: Vec<&Entry> =
                    overlapping.iter().map(|(entry, _)| *entry).collect();
                Resolution::Candidates(ranked(&entries, &needle))
            }
        }
    }

    /// Single-answer convenience for pipelines that must proceed: the best
    /// candidate when ambiguous, the input itself when unresolved.
    pub fn best(&self, input: &str) -> String {
        match self.resolve(input) {
            Resolution::Canonical(name) => name,
            Resolution::Candidates(mut candidates) => {
                debug!(
                    "ambiguous name {input:?}; taking {:?} over {} alternatives",
                    candidates[0],
                    candidates.len() - 1
                );
                candidates.swap_remove(0)
            }
        }
    }
}

fn ranked(entries: &[&Entry], needle: &str) -> Vec<String> {
    let mut scored: Vec<(f64, &str)> = entries
        .iter()
        .map(|entry| (jaro_winkler(&entry.normalized, needle), entry.canonical.as_str()))
        .collect();
    scored.sort_by(|(score_a, name_a), (score_b, name_b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| name_a.cmp(name_b))
    });
    scored.into_iter().map(|(_, name)| name.into()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(source: &str, canonical: &str, verified: bool) -> NameMapping {
        NameMapping {
            source_name: source.into(),
            canonical_name: canonical.into(),
            normalized_name: normalise(canonical),
            is_verified: verified,
        }
    }

    fn resolver() -> NameResolver {
        NameResolver::new(&[
            mapping("Arsenal FC", "arsenal", true),
            mapping("Tottenham", "tottenham hotspur", true),
            mapping("Man Utd", "manchester united", true),
            mapping("Manchester City FC", "manchester city", true),
            mapping("Borussia Dortmund 1909", "borussia dortmund", true),
            mapping("Newcastle", "newcastle united", true),
            mapping("Leeds", "leeds united", false),
        ])
    }

    #[test]
    fn normalisation_strips_noise() {
        assert_eq!("arsenal", normalise("Arsenal FC"));
        assert_eq!("arsenal", normalise("  ARSENAL "));
        assert_eq!("borussia dortmund", normalise("Borussia Dortmund 1909 FC"));
        assert_eq!("valencia", normalise("El Valencia CF"));
        assert_eq!("tottenham hotspur", normalise("Spurs"));
    }

    #[test]
    fn exact_canonical_match() {
        assert_eq!(
            Resolution::Canonical("arsenal".into()),
            resolver().resolve("arsenal")
        );
    }

    #[test]
    fn suffix_disagreement_still_joins() {
        assert_eq!(
            Resolution::Canonical("arsenal".into()),
            resolver().resolve("Arsenal FC")
        );
        assert_eq!(
            Resolution::Canonical("manchester city".into()),
            resolver().resolve("manchester city fc")
        );
    }

    #[test]
    fn shortform_substitution() {
        assert_eq!(
            Resolution::Canonical("tottenham hotspur".into()),
            resolver().resolve("spurs")
        );
        assert_eq!(
            Resolution::Canonical("manchester united".into()),
            resolver().resolve("Man Utd")
        );
    }

    #[test]
    fn substring_match() {
        assert_eq!(
            Resolution::Canonical("borussia dortmund".into()),
            resolver().resolve("dortmund")
        );
    }

    #[test]
    fn ambiguity_returns_ranked_candidates() {
        match resolver().resolve("united") {
            Resolution::Candidates(candidates) => {
                assert!(candidates.len() >= 2);
                assert!(candidates.contains(&"manchester united".to_string()));
                assert!(candidates.contains(&"newcastle united".to_string()));
            }
            other => panic!("expected candidates, got {other:?}"),
        }
    }

    #[test]
    fn word_overlap_match() {
        assert_eq!(
            Resolution::Canonical("newcastle united".into()),
            resolver().resolve("united newcastle")
        );
    }

    #[test]
    fn unresolved_echoes_back() {
        assert_eq!(
            Resolution::Canonical("Accrington Stanley".into()),
            resolver().resolve("Accrington Stanley")
        );
    }

    #[test]
    fn best_always_answers() {
        let resolver = resolver();
        assert_eq!("arsenal", resolver.best("Arsenal FC"));
        assert!(!resolver.best("united").is_empty());
        assert_eq!("Nowhere Town", resolver.best("Nowhere Town"));
    }
}
