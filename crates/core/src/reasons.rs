//! Reason filtering for "given by" queries.

use std::collections::BTreeSet;

const ALL_PEDOS: &str = "__all_pedos__";
const ALL_BIGOTS: &str = "__all_bigots__";

const PEDO_TERMS: [&str; 4] = ["csam", "loli", "shota", "pedophil"];
const BIGOT_TERMS: [&str; 9] = [
    "racism",
    "sexism",
    "transphobia",
    "homophobia",
    "islamophobia",
    "nazi",
    "fascist",
    "hate speech",
    "bigotry",
];

/// Case-insensitive substring filter with macro expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasonFilter {
    terms: BTreeSet<String>,
}

impl ReasonFilter {
    /// Parse a comma-separated list. Blank input yields `None`.
    #[must_use]
    pub fn parse(csv: Option<&str>) -> Option<Self> {
        let mut terms: BTreeSet<String> = csv?
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            return None;
        }
        if terms.contains(ALL_PEDOS) {
            terms.extend(PEDO_TERMS.iter().map(|t| (*t).to_string()));
        }
        if terms.contains(ALL_BIGOTS) {
            terms.extend(BIGOT_TERMS.iter().map(|t| (*t).to_string()));
        }
        Some(Self { terms })
    }

    /// Whether some term appears in at least `min` of `reasons`.
    #[must_use]
    pub fn matches<'a>(&self, reasons: impl Iterator<Item = &'a str> + Clone, min: usize) -> bool {
        self.terms.iter().any(|term| {
            reasons
                .clone()
                .filter(|reason| reason.to_lowercase().contains(term.as_str()))
                .count()
                >= min
        })
    }
}

/// Whether a target judged by `edge_count` sources with `reasons` passes.
#[must_use]
pub fn passes_threshold(
    filter: Option<&ReasonFilter>,
    reasons: &[&str],
    edge_count: usize,
    min: usize,
) -> bool {
    match filter {
        Some(filter) => filter.matches(reasons.iter().copied(), min),
        None => edge_count >= min,
    }
}
