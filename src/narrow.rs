//! Per-column progressive type narrowing.
//!
//! Each column starts with the whole candidate catalogue. For every non-NULL
//! value the head candidate is tried; a rejecting head is dropped for good and
//! the next one is tried, until one accepts or only the fallback is left. Only
//! the head is ever removed, so a column's remaining candidates are always a
//! suffix of the catalogue and the state is just the offset of that suffix.
//!
//! A new head is also dropped, without being tried, when it does not cover
//! every kind that has already accepted a value for the column. Otherwise a
//! column holding dates followed by a time would settle on the time candidate
//! and misrepresent the dates.

use std::collections::HashMap;

use log::trace;

use crate::{
    candidates::{TypeCandidate, TypeCandidateSet},
    column_key::ColumnKey,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldTypeState {
    head: usize,
    accepted: u16,
    observed: usize,
}

impl FieldTypeState {
    pub fn head(&self) -> usize {
        self.head
    }

    pub fn observed(&self) -> usize {
        self.observed
    }

    fn narrow(&mut self, candidates: &[TypeCandidate], value: &str) -> usize {
        self.observed += 1;
        let last = candidates.len().saturating_sub(1);
        let start = self.head;
        while self.head < last {
            let candidate = &candidates[self.head];
            if candidate.covers(self.accepted) && candidate.accepts(value) {
                break;
            }
            self.head += 1;
        }
        if let Some(candidate) = candidates.get(self.head) {
            self.accepted |= candidate.kind().bit();
        }
        self.head - start
    }
}

#[derive(Debug, Clone)]
pub struct FieldTypeNarrower {
    catalogue: TypeCandidateSet,
    states: HashMap<ColumnKey, FieldTypeState>,
}

impl FieldTypeNarrower {
    pub fn new(catalogue: TypeCandidateSet) -> Self {
        Self {
            catalogue,
            states: HashMap::new(),
        }
    }

    pub fn catalogue(&self) -> &TypeCandidateSet {
        &self.catalogue
    }

    /// Narrows `key` against `raw`; `None` is NULL and leaves the column untouched.
    pub fn observe(&mut self, key: &ColumnKey, raw: Option<&str>) {
        let Some(value) = raw else {
            return;
        };
        let candidates = self.catalogue.candidates();
        let state = self.states.entry(key.clone()).or_default();
        let dropped = state.narrow(candidates, value);
        if dropped > 0 {
            trace!(
                "{key}: '{value}' dropped {dropped} candidate(s), now {}",
                candidates[state.head].kind()
            );
        }
    }

    /// Most specific candidate consistent with every value seen so far.
    pub fn resolve(&self, key: &ColumnKey) -> &TypeCandidate {
        &self.catalogue.candidates()[self.head_of(key)]
    }

    pub fn remaining(&self, key: &ColumnKey) -> &[TypeCandidate] {
        &self.catalogue.candidates()[self.head_of(key)..]
    }

    pub fn state(&self, key: &ColumnKey) -> Option<&FieldTypeState> {
        self.states.get(key)
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnKey> {
        self.states.keys()
    }

    fn head_of(&self, key: &ColumnKey) -> usize {
        self.states.get(key).map(FieldTypeState::head).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::CandidateKind;
    use proptest::prelude::*;

    fn narrow_all(values: &[&str]) -> (FieldTypeNarrower, ColumnKey) {
        let key = ColumnKey::new("t", "c");
        let mut narrower = FieldTypeNarrower::new(TypeCandidateSet::standard());
        for value in values {
            narrower.observe(&key, Some(*value));
        }
        (narrower, key)
    }

    #[test]
    fn fractional_value_drops_integer_candidate() {
        let key = ColumnKey::new("t", "c");
        let mut narrower = FieldTypeNarrower::new(TypeCandidateSet::standard());
        narrower.observe(&key, Some("3"));
        assert_eq!(narrower.resolve(&key).kind(), CandidateKind::Integer);
        narrower.observe(&key, Some("4.5"));
        assert_eq!(narrower.resolve(&key).kind(), CandidateKind::Decimal);
        narrower.observe(&key, Some("7"));
        assert_eq!(narrower.resolve(&key).kind(), CandidateKind::Decimal);
        assert_eq!(narrower.resolve(&key).schema_tag(), "xsd:decimal");
    }

    #[test]
    fn date_only_values_resolve_to_short_date() {
        let (narrower, key) = narrow_all(&["2024-01-01", "2024-01-02"]);
        let resolved = narrower.resolve(&key);
        assert_eq!(resolved.kind(), CandidateKind::Date);
        assert_eq!(resolved.format_hint(), Some("Short Date"));
    }

    #[test]
    fn nulls_do_not_create_or_narrow_state() {
        let key = ColumnKey::new("t", "c");
        let mut narrower = FieldTypeNarrower::new(TypeCandidateSet::standard());
        narrower.observe(&key, None);
        assert!(narrower.state(&key).is_none());
        assert_eq!(narrower.resolve(&key).kind(), CandidateKind::Integer);
        narrower.observe(&key, Some("12"));
        narrower.observe(&key, None);
        assert_eq!(narrower.state(&key).map(FieldTypeState::observed), Some(1));
        assert_eq!(narrower.resolve(&key).kind(), CandidateKind::Integer);
    }

    #[test]
    fn dropped_candidates_never_return() {
        let (mut narrower, key) = narrow_all(&["hello"]);
        assert_eq!(narrower.resolve(&key).kind(), CandidateKind::BoundedText);
        narrower.observe(&key, Some("42"));
        assert_eq!(narrower.resolve(&key).kind(), CandidateKind::BoundedText);
    }

    #[test]
    fn head_must_cover_earlier_acceptances() {
        let (narrower, key) = narrow_all(&["2024-01-01", "08:30:00"]);
        assert_eq!(narrower.resolve(&key).kind(), CandidateKind::BoundedText);

        let (narrower, key) = narrow_all(&["4.5", "2024-01-01 10:00:00"]);
        assert_eq!(narrower.resolve(&key).kind(), CandidateKind::BoundedText);
    }

    #[test]
    fn long_text_falls_back_to_memo() {
        let long = "x".repeat(300);
        let (narrower, key) = narrow_all(&["short", &long]);
        assert_eq!(narrower.resolve(&key).kind(), CandidateKind::Text);
        assert_eq!(narrower.remaining(&key).len(), 1);
    }

    #[test]
    fn padded_number_beyond_text_bound_resolves_to_memo() {
        let padded = format!("5{}", " ".repeat(300));
        let (narrower, key) = narrow_all(&[padded.as_str(), "abc"]);
        let resolved = narrower.resolve(&key);
        assert_eq!(resolved.kind(), CandidateKind::Text);
        assert!(resolved.accepts(&padded));
        assert!(resolved.accepts("abc"));
    }

    #[test]
    fn columns_narrow_independently() {
        let ints = ColumnKey::new("t", "ints");
        let words = ColumnKey::new("t", "words");
        let mut narrower = FieldTypeNarrower::new(TypeCandidateSet::standard());
        narrower.observe(&ints, Some("1"));
        narrower.observe(&words, Some("one"));
        narrower.observe(&ints, Some("2"));
        assert_eq!(narrower.resolve(&ints).kind(), CandidateKind::Integer);
        assert_eq!(narrower.resolve(&words).kind(), CandidateKind::BoundedText);
    }

    fn value_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            (-10_000i64..10_000).prop_map(|n| n.to_string()),
            (-1_000i64..1_000, 1u32..99).prop_map(|(i, f)| format!("{i}.{f:02}")),
            (2000i32..2030, 1u32..=12, 1u32..=28)
                .prop_map(|(y, m, d)| format!("{y:04}-{m:02}-{d:02}")),
            (0u32..24, 0u32..60, 0u32..60).prop_map(|(h, m, s)| format!("{h:02}:{m:02}:{s:02}")),
            "[a-z ]{0,12}",
            "[a-z]{250,270}",
            (0usize..4, 250usize..270).prop_map(|(n, pad)| format!("{n}{}", " ".repeat(pad))),
            (250usize..270).prop_map(|pad| format!("{}2021-06-15", " ".repeat(pad))),
        ]
    }

    proptest! {
        #[test]
        fn remaining_candidates_never_grow(values in proptest::collection::vec(value_strategy(), 0..40)) {
            let key = ColumnKey::new("t", "c");
            let mut narrower = FieldTypeNarrower::new(TypeCandidateSet::standard());
            let mut previous = narrower.remaining(&key).len();
            let mut dropped = Vec::new();
            for value in &values {
                narrower.observe(&key, Some(value.as_str()));
                let remaining = narrower.remaining(&key);
                prop_assert!(remaining.len() <= previous);
                previous = remaining.len();
                let kind = narrower.resolve(&key).kind();
                prop_assert!(!dropped.contains(&kind));
                for candidate in narrower.catalogue().candidates() {
                    if !remaining.contains(candidate) && !dropped.contains(&candidate.kind()) {
                        dropped.push(candidate.kind());
                    }
                }
            }
        }

        #[test]
        fn resolved_candidate_accepts_every_observed_value(values in proptest::collection::vec(value_strategy(), 1..40)) {
            let key = ColumnKey::new("t", "c");
            let mut narrower = FieldTypeNarrower::new(TypeCandidateSet::standard());
            for value in &values {
                narrower.observe(&key, Some(value.as_str()));
            }
            let resolved = narrower.resolve(&key);
            for value in &values {
                prop_assert!(resolved.accepts(value), "{:?} rejected '{}'", resolved.kind(), value);
            }
        }

        #[test]
        fn replaying_values_is_deterministic(
            values in proptest::collection::vec(value_strategy(), 0..30),
            noise in proptest::collection::vec(value_strategy(), 0..30),
        ) {
            let key = ColumnKey::new("t", "c");
            let other = ColumnKey::new("t", "other");
            let mut quiet = FieldTypeNarrower::new(TypeCandidateSet::standard());
            let mut noisy = FieldTypeNarrower::new(TypeCandidateSet::standard());
            for (idx, value) in values.iter().enumerate() {
                quiet.observe(&key, Some(value.as_str()));
                if let Some(extra) = noise.get(idx) {
                    noisy.observe(&other, Some(extra.as_str()));
                }
                noisy.observe(&key, Some(value.as_str()));
            }
            prop_assert_eq!(quiet.resolve(&key).kind(), noisy.resolve(&key).kind());
        }
    }
}
