//! Distinct value collection for relationship inference.
//!
//! Memory grows with the number of distinct values per column. Collection is
//! therefore opt-in for a run, and individual columns can be excluded.

use std::collections::{BTreeMap, HashSet};

use crate::column_key::{ColumnKey, ColumnSelector};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueSet {
    values: HashSet<String>,
    repeated: bool,
}

impl ValueSet {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// No non-NULL value has been observed twice.
    pub fn is_unique(&self) -> bool {
        !self.repeated
    }

    pub fn is_subset(&self, other: &ValueSet) -> bool {
        self.values.is_subset(&other.values)
    }

    fn insert(&mut self, value: &str) {
        if self.values.contains(value) {
            self.repeated = true;
        } else {
            self.values.insert(value.to_string());
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValueSetCollector {
    sets: BTreeMap<ColumnKey, ValueSet>,
    exclusions: Vec<ColumnSelector>,
    empty: ValueSet,
}

impl ValueSetCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exclusions(exclusions: Vec<ColumnSelector>) -> Self {
        Self {
            exclusions,
            ..Self::default()
        }
    }

    pub fn is_excluded(&self, key: &ColumnKey) -> bool {
        self.exclusions.iter().any(|selector| selector.matches(key))
    }

    /// Makes `key` known even if it never receives a value.
    pub fn register(&mut self, key: &ColumnKey) {
        if !self.is_excluded(key) && !self.sets.contains_key(key) {
            self.sets.insert(key.clone(), ValueSet::default());
        }
    }

    pub fn observe(&mut self, key: &ColumnKey, raw: Option<&str>) {
        let Some(value) = raw else {
            return;
        };
        if let Some(set) = self.sets.get_mut(key) {
            set.insert(value);
            return;
        }
        if self.is_excluded(key) {
            return;
        }
        let mut set = ValueSet::default();
        set.insert(value);
        self.sets.insert(key.clone(), set);
    }

    /// The values seen for `key`; unknown and excluded columns yield an empty set.
    pub fn values_of(&self, key: &ColumnKey) -> &ValueSet {
        self.sets.get(key).unwrap_or(&self.empty)
    }

    pub fn contains_column(&self, key: &ColumnKey) -> bool {
        self.sets.contains_key(key)
    }

    /// Columns in table, then field order.
    pub fn columns(&self) -> impl Iterator<Item = (&ColumnKey, &ValueSet)> {
        self.sets.iter()
    }

    pub fn distinct_total(&self) -> usize {
        self.sets.values().map(ValueSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_are_not_collected() {
        let key = ColumnKey::new("t", "c");
        let mut collector = ValueSetCollector::new();
        collector.observe(&key, None);
        assert!(!collector.contains_column(&key));
        collector.register(&key);
        assert!(collector.values_of(&key).is_empty());
        collector.observe(&key, Some("a"));
        collector.observe(&key, None);
        assert_eq!(collector.values_of(&key).len(), 1);
    }

    #[test]
    fn repeated_values_mark_set_as_not_unique() {
        let key = ColumnKey::new("t", "c");
        let mut collector = ValueSetCollector::new();
        collector.observe(&key, Some("a"));
        collector.observe(&key, Some("b"));
        assert!(collector.values_of(&key).is_unique());
        collector.observe(&key, Some("a"));
        assert!(!collector.values_of(&key).is_unique());
        assert_eq!(collector.values_of(&key).len(), 2);
    }

    #[test]
    fn excluded_columns_are_never_collected() {
        let status = ColumnKey::new("orders", "status");
        let id = ColumnKey::new("orders", "id");
        let mut collector = ValueSetCollector::with_exclusions(vec!["status".parse().unwrap()]);
        collector.register(&status);
        collector.observe(&status, Some("open"));
        collector.observe(&id, Some("1"));
        assert!(!collector.contains_column(&status));
        assert!(collector.values_of(&status).is_empty());
        assert_eq!(collector.distinct_total(), 1);
    }
}
