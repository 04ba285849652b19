//! Foreign-key hypotheses from value-set containment.
//!
//! A column whose distinct values are all found in a column of another table
//! is reported as referencing it. Uniqueness of the referenced column is not
//! required unless asked for, so a small value set (a flag, a status code)
//! will "reference" any unrelated column that happens to contain the same
//! values. That is a known limitation of pure containment.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    column_key::ColumnKey,
    values::{ValueSet, ValueSetCollector},
};

/// `from_table.from_field` references `to_table.to_field`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipHypothesis {
    pub from_table: String,
    pub from_field: String,
    pub to_table: String,
    pub to_field: String,
}

impl RelationshipHypothesis {
    pub fn from_key(&self) -> ColumnKey {
        ColumnKey::new(&self.from_table, &self.from_field)
    }

    pub fn to_key(&self) -> ColumnKey {
        ColumnKey::new(&self.to_table, &self.to_field)
    }

    pub fn as_row(&self) -> Vec<String> {
        vec![
            self.from_table.clone(),
            self.from_field.clone(),
            self.to_table.clone(),
            self.to_field.clone(),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationshipOptions {
    /// Report columns with no values; an empty set is a subset of anything.
    pub include_empty: bool,
    /// Only accept a referenced column whose values never repeat.
    pub require_unique_target: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RelationshipInferrer {
    options: RelationshipOptions,
}

impl RelationshipInferrer {
    pub fn new(options: RelationshipOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> RelationshipOptions {
        self.options
    }

    pub fn infer(&self, collector: &ValueSetCollector) -> Vec<RelationshipHypothesis> {
        let mut tables: BTreeMap<&str, Vec<(&str, &ValueSet)>> = BTreeMap::new();
        for (key, set) in collector.columns() {
            tables
                .entry(key.table.as_str())
                .or_default()
                .push((key.field.as_str(), set));
        }

        let mut hypotheses = Vec::new();
        for (target_table, target_fields) in &tables {
            for (source_table, source_fields) in &tables {
                if source_table == target_table {
                    continue;
                }
                for (target_field, target) in target_fields {
                    if self.options.require_unique_target && !target.is_unique() {
                        continue;
                    }
                    for (source_field, source) in source_fields {
                        if self.references(source, target) {
                            debug!(
                                "{source_table}.{source_field} ({} value(s)) contained in {target_table}.{target_field} ({} value(s))",
                                source.len(),
                                target.len()
                            );
                            hypotheses.push(RelationshipHypothesis {
                                from_table: source_table.to_string(),
                                from_field: source_field.to_string(),
                                to_table: target_table.to_string(),
                                to_field: target_field.to_string(),
                            });
                        }
                    }
                }
            }
        }
        hypotheses.sort();
        info!(
            "Inferred {} relationship hypothesis(es) across {} table(s)",
            hypotheses.len(),
            tables.len()
        );
        hypotheses
    }

    fn references(&self, source: &ValueSet, target: &ValueSet) -> bool {
        if source.is_empty() {
            return self.options.include_empty;
        }
        source.len() <= target.len() && source.is_subset(target)
    }
}
