//! Final schema assembled from narrowed column types and relationships.

use std::collections::HashSet;

use clap::ValueEnum;
use serde::Serialize;

use crate::{
    candidates::{CandidateKind, TypeCandidateSet},
    column_key::ColumnKey,
    narrow::FieldTypeNarrower,
    relations::RelationshipHypothesis,
};

pub const RELATIONSHIP_TABLE: &str = "inferred_relationships";
pub const RELATIONSHIP_FIELDS: [&str; 4] = ["fromTable", "fromField", "toTable", "toField"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[value(rename_all = "kebab-case")]
pub enum FieldOrder {
    /// Order reported by the data source
    #[default]
    Declared,
    /// Case-insensitive alphabetical order
    Alphabetical,
    /// Alphabetical, with the field named like its table first
    KeyFirst,
}

impl FieldOrder {
    pub fn apply(&self, table: &str, fields: &mut [String]) {
        match self {
            FieldOrder::Declared => {}
            FieldOrder::Alphabetical => fields.sort_by_cached_key(|name| name.to_lowercase()),
            FieldOrder::KeyFirst => fields.sort_by_cached_key(|name| {
                (!name.eq_ignore_ascii_case(table), name.to_lowercase())
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedField {
    pub name: String,
    pub kind: CandidateKind,
    pub schema_tag: &'static str,
    pub format_hint: Option<&'static str>,
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTable {
    pub name: String,
    pub fields: Vec<ResolvedField>,
}

impl ResolvedTable {
    pub fn field(&self, name: &str) -> Option<&ResolvedField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedSchema {
    pub tables: Vec<ResolvedTable>,
    pub relationships: Vec<RelationshipHypothesis>,
}

impl ResolvedSchema {
    pub fn table(&self, name: &str) -> Option<&ResolvedTable> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn field(&self, table: &str, field: &str) -> Option<&ResolvedField> {
        self.table(table).and_then(|table| table.field(field))
    }
}

/// A table's name with the fields that survived exclusion, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedTable {
    pub name: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaProjector {
    order: FieldOrder,
}

impl SchemaProjector {
    pub fn new(order: FieldOrder) -> Self {
        Self { order }
    }

    /// Resolves every column of `tables`. With `relationships` present, the
    /// hypotheses whose endpoints are both resolved columns are kept and the
    /// relationship table is appended.
    pub fn project(
        &self,
        tables: &[ProjectedTable],
        narrower: &FieldTypeNarrower,
        relationships: Option<&[RelationshipHypothesis]>,
    ) -> ResolvedSchema {
        let mut resolved_tables = Vec::with_capacity(tables.len() + 1);
        let mut known = HashSet::new();
        for table in tables {
            let mut names = table.fields.clone();
            self.order.apply(&table.name, &mut names);
            let fields = names
                .into_iter()
                .map(|name| {
                    let key = ColumnKey::new(&table.name, &name);
                    let candidate = narrower.resolve(&key);
                    known.insert(key);
                    ResolvedField {
                        name,
                        kind: candidate.kind(),
                        schema_tag: candidate.schema_tag(),
                        format_hint: candidate.format_hint(),
                        max_length: candidate.max_length(),
                    }
                })
                .collect();
            resolved_tables.push(ResolvedTable {
                name: table.name.clone(),
                fields,
            });
        }

        let Some(relationships) = relationships else {
            return ResolvedSchema {
                tables: resolved_tables,
                relationships: Vec::new(),
            };
        };

        let accepted = relationships
            .iter()
            .filter(|hypothesis| {
                known.contains(&hypothesis.from_key()) && known.contains(&hypothesis.to_key())
            })
            .cloned()
            .collect();
        resolved_tables.push(relationship_table(narrower.catalogue()));
        ResolvedSchema {
            tables: resolved_tables,
            relationships: accepted,
        }
    }
}

fn relationship_table(catalogue: &TypeCandidateSet) -> ResolvedTable {
    let text = catalogue
        .get(CandidateKind::BoundedText)
        .unwrap_or_else(|| catalogue.fallback());
    ResolvedTable {
        name: RELATIONSHIP_TABLE.to_string(),
        fields: RELATIONSHIP_FIELDS
            .iter()
            .map(|name| ResolvedField {
                name: name.to_string(),
                kind: text.kind(),
                schema_tag: text.schema_tag(),
                format_hint: text.format_hint(),
                max_length: text.max_length(),
            })
            .collect(),
    }
}
