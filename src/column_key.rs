use std::{fmt, str::FromStr};

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// Identity of one column across all tables of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnKey {
    pub table: String,
    pub field: String,
}

impl ColumnKey {
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.field)
    }
}

/// `table.field`, or a bare `field` matching that name in every table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSelector {
    table: Option<String>,
    field: String,
}

impl ColumnSelector {
    pub fn matches(&self, key: &ColumnKey) -> bool {
        self.field == key.field
            && self
                .table
                .as_deref()
                .is_none_or(|table| table == key.table)
    }
}

impl FromStr for ColumnSelector {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let selector = match trimmed.split_once('.') {
            Some((table, field)) => Self {
                table: Some(table.trim().to_string()),
                field: field.trim().to_string(),
            },
            None => Self {
                table: None,
                field: trimmed.to_string(),
            },
        };
        ensure!(
            !selector.field.is_empty() && selector.table.as_deref() != Some(""),
            "Column selector '{value}' must look like 'table.field' or 'field'"
        );
        Ok(selector)
    }
}
