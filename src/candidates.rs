//! The ordered catalogue of value types a column can be narrowed to.
//!
//! Candidates are ordered from most to least restrictive. The last entry must
//! be the unbounded text fallback, which accepts every value and therefore
//! guarantees that narrowing always ends on some candidate.

use std::{fmt, str::FromStr, sync::Arc};

use anyhow::anyhow;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::temporal::TemporalReading;

pub const TEXT_MAX_LENGTH: usize = 255;
pub const MEMO_MAX_LENGTH: usize = 536_870_910;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum CandidateKind {
    Integer,
    Decimal,
    #[value(name = "datetime")]
    #[serde(rename = "datetime")]
    DateTime,
    Date,
    Time,
    #[value(name = "text")]
    #[serde(rename = "text")]
    BoundedText,
    #[value(name = "memo")]
    #[serde(rename = "memo")]
    Text,
}

impl CandidateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateKind::Integer => "integer",
            CandidateKind::Decimal => "decimal",
            CandidateKind::DateTime => "datetime",
            CandidateKind::Date => "date",
            CandidateKind::Time => "time",
            CandidateKind::BoundedText => "text",
            CandidateKind::Text => "memo",
        }
    }

    pub fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "integer" | "int" => Ok(CandidateKind::Integer),
            "decimal" | "float" => Ok(CandidateKind::Decimal),
            "datetime" | "date-time" | "timestamp" => Ok(CandidateKind::DateTime),
            "date" => Ok(CandidateKind::Date),
            "time" => Ok(CandidateKind::Time),
            "text" | "string" => Ok(CandidateKind::BoundedText),
            "memo" => Ok(CandidateKind::Text),
            _ => Err(anyhow!(
                "Unknown type '{value}'. Supported types: integer, decimal, datetime, date, time, text, memo"
            )),
        }
    }
}

/// The value a candidate produced when it accepted its input.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    Integer(i64),
    Decimal(Decimal),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Text { length: usize },
}

pub type ParseFn = fn(&str) -> Option<ParsedValue>;

#[derive(Clone)]
pub struct TypeCandidate {
    kind: CandidateKind,
    schema_tag: &'static str,
    format_hint: Option<&'static str>,
    max_length: Option<usize>,
    subsumes: u16,
    parser: ParseFn,
}

impl TypeCandidate {
    pub fn new(
        kind: CandidateKind,
        schema_tag: &'static str,
        format_hint: Option<&'static str>,
        max_length: Option<usize>,
        parser: ParseFn,
    ) -> Self {
        Self {
            kind,
            schema_tag,
            format_hint,
            max_length,
            subsumes: kind.bit(),
            parser,
        }
    }

    /// Declares that every value accepted by `kinds` is also accepted here.
    pub fn subsuming(mut self, kinds: &[CandidateKind]) -> Self {
        for kind in kinds {
            self.subsumes |= kind.bit();
        }
        self
    }

    /// True when this candidate accepts everything the kinds in `mask` accepted.
    pub fn covers(&self, mask: u16) -> bool {
        mask & !self.subsumes == 0
    }

    pub fn kind(&self) -> CandidateKind {
        self.kind
    }

    pub fn schema_tag(&self) -> &'static str {
        self.schema_tag
    }

    pub fn format_hint(&self) -> Option<&'static str> {
        self.format_hint
    }

    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    pub fn parse(&self, value: &str) -> Option<ParsedValue> {
        (self.parser)(value)
    }

    pub fn accepts(&self, value: &str) -> bool {
        self.parse(value).is_some()
    }
}

impl PartialEq for TypeCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for TypeCandidate {}

impl fmt::Debug for TypeCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCandidate")
            .field("kind", &self.kind)
            .field("schema_tag", &self.schema_tag)
            .field("format_hint", &self.format_hint)
            .field("max_length", &self.max_length)
            .field("subsumes", &self.subsumes)
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogueError {
    #[error("candidate catalogue is empty")]
    Empty,
    #[error("last candidate must be the unbounded text fallback, found '{0}'")]
    FallbackNotLast(CandidateKind),
    #[error("fallback candidate '{0}' rejected a probe value")]
    FallbackNotTotal(CandidateKind),
}

/// Immutable, ordered candidate list shared by every narrower built from it.
#[derive(Debug, Clone)]
pub struct TypeCandidateSet {
    candidates: Arc<[TypeCandidate]>,
}

impl TypeCandidateSet {
    pub fn new(candidates: Vec<TypeCandidate>) -> Result<Self, CatalogueError> {
        let fallback = candidates.last().ok_or(CatalogueError::Empty)?;
        if fallback.kind != CandidateKind::Text {
            return Err(CatalogueError::FallbackNotLast(fallback.kind));
        }
        let long_probe = "x".repeat(TEXT_MAX_LENGTH * 4);
        for probe in ["", " ", "NULL", "\u{fffd}", long_probe.as_str()] {
            if !fallback.accepts(probe) {
                return Err(CatalogueError::FallbackNotTotal(fallback.kind));
            }
        }
        Ok(Self {
            candidates: candidates.into(),
        })
    }

    /// Numeric, then temporal, then bounded text, then memo.
    pub fn standard() -> Self {
        Self {
            candidates: standard_candidates().into(),
        }
    }

    pub fn candidates(&self) -> &[TypeCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn fallback(&self) -> &TypeCandidate {
        &self.candidates[self.candidates.len() - 1]
    }

    pub fn get(&self, kind: CandidateKind) -> Option<&TypeCandidate> {
        self.candidates.iter().find(|candidate| candidate.kind == kind)
    }
}

impl Default for TypeCandidateSet {
    fn default() -> Self {
        Self::standard()
    }
}

pub fn standard_candidates() -> Vec<TypeCandidate> {
    vec![
        TypeCandidate::new(
            CandidateKind::Integer,
            "xsd:integer",
            None,
            None,
            parse_integer,
        ),
        TypeCandidate::new(
            CandidateKind::Decimal,
            "xsd:decimal",
            None,
            None,
            parse_decimal,
        )
        .subsuming(&[CandidateKind::Integer]),
        TypeCandidate::new(
            CandidateKind::DateTime,
            "xsd:dateTime",
            Some("General Date"),
            None,
            parse_datetime,
        ),
        TypeCandidate::new(
            CandidateKind::Date,
            "xsd:dateTime",
            Some("Short Date"),
            None,
            parse_date,
        ),
        TypeCandidate::new(
            CandidateKind::Time,
            "xsd:dateTime",
            Some("Long Time"),
            None,
            parse_time,
        ),
        TypeCandidate::new(
            CandidateKind::BoundedText,
            "xsd:string",
            None,
            Some(TEXT_MAX_LENGTH),
            parse_bounded_text,
        )
        .subsuming(&[
            CandidateKind::Integer,
            CandidateKind::Decimal,
            CandidateKind::DateTime,
            CandidateKind::Date,
            CandidateKind::Time,
        ]),
        TypeCandidate::new(
            CandidateKind::Text,
            "xsd:string",
            None,
            Some(MEMO_MAX_LENGTH),
            parse_text,
        )
        .subsuming(&[
            CandidateKind::Integer,
            CandidateKind::Decimal,
            CandidateKind::DateTime,
            CandidateKind::Date,
            CandidateKind::Time,
            CandidateKind::BoundedText,
        ]),
    ]
}

/// Values the bounded text candidate would reject are rejected by every
/// narrower candidate too, even when trimming would make them parse.
fn fits_bounded_text(value: &str) -> bool {
    value.len() <= TEXT_MAX_LENGTH || value.chars().count() <= TEXT_MAX_LENGTH
}

pub fn parse_integer(value: &str) -> Option<ParsedValue> {
    if !fits_bounded_text(value) {
        return None;
    }
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
    // "007" would lose its zeros once stored as a number.
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    trimmed.parse::<i64>().ok().map(ParsedValue::Integer)
}

pub fn parse_decimal(value: &str) -> Option<ParsedValue> {
    let trimmed = value.trim();
    if !fits_bounded_text(value) || trimmed.is_empty() || trimmed.contains(['_', 'e', 'E']) {
        return None;
    }
    Decimal::from_str(trimmed).ok().map(ParsedValue::Decimal)
}

pub fn parse_datetime(value: &str) -> Option<ParsedValue> {
    if !fits_bounded_text(value) {
        return None;
    }
    let reading = TemporalReading::read(value)?;
    (reading.date_specified() && reading.time_specified())
        .then(|| ParsedValue::DateTime(reading.value()))
}

pub fn parse_date(value: &str) -> Option<ParsedValue> {
    if !fits_bounded_text(value) {
        return None;
    }
    let reading = TemporalReading::read(value)?;
    (reading.date_specified() && !reading.time_specified())
        .then(|| ParsedValue::Date(reading.value().date()))
}

pub fn parse_time(value: &str) -> Option<ParsedValue> {
    if !fits_bounded_text(value) {
        return None;
    }
    let reading = TemporalReading::read(value)?;
    (reading.time_specified() && !reading.date_specified())
        .then(|| ParsedValue::Time(reading.value().time()))
}

pub fn parse_bounded_text(value: &str) -> Option<ParsedValue> {
    let length = value.chars().count();
    (length <= TEXT_MAX_LENGTH).then_some(ParsedValue::Text { length })
}

pub fn parse_text(value: &str) -> Option<ParsedValue> {
    Some(ParsedValue::Text {
        length: value.chars().count(),
    })
}
