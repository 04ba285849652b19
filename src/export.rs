//! The single streaming export pass.
//!
//! Every selected table is read once. Each value goes to the row writer, the
//! type narrower and (when relationships are requested) the value-set
//! collector. Relationship inference and schema projection run after the
//! last table.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    candidates::TypeCandidateSet,
    cli::{ExportArgs, RelateOptionArgs},
    column_key::{ColumnKey, ColumnSelector},
    io_utils,
    narrow::FieldTypeNarrower,
    projection::{
        FieldOrder, ProjectedTable, RELATIONSHIP_FIELDS, RELATIONSHIP_TABLE, ResolvedSchema,
        SchemaProjector,
    },
    relations::{RelationshipInferrer, RelationshipOptions},
    source::{CsvSource, RowSource, TableLayout},
    values::ValueSetCollector,
    xml::{RowWriter, SchemaWriter, XmlRowWriter, XsdWriter, element_name},
};

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Tables to export, in this order; empty means every table.
    pub tables: Vec<String>,
    pub exclude_tables: Vec<String>,
    /// Declared source types whose columns are dropped, compared case-insensitively.
    pub exclude_types: Vec<String>,
    pub limit: Option<usize>,
    pub relationships: bool,
    pub relationship_options: RelationshipOptions,
    pub skip_relate_fields: Vec<ColumnSelector>,
    pub field_order: FieldOrder,
}

impl ExportOptions {
    pub fn from_args(args: &ExportArgs) -> Result<Self> {
        Ok(Self {
            tables: args.tables.clone(),
            exclude_tables: args.exclude_tables.clone(),
            exclude_types: args.exclude_types.clone(),
            limit: args.limit,
            relationships: args.relationships,
            relationship_options: relationship_options(&args.relate),
            skip_relate_fields: parse_selectors(&args.relate.skip_fields)?,
            field_order: args.field_order,
        })
    }
}

pub(crate) fn relationship_options(args: &RelateOptionArgs) -> RelationshipOptions {
    RelationshipOptions {
        include_empty: args.include_empty_sets,
        require_unique_target: args.require_unique_target,
    }
}

pub(crate) fn parse_selectors(values: &[String]) -> Result<Vec<ColumnSelector>> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse::<ColumnSelector>()
                .with_context(|| format!("Parsing column selector '{value}'"))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub name: String,
    pub fields: usize,
    /// Fields dropped because of their declared type.
    pub excluded_fields: Vec<String>,
    pub rows: usize,
    /// False when a read error ended the table early.
    pub complete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub tables: Vec<TableReport>,
    pub schema: ResolvedSchema,
}

impl ExportReport {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|table| table.rows).sum()
    }
}

/// Applies the include list (keeping its order) and then the exclude list.
pub fn select_tables(
    available: Vec<String>,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<String>> {
    let selected = if include.is_empty() {
        available
    } else {
        let known = available.iter().collect::<HashSet<_>>();
        for name in include {
            if !known.contains(name) {
                bail!("Table '{name}' was requested but no input provides it");
            }
        }
        include.to_vec()
    };
    Ok(selected
        .into_iter()
        .filter(|name| !exclude.contains(name))
        .collect())
}

/// Positions of the fields that survive type exclusion, paired with their names.
fn kept_fields(layout: &TableLayout, exclude_types: &[String]) -> (Vec<(usize, String)>, Vec<String>) {
    let mut kept = Vec::with_capacity(layout.fields.len());
    let mut excluded = Vec::new();
    for (idx, field) in layout.fields.iter().enumerate() {
        let dropped = field.declared_type.as_deref().is_some_and(|declared| {
            exclude_types
                .iter()
                .any(|datatype| datatype.eq_ignore_ascii_case(declared.trim()))
        });
        if dropped {
            excluded.push(field.name.clone());
        } else {
            kept.push((idx, field.name.clone()));
        }
    }
    (kept, excluded)
}

/// Fails when two names would be written as the same XML element.
fn ensure_distinct_elements<'a>(
    what: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut seen = HashMap::new();
    for name in names {
        let element = element_name(name);
        if let Some(previous) = seen.insert(element.to_string(), name) {
            bail!("{what} '{previous}' and '{name}' both map to XML element '{element}'");
        }
    }
    Ok(())
}

pub fn export_tables<S, W>(
    source: &mut S,
    writer: &mut W,
    catalogue: &TypeCandidateSet,
    options: &ExportOptions,
) -> Result<ExportReport>
where
    S: RowSource + ?Sized,
    W: RowWriter + ?Sized,
{
    let tables = select_tables(source.table_names(), &options.tables, &options.exclude_tables)?;
    if options.relationships && tables.iter().any(|name| name == RELATIONSHIP_TABLE) {
        bail!("Table '{RELATIONSHIP_TABLE}' clashes with the inferred relationship table");
    }
    ensure_distinct_elements(
        "Tables",
        tables
            .iter()
            .map(String::as_str)
            .chain(options.relationships.then_some(RELATIONSHIP_TABLE)),
    )?;

    let mut narrower = FieldTypeNarrower::new(catalogue.clone());
    let mut collector = options
        .relationships
        .then(|| ValueSetCollector::with_exclusions(options.skip_relate_fields.clone()));
    let mut projected = Vec::with_capacity(tables.len());
    let mut reports = Vec::with_capacity(tables.len());
    let limit = options.limit.unwrap_or(usize::MAX);

    for name in tables {
        let layout = source
            .layout(&name)
            .with_context(|| format!("Reading layout of table '{name}'"))?;
        let (kept, excluded_fields) = kept_fields(&layout, &options.exclude_types);
        ensure_distinct_elements(
            &format!("Table '{name}': fields"),
            kept.iter().map(|(_, field)| field.as_str()),
        )?;
        if !excluded_fields.is_empty() {
            info!(
                "Table '{name}': excluding {} field(s) by declared type: {}",
                excluded_fields.len(),
                excluded_fields.join(", ")
            );
        }
        let keys = kept
            .iter()
            .map(|(_, field)| ColumnKey::new(&name, field))
            .collect::<Vec<_>>();
        if let Some(collector) = collector.as_mut() {
            keys.iter().for_each(|key| collector.register(key));
        }

        let mut rows_written = 0usize;
        let mut complete = true;
        let rows = source
            .rows(&name)
            .with_context(|| format!("Opening rows of table '{name}'"))?;
        for row in rows.take(limit) {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    warn!("Table '{name}' ended early after {rows_written} row(s): {err:#}");
                    complete = false;
                    break;
                }
            };
            let mut values = Vec::with_capacity(kept.len());
            for ((idx, field), key) in kept.iter().zip(&keys) {
                let value = row.get(*idx).and_then(|cell| cell.as_deref());
                narrower.observe(key, value);
                if let Some(collector) = collector.as_mut() {
                    collector.observe(key, value);
                }
                if let Some(value) = value {
                    values.push((field.as_str(), value));
                }
            }
            writer.write_row(&name, &values)?;
            rows_written += 1;
        }
        debug!("Table '{name}': {rows_written} row(s) streamed");

        projected.push(ProjectedTable {
            name: name.clone(),
            fields: kept.into_iter().map(|(_, field)| field).collect(),
        });
        reports.push(TableReport {
            name,
            fields: keys.len(),
            excluded_fields,
            rows: rows_written,
            complete,
        });
    }

    let relationships = collector.map(|collector| {
        info!(
            "Collected {} distinct value(s) for relationship inference",
            collector.distinct_total()
        );
        RelationshipInferrer::new(options.relationship_options).infer(&collector)
    });
    let schema = SchemaProjector::new(options.field_order).project(
        &projected,
        &narrower,
        relationships.as_deref(),
    );

    for hypothesis in &schema.relationships {
        let row = hypothesis.as_row();
        let values = RELATIONSHIP_FIELDS
            .iter()
            .zip(&row)
            .map(|(field, value)| (*field, value.as_str()))
            .collect::<Vec<_>>();
        writer.write_row(RELATIONSHIP_TABLE, &values)?;
    }

    Ok(ExportReport {
        tables: reports,
        schema,
    })
}

pub fn execute(args: &ExportArgs) -> Result<()> {
    let options = ExportOptions::from_args(args)?;
    let encoding = io_utils::resolve_encoding(args.source.input_encoding.as_deref())?;
    let mut source = CsvSource::open(&args.source.inputs, args.source.delimiter, encoding)?;

    let xml_path = io_utils::with_suffix(&args.output, ".xml");
    let xsd_path = io_utils::with_suffix(&args.output, ".xsd");
    let schema_location = xsd_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| xsd_path.display().to_string());

    let delimiter = args
        .source
        .delimiter
        .map(crate::printable_delimiter)
        .unwrap_or_else(|| "auto".to_string());
    info!("Exporting to {xml_path:?} with schema {xsd_path:?} (input delimiter '{delimiter}')");
    let mut rows = XmlRowWriter::new(io_utils::create_output(&xml_path)?, &schema_location)
        .with_context(|| format!("Starting XML output {xml_path:?}"))?;
    let report = export_tables(
        &mut source,
        &mut rows,
        &TypeCandidateSet::standard(),
        &options,
    )?;
    let elements = rows.rows_written();
    rows.finish()
        .with_context(|| format!("Finishing XML output {xml_path:?}"))?;

    let mut schema = XsdWriter::new(io_utils::create_output(&xsd_path)?);
    schema
        .write_schema(&report.schema)
        .with_context(|| format!("Writing schema to {xsd_path:?}"))?;

    for table in &report.tables {
        if !table.complete {
            warn!("Table '{}' was only partially exported", table.name);
        }
    }
    info!(
        "Exported {} row(s) from {} table(s); {} relationship(s) inferred ({elements} element(s) written)",
        report.total_rows(),
        report.tables.len(),
        report.schema.relationships.len()
    );
    Ok(())
}
