//! Standalone relationship inference over CSV tables, without exporting.

use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    cli::{OutputFormat, RelateArgs},
    column_key::ColumnKey,
    export::{parse_selectors, relationship_options},
    io_utils,
    relations::{RelationshipHypothesis, RelationshipInferrer},
    source::{CsvSource, RowSource},
    table,
    values::ValueSetCollector,
};

/// Fills `collector` with the values of every column of every table.
pub fn collect_values<S>(
    source: &mut S,
    collector: &mut ValueSetCollector,
    limit: Option<usize>,
) -> Result<()>
where
    S: RowSource + ?Sized,
{
    for name in source.table_names() {
        let layout = source
            .layout(&name)
            .with_context(|| format!("Reading layout of table '{name}'"))?;
        let keys = layout
            .fields
            .iter()
            .map(|field| ColumnKey::new(&name, &field.name))
            .collect::<Vec<_>>();
        keys.iter().for_each(|key| collector.register(key));

        let rows = source
            .rows(&name)
            .with_context(|| format!("Opening rows of table '{name}'"))?;
        for (idx, row) in rows.take(limit.unwrap_or(usize::MAX)).enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    warn!("Table '{name}' ended early after {idx} row(s): {err:#}");
                    break;
                }
            };
            for (key, value) in keys.iter().zip(&row) {
                collector.observe(key, value.as_deref());
            }
        }
    }
    Ok(())
}

pub fn execute(args: &RelateArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.source.input_encoding.as_deref())?;
    let mut source = CsvSource::open(&args.source.inputs, args.source.delimiter, encoding)?;
    let mut collector = ValueSetCollector::with_exclusions(parse_selectors(&args.relate.skip_fields)?);
    collect_values(&mut source, &mut collector, args.limit)?;
    info!(
        "Collected {} distinct value(s) across {} column(s)",
        collector.distinct_total(),
        collector.columns().count()
    );

    let hypotheses =
        RelationshipInferrer::new(relationship_options(&args.relate)).infer(&collector);
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hypotheses)?),
        OutputFormat::Table => print_hypotheses(&hypotheses),
    }
    Ok(())
}

fn print_hypotheses(hypotheses: &[RelationshipHypothesis]) {
    if hypotheses.is_empty() {
        info!("No relationships inferred");
        return;
    }
    let headers = ["from table", "from field", "to table", "to field"]
        .iter()
        .map(|header| header.to_string())
        .collect::<Vec<_>>();
    let rows = hypotheses
        .iter()
        .map(RelationshipHypothesis::as_row)
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
}
