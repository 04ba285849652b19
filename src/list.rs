//! Table and field listing for an input set.
//!
//! Renders the tables a set of inputs provides as an ASCII table, optionally
//! expanded to one line per field with its declared type.

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;

use crate::{
    cli::ListArgs,
    io_utils,
    source::{CsvSource, RowSource},
    table,
};

pub fn execute(args: &ListArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.source.input_encoding.as_deref())?;
    let source = CsvSource::open(&args.source.inputs, args.source.delimiter, encoding)?;
    let names = source.table_names();
    if names.is_empty() {
        info!("No tables found in the given input(s)");
        return Ok(());
    }

    let (headers, rows) = if args.fields {
        field_rows(&source, &names)?
    } else {
        table_rows(&source, &names)?
    };
    table::print_table(&headers, &rows);
    info!("Listed {} table(s)", names.len());
    Ok(())
}

fn table_rows(source: &CsvSource, names: &[String]) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut rows = Vec::with_capacity(names.len());
    for name in names {
        let layout = source
            .layout(name)
            .with_context(|| format!("Reading layout of table '{name}'"))?;
        let path = source
            .path_of(name)
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        rows.push(vec![
            name.clone(),
            layout.fields.len().to_string(),
            layout.fields.iter().map(|field| field.name.as_str()).join(", "),
            path,
        ]);
    }
    let headers = ["table", "fields", "names", "path"]
        .iter()
        .map(|header| header.to_string())
        .collect();
    Ok((headers, rows))
}

fn field_rows(source: &CsvSource, names: &[String]) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut rows = Vec::new();
    for name in names {
        let layout = source
            .layout(name)
            .with_context(|| format!("Reading layout of table '{name}'"))?;
        for (idx, field) in layout.fields.iter().enumerate() {
            rows.push(vec![
                name.clone(),
                (idx + 1).to_string(),
                field.name.clone(),
                field.declared_type.clone().unwrap_or_default(),
            ]);
        }
    }
    let headers = ["table", "#", "field", "declared type"]
        .iter()
        .map(|header| header.to_string())
        .collect();
    Ok((headers, rows))
}
