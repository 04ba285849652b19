//! Splits an exported `<dataroot>` document back into one CSV file per table.
//!
//! The first pass discovers each table's fields in first-seen order; the
//! second writes the rows, leaving cells empty where a row had no element.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use log::info;
use quick_xml::{Reader, events::Event};
use serde::Serialize;

use crate::{cli::FlattenArgs, io_utils};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatTable {
    pub name: String,
    pub fields: Vec<String>,
    pub rows: usize,
}

type FlatRow = Vec<(String, String)>;

/// Calls `on_row` for every element two levels below the document root.
fn scan_rows<R, F>(reader: R, mut on_row: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(&str, FlatRow) -> Result<()>,
{
    let mut reader = Reader::from_reader(reader);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut row: FlatRow = Vec::new();
    let mut value = String::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|err| {
            anyhow!(
                "XML parsing error at position {}: {err}",
                reader.error_position()
            )
        })?;
        match event {
            Event::Start(element) => {
                path.push(String::from_utf8_lossy(element.name().as_ref()).into_owned());
                if path.len() == 3 {
                    value.clear();
                }
            }
            Event::Empty(element) => {
                let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                match path.len() {
                    1 => on_row(&name, Vec::new())?,
                    2 => row.push((name, String::new())),
                    _ => {}
                }
            }
            Event::Text(text) if path.len() == 3 => {
                value.push_str(&text.unescape()?);
            }
            Event::CData(text) if path.len() == 3 => {
                value.push_str(&String::from_utf8_lossy(&text.into_inner()));
            }
            Event::End(_) => {
                match path.len() {
                    3 => {
                        if let Some(field) = path.last() {
                            row.push((field.clone(), std::mem::take(&mut value)));
                        }
                    }
                    2 => {
                        if let Some(table) = path.last() {
                            on_row(table, std::mem::take(&mut row))?;
                        }
                    }
                    _ => {}
                }
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn open_xml(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Opening XML file {path:?}"))?;
    Ok(BufReader::new(file))
}

/// First pass: tables and their fields in first-seen order.
pub fn discover_layout(path: &Path) -> Result<Vec<FlatTable>> {
    let mut tables: Vec<FlatTable> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    scan_rows(open_xml(path)?, |table, row| {
        let idx = *positions.entry(table.to_string()).or_insert_with(|| {
            tables.push(FlatTable {
                name: table.to_string(),
                fields: Vec::new(),
                rows: 0,
            });
            tables.len() - 1
        });
        let entry = &mut tables[idx];
        entry.rows += 1;
        for (field, _) in row {
            if !entry.fields.contains(&field) {
                entry.fields.push(field);
            }
        }
        Ok(())
    })
    .with_context(|| format!("Discovering tables in {path:?}"))?;
    Ok(tables)
}

/// Second pass: one `<table>.csv` per discovered table under `output_dir`.
pub fn write_tables(
    path: &Path,
    layout: &[FlatTable],
    output_dir: &Path,
    delimiter: u8,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Creating output directory {output_dir:?}"))?;
    let fields_of = layout
        .iter()
        .map(|table| (table.name.as_str(), table.fields.as_slice()))
        .collect::<HashMap<_, _>>();
    let mut writers = HashMap::new();
    let mut written = Vec::new();

    scan_rows(open_xml(path)?, |table, row| {
        let fields = fields_of
            .get(table)
            .copied()
            .ok_or_else(|| anyhow!("Table '{table}' was not seen in the first pass"))?;
        if !writers.contains_key(table) {
            let csv_path = output_dir.join(format!("{table}.csv"));
            info!("Writing table '{table}' to {csv_path:?}");
            let mut writer = io_utils::open_csv_writer(&csv_path, delimiter)?;
            writer
                .write_record(fields)
                .with_context(|| format!("Writing headers to {csv_path:?}"))?;
            writers.insert(table.to_string(), writer);
            written.push(csv_path);
        }
        let Some(writer) = writers.get_mut(table) else {
            return Ok(());
        };
        let values = row.into_iter().collect::<HashMap<_, _>>();
        let record = fields
            .iter()
            .map(|field| values.get(field).map(String::as_str).unwrap_or(""));
        writer
            .write_record(record)
            .with_context(|| format!("Writing a row of table '{table}'"))?;
        Ok(())
    })
    .with_context(|| format!("Flattening {path:?}"))?;

    for (table, mut writer) in writers {
        writer
            .flush()
            .with_context(|| format!("Flushing CSV output for table '{table}'"))?;
    }
    Ok(written)
}

pub fn execute(args: &FlattenArgs) -> Result<()> {
    let layout = discover_layout(&args.input)?;
    let written = write_tables(&args.input, &layout, &args.output_dir, args.delimiter)?;
    info!(
        "Flattened {} table(s) from {:?} into {:?} with delimiter '{}'",
        written.len(),
        args.input,
        args.output_dir,
        crate::printable_delimiter(args.delimiter)
    );
    println!("{}", serde_json::to_string_pretty(&layout)?);
    Ok(())
}
