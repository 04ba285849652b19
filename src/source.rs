//! Row sources: tables with an ordered field list and a stream of rows.
//!
//! A row holds one entry per field, `None` marking NULL. [`CsvSource`] reads
//! one table per CSV/TSV file; [`MemorySource`] serves rows held in memory.

use std::{
    collections::{BTreeMap, HashSet},
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::Encoding;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::io_utils;

pub type Row = Vec<Option<String>>;

pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Row>> + 'a>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldLayout {
    pub name: String,
    /// Type declared by the source itself, if it has one.
    pub declared_type: Option<String>,
}

impl FieldLayout {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLayout {
    pub name: String,
    pub fields: Vec<FieldLayout>,
}

pub trait RowSource {
    fn table_names(&self) -> Vec<String>;

    fn layout(&self, table: &str) -> Result<TableLayout>;

    /// Rows of `table`, positionally matching [`RowSource::layout`].
    fn rows<'a>(&'a mut self, table: &str) -> Result<RowIter<'a>>;
}

#[derive(Debug, Clone)]
struct CsvTable {
    name: String,
    path: PathBuf,
}

/// One table per `.csv` / `.tsv` file, named after the file stem.
#[derive(Debug, Clone)]
pub struct CsvSource {
    tables: Vec<CsvTable>,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
}

impl CsvSource {
    /// Each input is either a file or a directory scanned (non-recursively)
    /// for tabular files.
    pub fn open(
        inputs: &[PathBuf],
        delimiter: Option<u8>,
        encoding: &'static Encoding,
    ) -> Result<Self> {
        let mut tables = Vec::new();
        let mut seen = HashSet::new();
        for input in inputs {
            let files = if input.is_dir() {
                let mut files = fs::read_dir(input)
                    .with_context(|| format!("Listing directory {input:?}"))?
                    .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                    .filter(|path| io_utils::is_tabular_file(path))
                    .collect::<Vec<_>>();
                files.sort();
                files
            } else if input.is_file() {
                vec![input.clone()]
            } else {
                bail!("Input {input:?} does not exist");
            };
            for path in files {
                let name = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .ok_or_else(|| anyhow!("Cannot derive a table name from {path:?}"))?
                    .to_string();
                if !seen.insert(name.clone()) {
                    bail!("Table '{name}' is provided by more than one file ({path:?})");
                }
                debug!("Table '{name}' reads {path:?}");
                tables.push(CsvTable { name, path });
            }
        }
        Ok(Self {
            tables,
            delimiter,
            encoding,
        })
    }

    pub fn path_of(&self, table: &str) -> Option<&Path> {
        self.table(table).ok().map(|table| table.path.as_path())
    }

    fn table(&self, name: &str) -> Result<&CsvTable> {
        self.tables
            .iter()
            .find(|table| table.name == name)
            .ok_or_else(|| anyhow!("Unknown table '{name}'"))
    }

    fn delimiter_for(&self, path: &Path) -> u8 {
        io_utils::resolve_input_delimiter(path, self.delimiter)
    }
}

impl RowSource for CsvSource {
    fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|table| table.name.clone()).collect()
    }

    fn layout(&self, table: &str) -> Result<TableLayout> {
        let table = self.table(table)?;
        let mut reader =
            io_utils::open_csv_reader_from_path(&table.path, self.delimiter_for(&table.path), true)?;
        let headers = io_utils::reader_headers(&mut reader, self.encoding)
            .with_context(|| format!("Reading headers of {:?}", table.path))?;
        let declared = load_sidecar(&table.path)?;
        let fields = headers
            .into_iter()
            .map(|name| {
                let declared_type = declared.get(&name).cloned();
                FieldLayout {
                    name,
                    declared_type,
                }
            })
            .collect();
        Ok(TableLayout {
            name: table.name.clone(),
            fields,
        })
    }

    fn rows<'a>(&'a mut self, table: &str) -> Result<RowIter<'a>> {
        let table = self.table(table)?;
        let reader =
            io_utils::open_csv_reader_from_path(&table.path, self.delimiter_for(&table.path), true)?;
        let encoding = self.encoding;
        let path = table.path.clone();
        let iter = reader
            .into_byte_records()
            .enumerate()
            .map(move |(idx, record)| {
                // Line 1 holds the headers.
                let line = idx + 2;
                let record = record.with_context(|| format!("Reading row {line} of {path:?}"))?;
                let decoded = io_utils::decode_record(&record, encoding)
                    .with_context(|| format!("Decoding row {line} of {path:?}"))?;
                Ok(decoded
                    .into_iter()
                    .map(|value| if value.is_empty() { None } else { Some(value) })
                    .collect())
            });
        Ok(Box::new(iter))
    }
}

#[derive(Debug, Default, Deserialize)]
struct SidecarSchema {
    #[serde(default)]
    columns: Vec<SidecarColumn>,
}

#[derive(Debug, Deserialize)]
struct SidecarColumn {
    name: String,
    #[serde(alias = "type")]
    datatype: String,
}

pub fn sidecar_path(table_path: &Path) -> PathBuf {
    table_path.with_extension("schema.yml")
}

/// Declared types from `<stem>.schema.yml`, keyed by column name.
fn load_sidecar(table_path: &Path) -> Result<BTreeMap<String, String>> {
    let path = sidecar_path(table_path);
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }
    let file = File::open(&path).with_context(|| format!("Opening schema file {path:?}"))?;
    let schema: SidecarSchema = serde_yaml::from_reader(BufReader::new(file))
        .with_context(|| format!("Parsing schema file {path:?}"))?;
    debug!(
        "Loaded {} declared column type(s) from {path:?}",
        schema.columns.len()
    );
    Ok(schema
        .columns
        .into_iter()
        .map(|column| (column.name, column.datatype))
        .collect())
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: Vec<(TableLayout, Vec<Row>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, layout: TableLayout, rows: Vec<Row>) {
        self.tables.push((layout, rows));
    }

    /// Convenience builder taking borrowed cells; `None` is NULL.
    pub fn with_table(mut self, name: &str, fields: &[&str], rows: &[&[Option<&str>]]) -> Self {
        let layout = TableLayout {
            name: name.to_string(),
            fields: fields.iter().map(|field| FieldLayout::new(*field)).collect(),
        };
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.map(str::to_string)).collect())
            .collect();
        self.add_table(layout, rows);
        self
    }

    fn find(&self, name: &str) -> Result<&(TableLayout, Vec<Row>)> {
        self.tables
            .iter()
            .find(|(layout, _)| layout.name == name)
            .ok_or_else(|| anyhow!("Unknown table '{name}'"))
    }
}

impl RowSource for MemorySource {
    fn table_names(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|(layout, _)| layout.name.clone())
            .collect()
    }

    fn layout(&self, table: &str) -> Result<TableLayout> {
        self.find(table).map(|(layout, _)| layout.clone())
    }

    fn rows<'a>(&'a mut self, table: &str) -> Result<RowIter<'a>> {
        let (_, rows) = self.find(table)?;
        Ok(Box::new(rows.iter().cloned().map(Ok)))
    }
}
