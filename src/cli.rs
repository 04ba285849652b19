use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::projection::FieldOrder;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Export tabular data to Access XML/XSD with inferred column types",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Export tables to <OUTPUT>.xml and <OUTPUT>.xsd, narrowing each column's type
    Export(ExportArgs),
    /// List the tables (and optionally fields) an input provides
    List(ListArgs),
    /// Infer foreign-key hypotheses from value-set containment
    Relate(RelateArgs),
    /// Split an exported XML file back into one CSV file per table
    Flatten(FlattenArgs),
}

/// Options shared by every command that reads CSV/TSV tables.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// CSV/TSV files or directories containing them (one table per file)
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Base name for output; `.xml` and `.xsd` are appended
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Tables to include, omit for all
    #[arg(long = "tables", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub tables: Vec<String>,
    /// Tables to leave out
    #[arg(long = "exclude-tables", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub exclude_tables: Vec<String>,
    /// Declared column types to drop before inference (e.g. `blob`)
    #[arg(long = "exclude-types", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub exclude_types: Vec<String>,
    /// Maximum rows to export per table, for testing
    #[arg(long)]
    pub limit: Option<usize>,
    /// Infer relationships and write them as an extra table
    #[arg(long)]
    pub relationships: bool,
    #[command(flatten)]
    pub relate: RelateOptionArgs,
    /// Field order within each table
    #[arg(long = "field-order", value_enum, default_value = "declared")]
    pub field_order: FieldOrder,
}

#[derive(Debug, Args)]
pub struct RelateOptionArgs {
    /// Treat columns without values as referencing every other column
    #[arg(long = "include-empty-sets")]
    pub include_empty_sets: bool,
    /// Only accept referenced columns whose values never repeat
    #[arg(long = "require-unique-target")]
    pub require_unique_target: bool,
    /// Columns (`table.field` or `field`) to leave out of relationship inference
    #[arg(long = "skip-relate-field", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub skip_fields: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Show each table's fields and declared types as well
    #[arg(long)]
    pub fields: bool,
}

#[derive(Debug, Args)]
pub struct RelateArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub relate: RelateOptionArgs,
    /// Maximum rows to read per table
    #[arg(long)]
    pub limit: Option<usize>,
    /// Output format for the hypotheses
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct FlattenArgs {
    /// Exported XML file to split
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Directory receiving one CSV file per table
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,
    /// Delimiter for the CSV files written
    #[arg(long, value_parser = parse_delimiter, default_value = ",")]
    pub delimiter: u8,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
