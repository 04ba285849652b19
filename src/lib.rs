pub mod candidates;
pub mod cli;
pub mod column_key;
pub mod export;
pub mod flatten;
pub mod io_utils;
pub mod list;
pub mod narrow;
pub mod projection;
pub mod relate;
pub mod relations;
pub mod source;
pub mod table;
pub mod temporal;
pub mod values;
pub mod xml;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("db2access", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    debug!("Parsed command line: {:?}", cli.command);
    match cli.command {
        Commands::Export(args) => export::execute(&args),
        Commands::List(args) => list::execute(&args),
        Commands::Relate(args) => relate::execute(&args),
        Commands::Flatten(args) => flatten::execute(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiters_print_escaped() {
        assert_eq!(printable_delimiter(b','), ",");
        assert_eq!(printable_delimiter(b'\t'), "\\t");
        assert_eq!(printable_delimiter(b';'), ";");
    }
}
