#![cfg(not(tarpaulin_include))]

use clap::{Parser, Subcommand};
use leadsheet::aliases::FieldTable;
use leadsheet::loader::load_spreadsheet;
use leadsheet::mapper::{MappingSelection, map_rows};
use std::path::PathBuf;

/// Inspect a lead spreadsheet the way the import service would
#[derive(Parser)]
#[command(name = "leadsheet", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the header row
    Headers { file: PathBuf },

    /// Print the suggested column for every field
    Suggest {
        file: PathBuf,

        /// JSON field table to use instead of the built-in one
        #[arg(long)]
        fields: Option<PathBuf>,
    },

    /// Print mapped lead records
    Map {
        file: PathBuf,

        #[arg(long)]
        fields: Option<PathBuf>,

        /// Explicit column choice, e.g. --map email="Work Email"
        #[arg(long = "map", value_parser = parse_choice)]
        choices: Vec<(String, String)>,
    },
}

fn parse_choice(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, header)| (key.trim().to_string(), header.to_string()))
        .ok_or_else(|| format!("expected key=Header, got '{raw}'"))
}

fn field_table(path: Option<PathBuf>) -> leadsheet::Result<FieldTable> {
    match path {
        Some(path) => FieldTable::from_json_file(path),
        None => Ok(FieldTable::builtin()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let output = match cli.command {
        Command::Headers { file } => {
            let sheet = load_spreadsheet(&file)?;
            serde_json::to_string_pretty(&sheet.headers)?
        }
        Command::Suggest { file, fields } => {
            let table = field_table(fields)?;
            let sheet = load_spreadsheet(&file)?;
            serde_json::to_string_pretty(&table.suggest(&sheet.headers))?
        }
        Command::Map {
            file,
            fields,
            choices,
        } => {
            let table = field_table(fields)?;
            let sheet = load_spreadsheet(&file)?;
            let selection: MappingSelection = choices.into_iter().collect();
            serde_json::to_string_pretty(&map_rows(&table, &sheet, &selection))?
        }
    };

    println!("{}", output);
    Ok(())
}
