//! Tessera CLI - query and edit CSV tables through the accessor pipeline

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use tessera_core::AccessorConfig;

mod edit;
mod query;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(version = tessera_core::VERSION)]
#[command(about = "Paged, filtered and decimated views of CSV tables", long_about = None)]
struct Cli {
    /// Accessor settings (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Arrow,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the column descriptions of a table
    Describe {
        /// CSV file
        file: PathBuf,
    },

    /// Print the client column descriptors of a table
    Columns {
        /// CSV file
        file: PathBuf,

        /// Column selection: `;`-separated names, a JSON list or a JSON object
        #[arg(long)]
        columns: Option<String>,
    },

    /// Run a page request and print the response envelope
    Query {
        /// CSV file
        file: PathBuf,

        /// Request payload read from a JSON file
        #[arg(long, conflicts_with = "inline")]
        payload: Option<PathBuf>,

        /// Request payload given inline
        #[arg(long)]
        inline: Option<String>,

        /// Page encoding
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Variable name reported to host functions
        #[arg(long, default_value = "table")]
        var: String,
    },

    /// Export the full table to a temporary CSV file and print its path
    Export {
        /// CSV file
        file: PathBuf,

        /// Variable name, used as the file prefix
        #[arg(long, default_value = "table")]
        var: String,
    },

    /// Replace one cell
    Edit {
        /// CSV file
        file: PathBuf,

        /// Row locator
        #[arg(long)]
        index: String,

        /// Column to edit
        #[arg(long)]
        col: String,

        /// New value (JSON, or plain text)
        #[arg(long)]
        value: String,

        /// Write the result here instead of printing it
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Remove one row
    Delete {
        /// CSV file
        file: PathBuf,

        /// Row locator
        #[arg(long)]
        index: String,

        /// Write the result here instead of printing it
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Insert one row
    Add {
        /// CSV file
        file: PathBuf,

        /// Row locator; 0 prepends
        #[arg(long)]
        index: String,

        /// Cells of the new row as a JSON array; defaults per column type
        #[arg(long)]
        row: Option<String>,

        /// Write the result here instead of printing it
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AccessorConfig> {
    match path {
        Some(path) => AccessorConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AccessorConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Describe { file } => query::describe(&file, config)?,

        Commands::Columns { file, columns } => query::columns(&file, config, columns.as_deref())?,

        Commands::Query {
            file,
            payload,
            inline,
            format,
            var,
        } => {
            let payload = match (payload, inline) {
                (Some(path), _) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read payload {}", path.display()))?,
                ),
                (None, inline) => inline,
            };
            let options = query::QueryOptions {
                var,
                payload,
                arrow: format == OutputFormat::Arrow,
            };
            query::query(&file, config, &options)?;
        }

        Commands::Export { file, var } => query::export(&file, config, &var)?,

        Commands::Edit {
            file,
            index,
            col,
            value,
            output,
        } => {
            let mutation = edit::Mutation::Edit { col, value };
            edit::apply(&file, config, &index, mutation, output.as_deref())?;
        }

        Commands::Delete { file, index, output } => {
            edit::apply(&file, config, &index, edit::Mutation::Delete, output.as_deref())?;
        }

        Commands::Add {
            file,
            index,
            row,
            output,
        } => {
            edit::apply(&file, config, &index, edit::Mutation::Add { row }, output.as_deref())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_query_flags() {
        let cli = Cli::try_parse_from([
            "tessera",
            "query",
            "data.csv",
            "--inline",
            "{\"start\": 0}",
            "--format",
            "arrow",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Query {
                inline, format, var, ..
            } => {
                assert_eq!(inline.as_deref(), Some("{\"start\": 0}"));
                assert_eq!(format, OutputFormat::Arrow);
                assert_eq!(var, "table");
            }
            _ => panic!("Expected Query command"),
        }
    }

    #[test]
    fn test_columns_selection() {
        let cli =
            Cli::try_parse_from(["tessera", "columns", "data.csv", "--columns", "a;b"]).unwrap();
        match cli.command {
            Commands::Columns { file, columns } => {
                assert_eq!(file, PathBuf::from("data.csv"));
                assert_eq!(columns.as_deref(), Some("a;b"));
            }
            _ => panic!("Expected Columns command"),
        }
    }

    #[test]
    fn test_payload_conflicts_with_inline() {
        let result = Cli::try_parse_from([
            "tessera", "query", "data.csv", "--payload", "p.json", "--inline", "{}",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tessera", "delete", "data.csv", "--index", "3", "--config", "tessera.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("tessera.toml")));
        assert!(matches!(cli.command, Commands::Delete { .. }));
    }
}
