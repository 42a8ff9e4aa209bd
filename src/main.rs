use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use disaster_etl::config::EtlConfig;
use disaster_etl::{logging, metrics, Pipeline};
use std::path::PathBuf;
use tracing::info;

const USAGE: &str = "Please provide the filepaths of the messages and categories \
datasets as the first and second argument respectively, as \
well as the filepath of the database to save the cleaned data \
to as the third argument. \n\nExample: process_data \
disaster_messages.csv disaster_categories.csv \
DisasterResponse.db";

#[derive(Parser)]
#[command(name = "process_data")]
#[command(about = "Join disaster messages with their categories, clean them and load them into SQLite")]
#[command(version = "0.1.0")]
struct Cli {
    /// Messages CSV (must have an `id` column)
    messages_filepath: PathBuf,
    /// Categories CSV (`id` plus the encoded `categories` column)
    categories_filepath: PathBuf,
    /// SQLite database file to write the cleaned table into
    database_filepath: PathBuf,
}

/// Parse the command line. `None` means the run should stop without doing any work.
fn parse_args<I, T>(args: I) -> anyhow::Result<Option<Cli>>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            Ok(None)
        }
        // A wrong argument count is informational, not a failure
        Err(_) => {
            println!("{}", USAGE);
            Ok(None)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let Some(cli) = parse_args(std::env::args_os())? else {
        return Ok(());
    };

    let _log_guard = logging::init_logging();
    let config = EtlConfig::load().context("Failed to load configuration")?;

    if config.metrics_path.is_some() {
        metrics::init()?;
    }

    let pipeline = Pipeline::new(config);
    let result = pipeline
        .run(&cli.messages_filepath, &cli.categories_filepath, &cli.database_filepath)
        .context("ETL run failed")?;

    if let Some(path) = &pipeline.config().metrics_path {
        metrics::write_snapshot(path)?;
    }

    info!(
        "Run complete: {} rows in table {} ({} duplicates removed)",
        result.saved.rows, result.table, result.clean.duplicates_removed
    );
    println!("Cleaned data saved to database!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_paths_parse() {
        let cli = parse_args(["process_data", "m.csv", "c.csv", "out.db"]).unwrap().unwrap();
        assert_eq!(cli.messages_filepath, PathBuf::from("m.csv"));
        assert_eq!(cli.categories_filepath, PathBuf::from("c.csv"));
        assert_eq!(cli.database_filepath, PathBuf::from("out.db"));
    }

    #[test]
    fn test_wrong_argument_count_is_a_no_op() {
        assert!(parse_args(["process_data"]).unwrap().is_none());
        assert!(parse_args(["process_data", "m.csv", "c.csv"]).unwrap().is_none());
        assert!(parse_args(["process_data", "m.csv", "c.csv", "out.db", "extra"]).unwrap().is_none());
    }

    #[test]
    fn test_help_is_a_no_op() {
        assert!(parse_args(["process_data", "--help"]).unwrap().is_none());
    }
}
