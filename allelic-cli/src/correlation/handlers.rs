use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::ArgMatches;

use allelic_meta::correlation::{CorrelationTest, RecordTable, correlate};

pub fn run_correlation(matches: &ArgMatches) -> Result<()> {
    let table_path = matches
        .get_one::<String>("table")
        .context("--table is required")?;
    let first = matches
        .get_one::<String>("col1")
        .context("--col1 is required")?;
    let second = matches
        .get_one::<String>("col2")
        .context("--col2 is required")?;
    let test: CorrelationTest = matches
        .get_one::<String>("test")
        .context("--test is required")?
        .parse()?;

    let table = RecordTable::try_from(Path::new(table_path))
        .with_context(|| format!("Failed to load table: {}", table_path))?;
    let score = correlate(&table, first, second, test)
        .with_context(|| format!("Failed to run {} on {} and {}", test, first, second))?;

    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &score).context("Failed to serialize output to JSON")?;
    writeln!(stdout)?;

    Ok(())
}
