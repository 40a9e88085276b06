use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use clap::ArgMatches;
use log::info;

use allelic_core::StorageView;
use allelic_meta::typing::sequence_typing;

pub fn run_typing(matches: &ArgMatches) -> Result<()> {
    let storage_path = matches
        .get_one::<String>("storage")
        .context("--storage is required")?;
    let output_path = matches.get_one::<String>("output");

    let storage = StorageView::try_from(Path::new(storage_path))
        .with_context(|| format!("Failed to load storage snapshot: {}", storage_path))?;
    let typing = sequence_typing(&storage);

    match output_path {
        Some(p) => {
            let file = File::create(Path::new(p))
                .with_context(|| format!("Failed to create output file: {}", p))?;
            typing
                .write_tsv(BufWriter::new(file))
                .context("Failed to write sequence typing")?;
            info!("Output written to {}", p);
        }
        None => {
            typing
                .write_tsv(io::stdout().lock())
                .context("Failed to write sequence typing")?;
        }
    }

    Ok(())
}
