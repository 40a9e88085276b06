use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::ArgMatches;
use log::info;

use allelic_core::StorageView;
use allelic_meta::{MetaConfig, MetaContext, compute_meta_components};

pub fn run_meta(matches: &ArgMatches) -> Result<()> {
    let storage_path = matches
        .get_one::<String>("storage")
        .context("--storage is required")?;
    let config_path = matches.get_one::<String>("config");
    let output_path = matches.get_one::<String>("output");

    let storage = StorageView::try_from(Path::new(storage_path))
        .with_context(|| format!("Failed to load storage snapshot: {}", storage_path))?;

    let config = match config_path {
        Some(p) => MetaConfig::try_from(Path::new(p))
            .with_context(|| format!("Failed to load config file: {}", p))?,
        None => MetaConfig::default(),
    };

    let context = MetaContext::new(storage, config);
    let components =
        compute_meta_components(&context).context("Failed to compute meta-components")?;

    let json = serde_json::to_string_pretty(&components)
        .context("Failed to serialize output to JSON")?;

    match output_path {
        Some(p) => {
            let mut file = File::create(Path::new(p))
                .with_context(|| format!("Failed to create output file: {}", p))?;
            file.write_all(json.as_bytes())?;
            info!("Output written to {}", p);
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            writeln!(stdout)?;
        }
    }

    Ok(())
}
