mod correlation;
mod meta;
mod typing;

use anyhow::Result;
use clap::Command;
use tracing_subscriber::EnvFilter;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const BIN_NAME: &str = "allelic";
    pub const DEFAULT_LOG_FILTER: &str = "info";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .about("Derive clustering, distance manifold and allele lineage views from variant-call snapshots.")
        .subcommand_required(true)
        .subcommand(meta::cli::create_meta_cli())
        .subcommand(typing::cli::create_typing_cli())
        .subcommand(correlation::cli::create_correlation_cli())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(consts::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();

    let app = build_parser();
    let matches = app.get_matches();

    match matches.subcommand() {
        //
        // META-COMPONENTS
        //
        Some((meta::cli::META_CMD, matches)) => {
            meta::handlers::run_meta(matches)?;
        }

        //
        // SEQUENCE TYPING
        //
        Some((typing::cli::TYPING_CMD, matches)) => {
            typing::handlers::run_typing(matches)?;
        }

        //
        // CORRELATION
        //
        Some((correlation::cli::CORRELATION_CMD, matches)) => {
            correlation::handlers::run_correlation(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_is_consistent() {
        build_parser().debug_assert();
    }
}
