use clap::{Command, arg};

pub const META_CMD: &str = "meta";

pub fn create_meta_cli() -> Command {
    Command::new(META_CMD)
        .about("Derive variant count clustering, sample distance manifold and allele networks from a storage snapshot.")
        .arg(
            arg!(--storage <STORAGE>)
                .required(true)
                .help("Path to the storage snapshot (JSON, optionally gzipped)"),
        )
        .arg(
            arg!(--config <CONFIG>)
                .required(false)
                .help("Path to a TOML file with derivation parameters"),
        )
        .arg(
            arg!(--output <OUTPUT>)
                .required(false)
                .help("Output JSON path (default: stdout)"),
        )
}
