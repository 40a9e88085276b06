use clap::{Command, arg};

pub const TYPING_CMD: &str = "typing";

pub fn create_typing_cli() -> Command {
    Command::new(TYPING_CMD)
        .about("Assign sequence types to the samples of a storage snapshot.")
        .arg(
            arg!(--storage <STORAGE>)
                .required(true)
                .help("Path to the storage snapshot (JSON, optionally gzipped)"),
        )
        .arg(
            arg!(--output <OUTPUT>)
                .required(false)
                .help("Output TSV path (default: stdout)"),
        )
}
