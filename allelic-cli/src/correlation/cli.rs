use clap::{Command, arg, builder::PossibleValuesParser};

pub const CORRELATION_CMD: &str = "correlation";

pub fn create_correlation_cli() -> Command {
    Command::new(CORRELATION_CMD)
        .about("Test the association of two columns of a tab separated table.")
        .arg(
            arg!(--table <TABLE>)
                .required(true)
                .help("Path to a tab separated table with a header row"),
        )
        .arg(arg!(--col1 <COLUMN>).required(true).help("First column"))
        .arg(arg!(--col2 <COLUMN>).required(true).help("Second column"))
        .arg(
            arg!(--test <TEST>)
                .required(true)
                .value_parser(PossibleValuesParser::new([
                    "pearsonr",
                    "spearmanr",
                    "kendalltau",
                    "cramer",
                ]))
                .help("Association test to run"),
        )
}
