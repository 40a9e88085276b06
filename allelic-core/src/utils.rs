use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

///
/// Get a reader for either a gzip'd or a plain file, decided by the `.gz` extension.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> std::io::Result<BufReader<Box<dyn Read>>> {
    let is_gzipped = path.extension() == Some(OsStr::new("gz"));
    let file = File::open(path)?;
    let file: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    Ok(BufReader::new(file))
}

///
/// Split a comma separated variant list into its tokens, skipping empty ones.
///
pub fn split_variant_list(joined: &str) -> impl Iterator<Item = &str> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

///
/// Leading token of a call entry, i.e. the text before the first comma.
///
pub fn leading_call_token(call: &str) -> &str {
    call.split(',').next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case("12:A,15:T", vec!["12:A", "15:T"])]
    #[case("", vec![])]
    #[case("12:A,,15:T,", vec!["12:A", "15:T"])]
    fn test_split_variant_list(#[case] joined: &str, #[case] expected: Vec<&str>) {
        let tokens: Vec<&str> = split_variant_list(joined).collect();
        assert_eq!(tokens, expected);
    }

    #[rstest]
    #[case("1,0.98,PASS", "1")]
    #[case("0", "0")]
    #[case("?,low", "?")]
    #[case("", "")]
    fn test_leading_call_token(#[case] call: &str, #[case] expected: &str) {
        assert_eq!(leading_call_token(call), expected);
    }
}
