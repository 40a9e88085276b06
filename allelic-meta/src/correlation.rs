//! Pairwise association tests between two columns of a tab separated table.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use log::debug;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorrelationError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Test type not implemented: {0}")]
    UnsupportedTest(String),

    #[error("Not enough usable rows for {test}: {rows}")]
    InsufficientData { test: CorrelationTest, rows: usize },

    #[error("Invalid distribution parameters: {0}")]
    Distribution(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CorrelationResult<T> = std::result::Result<T, CorrelationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationTest {
    Pearson,
    Spearman,
    Kendall,
    Cramer,
}

impl FromStr for CorrelationTest {
    type Err = CorrelationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pearsonr" => Ok(CorrelationTest::Pearson),
            "spearmanr" => Ok(CorrelationTest::Spearman),
            "kendalltau" => Ok(CorrelationTest::Kendall),
            "cramer" => Ok(CorrelationTest::Cramer),
            _ => Err(CorrelationError::UnsupportedTest(s.to_string())),
        }
    }
}

impl Display for CorrelationTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CorrelationTest::Pearson => "pearsonr",
            CorrelationTest::Spearman => "spearmanr",
            CorrelationTest::Kendall => "kendalltau",
            CorrelationTest::Cramer => "cramer",
        };
        write!(f, "{}", name)
    }
}

/// Test statistic and p-value, rounded to 4 decimals. Undefined values are `None`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct CorrelationScore {
    pub t: Option<f64>,
    pub p: Option<f64>,
}

impl CorrelationScore {
    fn new(t: f64, p: Option<f64>) -> Self {
        CorrelationScore {
            t: round4(t),
            p: p.and_then(round4),
        }
    }
}

fn round4(value: f64) -> Option<f64> {
    value
        .is_finite()
        .then(|| (value * 10_000.0).round() / 10_000.0)
}

/// Header and cells of a tab separated table.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RecordTable {
    pub fn from_reader<R: Read>(reader: R) -> CorrelationResult<Self> {
        let mut tsv = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);

        let headers = tsv.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in tsv.records() {
            let record = record?;
            rows.push(record.iter().map(String::from).collect());
        }
        Ok(RecordTable { headers, rows })
    }

    fn column_index(&self, name: &str) -> CorrelationResult<usize> {
        self.headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| CorrelationError::UnknownColumn(name.to_string()))
    }

    /// Cell pairs of two columns, skipping rows where either cell is empty.
    pub fn column_pairs(&self, first: &str, second: &str) -> CorrelationResult<Vec<(&str, &str)>> {
        let a = self.column_index(first)?;
        let b = self.column_index(second)?;
        Ok(self
            .rows
            .iter()
            .filter_map(|row| {
                let x = row.get(a)?.trim();
                let y = row.get(b)?.trim();
                (!x.is_empty() && !y.is_empty()).then_some((x, y))
            })
            .collect())
    }
}

impl TryFrom<&Path> for RecordTable {
    type Error = CorrelationError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let file = File::open(path)?;
        RecordTable::from_reader(file)
    }
}

///
/// Run `test` on columns `first` and `second` of `table`.
///
/// Numeric tests only use rows where both cells parse as numbers; Cramér's V
/// treats cells as categories.
///
pub fn correlate(
    table: &RecordTable,
    first: &str,
    second: &str,
    test: CorrelationTest,
) -> CorrelationResult<CorrelationScore> {
    let pairs = table.column_pairs(first, second)?;

    let (t, p) = match test {
        CorrelationTest::Cramer => {
            enough_rows(test, pairs.len())?;
            (cramers_v(&pairs), None)
        }
        CorrelationTest::Pearson => {
            let (x, y) = numeric_columns(test, &pairs)?;
            let (t, p) = pearson(&x, &y)?;
            (t, Some(p))
        }
        CorrelationTest::Spearman => {
            let (x, y) = numeric_columns(test, &pairs)?;
            let (t, p) = pearson(&average_ranks(&x), &average_ranks(&y))?;
            (t, Some(p))
        }
        CorrelationTest::Kendall => {
            let (x, y) = numeric_columns(test, &pairs)?;
            let (t, p) = kendall_tau_b(&x, &y)?;
            (t, Some(p))
        }
    };
    Ok(CorrelationScore::new(t, p))
}

fn enough_rows(test: CorrelationTest, rows: usize) -> CorrelationResult<()> {
    if rows < 2 {
        return Err(CorrelationError::InsufficientData { test, rows });
    }
    Ok(())
}

fn numeric_columns(
    test: CorrelationTest,
    pairs: &[(&str, &str)],
) -> CorrelationResult<(Vec<f64>, Vec<f64>)> {
    let (x, y): (Vec<f64>, Vec<f64>) = pairs
        .iter()
        .filter_map(|(a, b)| Some((a.parse::<f64>().ok()?, b.parse::<f64>().ok()?)))
        .unzip();
    debug!("{} numeric rows of {} usable for {}", x.len(), pairs.len(), test);
    enough_rows(test, x.len())?;
    Ok((x, y))
}

///
/// Pearson correlation coefficient and its two-sided p-value from a Student t
/// distribution with `n - 2` degrees of freedom.
///
pub fn pearson(x: &[f64], y: &[f64]) -> CorrelationResult<(f64, f64)> {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        cov += (a - mean_x) * (b - mean_y);
        var_x += (a - mean_x).powi(2);
        var_y += (b - mean_y).powi(2);
    }
    let r = (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0);
    if r.is_nan() {
        return Ok((f64::NAN, f64::NAN));
    }

    let df = n - 2.0;
    if df <= 0.0 {
        return Ok((r, 1.0));
    }
    let t = r * (df / ((1.0 - r) * (1.0 + r))).sqrt();
    if t.is_infinite() {
        return Ok((r, 0.0));
    }
    let student =
        StudentsT::new(0.0, 1.0, df).map_err(|e| CorrelationError::Distribution(e.to_string()))?;
    let p = 2.0 * (1.0 - student.cdf(t.abs()));
    Ok((r, p.min(1.0)))
}

/// Ranks starting at 1, tied values share the mean of their ranks.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + end + 1) as f64 / 2.0;
        for &index in &order[start..end] {
            ranks[index] = rank;
        }
        start = end;
    }
    ranks
}

fn tie_sums(values: &[f64]) -> (f64, f64, f64) {
    let mut groups: BTreeMap<u64, usize> = BTreeMap::new();
    for value in values {
        *groups.entry(value.to_bits()).or_insert(0) += 1;
    }
    groups
        .values()
        .filter(|&&size| size > 1)
        .map(|&size| size as f64)
        .fold((0.0, 0.0, 0.0), |(pairs, triples, variance), t| {
            (
                pairs + t * (t - 1.0),
                triples + t * (t - 1.0) * (t - 2.0),
                variance + t * (t - 1.0) * (2.0 * t + 5.0),
            )
        })
}

const KENDALL_EXACT_MAX_ROWS: usize = 33;

///
/// Kendall's tau-b with a two-sided p-value.
///
/// Without ties the p-value comes from the exact permutation distribution when
/// there are at most 33 rows or at most one discordant (or concordant) pair.
/// Otherwise the tie-corrected normal approximation is used.
///
pub fn kendall_tau_b(x: &[f64], y: &[f64]) -> CorrelationResult<(f64, f64)> {
    let n = x.len();
    let (mut concordant, mut discordant) = (0usize, 0usize);
    let (mut tied_x, mut tied_y) = (0usize, 0usize);
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i] - x[j];
            let dy = y[i] - y[j];
            if dx == 0.0 {
                tied_x += 1;
            }
            if dy == 0.0 {
                tied_y += 1;
            }
            if dx == 0.0 || dy == 0.0 {
                continue;
            }
            if (dx > 0.0) == (dy > 0.0) {
                concordant += 1;
            } else {
                discordant += 1;
            }
        }
    }

    let total = n * n.saturating_sub(1) / 2;
    let score = concordant as f64 - discordant as f64;
    let tau = score / (((total - tied_x) * (total - tied_y)) as f64).sqrt();
    if tau.is_nan() {
        return Ok((f64::NAN, f64::NAN));
    }
    let tau = tau.clamp(-1.0, 1.0);

    let extreme = discordant.min(total - discordant);
    if tied_x == 0 && tied_y == 0 && (n <= KENDALL_EXACT_MAX_ROWS || extreme <= 1) {
        return Ok((tau, kendall_exact_p(n, extreme)));
    }

    let nf = n as f64;
    let (x_pairs, x_triples, x_variance) = tie_sums(x);
    let (y_pairs, y_triples, y_variance) = tie_sums(y);
    let mut variance = (nf * (nf - 1.0) * (2.0 * nf + 5.0) - x_variance - y_variance) / 18.0
        + x_pairs * y_pairs / (2.0 * nf * (nf - 1.0));
    if n > 2 {
        variance += x_triples * y_triples / (9.0 * nf * (nf - 1.0) * (nf - 2.0));
    }

    let z = score / variance.sqrt();
    let normal =
        Normal::new(0.0, 1.0).map_err(|e| CorrelationError::Distribution(e.to_string()))?;
    let p = 2.0 * (1.0 - normal.cdf(z.abs()));
    Ok((tau, p.min(1.0)))
}

///
/// Two-sided p-value of observing at most `extreme` inversions among `n` untied
/// ranks, counting permutations by inversions (Mahonian numbers).
///
fn kendall_exact_p(n: usize, extreme: usize) -> f64 {
    // permutations of the first `size` ranks with exactly k inversions, k <= extreme
    let mut counts = vec![0.0; extreme + 1];
    counts[0] = 1.0;
    let mut factorial = 1.0;
    for size in 2..=n {
        factorial *= size as f64;
        let previous = counts.clone();
        let mut window = 0.0;
        for (k, count) in counts.iter_mut().enumerate() {
            // the new rank adds between 0 and size - 1 inversions
            window += previous[k];
            if k >= size {
                window -= previous[k - size];
            }
            *count = window;
        }
    }
    (2.0 * counts.iter().sum::<f64>() / factorial).min(1.0)
}

///
/// Cramér's V of the contingency table of two categorical columns, without
/// continuity correction.
///
pub fn cramers_v(pairs: &[(&str, &str)]) -> f64 {
    let mut table: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    let mut rows: BTreeMap<&str, f64> = BTreeMap::new();
    let mut columns: BTreeMap<&str, f64> = BTreeMap::new();
    for &(a, b) in pairs {
        *table.entry((a, b)).or_insert(0.0) += 1.0;
        *rows.entry(a).or_insert(0.0) += 1.0;
        *columns.entry(b).or_insert(0.0) += 1.0;
    }

    let n = pairs.len() as f64;
    let mut chi2 = 0.0;
    for (row, row_total) in &rows {
        for (column, column_total) in &columns {
            let expected = row_total * column_total / n;
            let observed = table.get(&(*row, *column)).copied().unwrap_or(0.0);
            chi2 += (observed - expected).powi(2) / expected;
        }
    }

    let dof = (rows.len().min(columns.len()) as f64) - 1.0;
    (chi2 / (n * dof)).sqrt()
}
