/* ---------------------------------------------------------------------------
 *  Segment aggregation and empirical p-values
 * ---------------------------------------------------------------------------
 * The observed statistic for a segment is the mean of each tracked variable
 * over the households on that segment. The null distribution for a variable
 * is the pooled set of segment means obtained after one within-block
 * permutation: every permuted segment, from every block, goes into the same
 * pool. A segment's p-value for that iteration is the fraction of the pool
 * whose magnitude strictly exceeds the magnitude of the observed mean.
 *
 * Iterations are independent: iteration `i` shuffles with its own generator
 * seeded with `i`, so they run in parallel and are merged in iteration order.
 */

use float_ord::FloatOrd;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, SegpermError};
use crate::permute::{permute_with, seeded_rng};
use crate::table::HouseholdTable;

/// Per-segment means of every tracked variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    /// Segment ids with at least one household, ascending.
    pub segments: Vec<usize>,
    /// `means[var][row]` is the mean of variable `var` on `segments[row]`.
    pub means: Vec<Vec<f64>>,
}

impl Aggregate {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Groups the table's rows by `labels` (one segment id per row) and averages
/// every tracked variable within each group.
pub fn aggregate(table: &HouseholdTable, labels: &[usize]) -> Aggregate {
    let n_segments = table.segments().len();
    let mut counts = vec![0usize; n_segments];
    for &s in labels {
        counts[s] += 1;
    }
    let segments: Vec<usize> = (0..n_segments).filter(|&s| counts[s] > 0).collect();

    let means = table
        .value_columns()
        .iter()
        .map(|column| {
            let mut sums = vec![0.0; n_segments];
            for (&s, &v) in labels.iter().zip(column) {
                sums[s] += v;
            }
            segments
                .iter()
                .map(|&s| sums[s] / counts[s] as f64)
                .collect()
        })
        .collect();

    Aggregate { segments, means }
}

/// For each observed value, the share of `null` values whose magnitude is
/// strictly greater. `null` must not be empty.
pub fn empirical_pvalues(observed: &[f64], null: &[f64]) -> Vec<f64> {
    let mut magnitudes: Vec<FloatOrd<f64>> = null.iter().map(|v| FloatOrd(v.abs())).collect();
    magnitudes.sort();
    let total = magnitudes.len() as f64;

    observed
        .iter()
        .map(|v| {
            let threshold = FloatOrd(v.abs());
            let not_exceeding = magnitudes.partition_point(|m| *m <= threshold);
            (magnitudes.len() - not_exceeding) as f64 / total
        })
        .collect()
}

pub fn pvalue_column(variable: &str, iteration: usize) -> String {
    format!("{variable}_p_{iteration}")
}

pub fn average_column(variable: &str) -> String {
    format!("{variable}_avg_p")
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Results keyed by true segment key. Starts with one column per variable
/// holding the observed segment means; p-value columns are appended after.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PValueTable {
    segment_column: String,
    variables: Vec<String>,
    segments: Vec<String>,
    columns: Vec<Column>,
}

impl PValueTable {
    pub fn new(segment_column: String, variables: Vec<String>, segments: Vec<String>) -> Self {
        Self {
            segment_column,
            variables,
            segments,
            columns: Vec::new(),
        }
    }

    /// Name of the key column, e.g. `TLID`.
    pub fn segment_column(&self) -> &str {
        &self.segment_column
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn require(&self, name: &str) -> Result<&[f64]> {
        self.column(name)
            .ok_or_else(|| SegpermError::missing_column(name))
    }

    /// Adds a column, replacing one with the same name in place.
    pub fn push_column(&mut self, name: String, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.len());
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { name, values }),
        }
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(idx).values)
    }
}

/// Permuted labels and per-variable p-values of one iteration.
struct IterationResult {
    permuted: Vec<usize>,
    pvalues: Vec<Vec<f64>>,
}

fn run_iteration(
    table: &HouseholdTable,
    observed: &Aggregate,
    iteration: usize,
) -> Result<IterationResult> {
    let mut rng = seeded_rng(iteration as u64);
    let permuted = permute_with(table, &mut rng);
    let null = aggregate(table, &permuted);
    if null.is_empty() {
        return Err(SegpermError::EmptyAggregate { iteration });
    }

    let pvalues = observed
        .means
        .iter()
        .zip(&null.means)
        .map(|(obs, null)| empirical_pvalues(obs, null))
        .collect();
    debug!(iteration, null_segments = null.len(), "permutation finished");

    Ok(IterationResult { permuted, pvalues })
}

/// Runs `iterations` within-block permutations (seeds `0..iterations`) and
/// returns the observed means plus one `<var>_p_<i>` column per variable per
/// iteration. Each iteration's permuted labels are appended to `table`.
pub fn compute_pvalues(table: &mut HouseholdTable, iterations: usize) -> Result<PValueTable> {
    if iterations == 0 {
        return Err(SegpermError::config("at least one iteration is required"));
    }
    info!(
        households = table.len(),
        blocks = table.blocks().len(),
        segments = table.segments().len(),
        iterations,
        "running permutation test"
    );

    let observed = aggregate(table, table.segment_ids());
    let shared: &HouseholdTable = table;
    let results = (0..iterations)
        .into_par_iter()
        .map(|i| run_iteration(shared, &observed, i))
        .collect::<Result<Vec<_>>>()?;

    let segments = observed
        .segments
        .iter()
        .map(|&s| table.segments()[s].clone())
        .collect();
    let mut pvals = PValueTable::new(
        table.schema().segment.clone(),
        table.variables().to_vec(),
        segments,
    );
    for (var, means) in table.variables().iter().zip(&observed.means) {
        pvals.push_column(var.clone(), means.clone());
    }

    for (i, result) in results.into_iter().enumerate() {
        for (var, values) in table.variables().iter().zip(result.pvalues) {
            pvals.push_column(pvalue_column(var, i), values);
        }
        let name = table.schema().permuted_column(i as u64);
        table.push_permuted(name, result.permuted);
    }

    Ok(pvals)
}
