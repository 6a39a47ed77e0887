//! Collapses per-iteration p-value columns into one mean column per variable.

use tracing::info;

use crate::error::{Result, SegpermError};
use crate::pvalue::{average_column, pvalue_column, PValueTable};

/// Replaces `<var>_p_0 .. <var>_p_{iterations-1}` with their row-wise mean in
/// `<var>_avg_p`, for every tracked variable.
///
/// `iterations` must be the count the table was produced with. If any of the
/// expected columns is absent the table is left untouched and the first
/// missing name is reported.
pub fn average_pvalues(mut table: PValueTable, iterations: usize) -> Result<PValueTable> {
    if iterations == 0 {
        return Err(SegpermError::config("cannot average zero iterations"));
    }

    // Check the full shape first so a mismatch never yields a half-reduced table.
    for var in table.variables() {
        for i in 0..iterations {
            table.require(&pvalue_column(var, i))?;
        }
    }

    let variables = table.variables().to_vec();
    for var in &variables {
        let mut sums = vec![0.0; table.len()];
        for i in 0..iterations {
            let column = table
                .remove_column(&pvalue_column(var, i))
                .ok_or_else(|| SegpermError::missing_column(pvalue_column(var, i)))?;
            for (sum, p) in sums.iter_mut().zip(column) {
                *sum += p;
            }
        }
        let means = sums.into_iter().map(|s| s / iterations as f64).collect();
        table.push_column(average_column(var), means);
    }

    info!(
        segments = table.len(),
        variables = variables.len(),
        iterations,
        "averaged p-values"
    );
    Ok(table)
}
