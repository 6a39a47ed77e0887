//! # segperm
//!
//! Permutation test for clustering of household values along street
//! segments. Households are grouped into blocks; within each block the
//! segment labels are shuffled, segment means are recomputed, and the true
//! segment means are compared against the pooled shuffled means to get an
//! empirical p-value per variable per segment.
//!
//! The pipeline is three steps:
//!
//! * [`permute`] – shuffle segment labels within every block for one seed.
//! * [`compute_pvalues`] – true means plus one p-value column per variable
//!   per iteration (iteration `i` uses seed `i`).
//! * [`average_pvalues`] – mean of the per-iteration columns.
//!
//! [`find_pvalues`] runs the last two back to back.

pub mod average;
pub mod csv;
pub mod error;
pub mod frame;
pub mod permute;
pub mod pvalue;
pub mod report;
pub mod synth;
pub mod table;

pub use average::average_pvalues;
pub use error::{Result, SegpermError};
pub use frame::Frame;
pub use permute::{permute, permute_with};
pub use pvalue::{compute_pvalues, PValueTable};
pub use table::{Household, HouseholdTable, Schema};

/// Runs `iterations` permutations and returns the averaged p-value table.
pub fn find_pvalues(table: &mut HouseholdTable, iterations: usize) -> Result<PValueTable> {
    let pvals = compute_pvalues(table, iterations)?;
    average_pvalues(pvals, iterations)
}
