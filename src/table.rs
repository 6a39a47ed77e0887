//! The in-memory household table the permutation engine works on.
//!
//! Block and segment keys are interned once at construction: each row stores
//! an index into the sorted list of distinct labels (numeric order when every
//! key is an integer, text order otherwise). Permuted label columns
//! reuse the segment label space, so a permuted column is just another vector
//! of segment indices.

use std::collections::HashMap;

use itertools::Itertools;

use crate::error::{Result, SegpermError};
use crate::frame::Frame;

/// Column names the engine reads from the merged input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    pub household: String,
    pub block: String,
    pub segment: String,
    pub variables: Vec<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            household: "MAFID".into(),
            block: "BLKID".into(),
            segment: "TLID".into(),
            variables: ["A", "B", "C", "D", "E"].iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl Schema {
    pub fn new(variables: Vec<String>) -> Self {
        Self {
            variables,
            ..Self::default()
        }
    }

    /// Rejects a variable list that names the same variable twice.
    pub fn validate(&self) -> Result<()> {
        if let Some(dup) = self.variables.iter().duplicates().next() {
            return Err(SegpermError::config(format!(
                "variable {dup} is listed more than once"
            )));
        }
        Ok(())
    }

    /// Name of the label column appended by a permutation with `seed`.
    pub fn permuted_column(&self, seed: u64) -> String {
        format!("{}_permuted_{}", self.segment, seed)
    }
}

/// One household as handed over by a caller that does not go through a
/// [`Frame`].
#[derive(Clone, Debug, PartialEq)]
pub struct Household {
    pub id: String,
    pub block: String,
    pub segment: String,
    pub values: Vec<f64>,
}

impl Household {
    pub fn new(
        id: impl Into<String>,
        block: impl Into<String>,
        segment: impl Into<String>,
        values: Vec<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            block: block.into(),
            segment: segment.into(),
            values,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct PermutedColumn {
    name: String,
    segment_ids: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HouseholdTable {
    schema: Schema,
    household_ids: Vec<String>,
    blocks: Vec<String>,
    block_ids: Vec<usize>,
    segments: Vec<String>,
    segment_ids: Vec<usize>,
    /// One column per tracked variable, in schema order.
    values: Vec<Vec<f64>>,
    /// Row indices of each block group, in original row order.
    groups: Vec<Vec<usize>>,
    permuted: Vec<PermutedColumn>,
}

/// Sorted distinct labels plus, for every input key, its label index.
/// Keys that all parse as integers are ordered numerically.
fn intern(keys: &[&str]) -> (Vec<String>, Vec<usize>) {
    let numeric = keys.iter().all(|k| k.trim().parse::<i128>().is_ok());
    let distinct = keys.iter().copied().unique();
    let labels: Vec<String> = if numeric {
        distinct
            .sorted_by_key(|k| (k.trim().parse::<i128>().unwrap_or_default(), *k))
            .map(str::to_string)
            .collect()
    } else {
        distinct.sorted().map(str::to_string).collect()
    };
    let index: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();
    let ids = keys.iter().map(|k| index[k]).collect();
    (labels, ids)
}

impl HouseholdTable {
    /// Builds the table from a merged frame, failing on the first schema
    /// column that is absent or on a variable cell that is not a finite number.
    pub fn from_frame(frame: &Frame, schema: Schema) -> Result<Self> {
        schema.validate()?;
        let household_ids = frame
            .column(&schema.household)?
            .into_iter()
            .map(str::to_string)
            .collect();
        let block_keys = frame.column(&schema.block)?;
        let segment_keys = frame.column(&schema.segment)?;

        let mut values = Vec::with_capacity(schema.variables.len());
        for var in &schema.variables {
            let cells = frame.column(var)?;
            let column = cells
                .iter()
                .enumerate()
                .map(|(row, cell)| {
                    cell.trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| SegpermError::InvalidNumber {
                            column: var.clone(),
                            row,
                            value: cell.to_string(),
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            values.push(column);
        }

        Ok(Self::assemble(
            schema,
            household_ids,
            &block_keys,
            &segment_keys,
            values,
        ))
    }

    /// Builds the table from typed records; every record must carry one finite
    /// value per tracked variable.
    pub fn from_records(schema: Schema, records: &[Household]) -> Result<Self> {
        schema.validate()?;
        let n_vars = schema.variables.len();
        if let Some(bad) = records.iter().find(|r| r.values.len() != n_vars) {
            return Err(SegpermError::config(format!(
                "household {} has {} values but {} variables are tracked",
                bad.id,
                bad.values.len(),
                n_vars
            )));
        }

        for (row, record) in records.iter().enumerate() {
            if let Some((v, value)) = record.values.iter().find_position(|v| !v.is_finite()) {
                return Err(SegpermError::InvalidNumber {
                    column: schema.variables[v].clone(),
                    row,
                    value: value.to_string(),
                });
            }
        }

        let household_ids = records.iter().map(|r| r.id.clone()).collect();
        let block_keys: Vec<&str> = records.iter().map(|r| r.block.as_str()).collect();
        let segment_keys: Vec<&str> = records.iter().map(|r| r.segment.as_str()).collect();
        let values = (0..n_vars)
            .map(|v| records.iter().map(|r| r.values[v]).collect())
            .collect();

        Ok(Self::assemble(
            schema,
            household_ids,
            &block_keys,
            &segment_keys,
            values,
        ))
    }

    fn assemble(
        schema: Schema,
        household_ids: Vec<String>,
        block_keys: &[&str],
        segment_keys: &[&str],
        values: Vec<Vec<f64>>,
    ) -> Self {
        let (blocks, block_ids) = intern(block_keys);
        let (segments, segment_ids) = intern(segment_keys);

        let mut groups = vec![Vec::new(); blocks.len()];
        for (row, &b) in block_ids.iter().enumerate() {
            groups[b].push(row);
        }

        Self {
            schema,
            household_ids,
            blocks,
            block_ids,
            segments,
            segment_ids,
            values,
            groups,
            permuted: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn variables(&self) -> &[String] {
        &self.schema.variables
    }

    pub fn len(&self) -> usize {
        self.household_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.household_ids.is_empty()
    }

    pub fn household_ids(&self) -> &[String] {
        &self.household_ids
    }

    /// Distinct block keys, sorted.
    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    pub fn block_ids(&self) -> &[usize] {
        &self.block_ids
    }

    /// Distinct segment keys, sorted. Index `i` is the label of segment id `i`.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn segment_ids(&self) -> &[usize] {
        &self.segment_ids
    }

    pub(crate) fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    /// Values of the tracked variable at position `var` in the schema.
    pub fn values(&self, var: usize) -> &[f64] {
        &self.values[var]
    }

    pub(crate) fn value_columns(&self) -> &[Vec<f64>] {
        &self.values
    }

    /// Appends a permuted label column, replacing any column of the same name.
    pub(crate) fn push_permuted(&mut self, name: String, segment_ids: Vec<usize>) {
        debug_assert_eq!(segment_ids.len(), self.len());
        match self.permuted.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.segment_ids = segment_ids,
            None => self.permuted.push(PermutedColumn { name, segment_ids }),
        }
    }

    pub fn permuted(&self, name: &str) -> Option<&[usize]> {
        self.permuted
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.segment_ids.as_slice())
    }

    /// The permuted column resolved back to segment keys.
    pub fn permuted_labels(&self, name: &str) -> Option<Vec<&str>> {
        self.permuted(name)
            .map(|ids| ids.iter().map(|&s| self.segments[s].as_str()).collect())
    }

    pub fn permuted_columns(&self) -> impl Iterator<Item = &str> {
        self.permuted.iter().map(|c| c.name.as_str())
    }
}
