//! A minimal string-typed table used by the loading driver to merge address
//! lists, crosswalks and variable files before the engine sees them.

use std::collections::HashMap;

use crate::error::{Result, SegpermError};

/// Header plus rows of raw cells; every row has exactly `headers.len()` cells.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Frame {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != headers.len())
        {
            // Line numbers count the header as line 1.
            return Err(SegpermError::parse(
                i + 2,
                format!("expected {} fields, found {}", headers.len(), row.len()),
            ));
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| SegpermError::missing_column(name))
    }

    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.require(name)?;
        Ok(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        let idx = self.require(from)?;
        if from != to && self.column_index(to).is_some() {
            return Err(SegpermError::config(format!(
                "cannot rename {from} to {to}: column already exists"
            )));
        }
        self.headers[idx] = to.to_string();
        Ok(())
    }

    pub fn push_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if self.column_index(name).is_some() {
            return Err(SegpermError::config(format!("column {name} already exists")));
        }
        if values.len() != self.rows.len() {
            return Err(SegpermError::config(format!(
                "column {name} has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        self.headers.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Inner join on `key`. Left row order is kept and every matching right
    /// row is emitted in its own order. Right-hand columns whose name is
    /// already taken on the left get a `_y` suffix.
    pub fn inner_join(&self, right: &Frame, key: &str) -> Result<Frame> {
        let left_key = self.require(key)?;
        let right_key = right.require(key)?;

        let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            index.entry(row[right_key].as_str()).or_default().push(i);
        }

        let right_cols: Vec<usize> = (0..right.headers.len())
            .filter(|&c| c != right_key)
            .collect();
        let mut headers = self.headers.clone();
        for &c in &right_cols {
            let name = &right.headers[c];
            if headers.contains(name) {
                headers.push(format!("{name}_y"));
            } else {
                headers.push(name.clone());
            }
        }

        let mut rows = Vec::new();
        for row in &self.rows {
            let Some(matches) = index.get(row[left_key].as_str()) else {
                continue;
            };
            for &m in matches {
                let mut joined = row.clone();
                joined.extend(right_cols.iter().map(|&c| right.rows[m][c].clone()));
                rows.push(joined);
            }
        }

        Ok(Frame { headers, rows })
    }

    /// The first `n` rows, for previews.
    pub fn head(&self, n: usize) -> Frame {
        Frame {
            headers: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}
