//! Rendering of p-value tables and input previews.

use std::io::Write;

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Table};

use crate::csv::write_records;
use crate::error::Result;
use crate::frame::Frame;
use crate::pvalue::{average_column, PValueTable};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table
}

/// Terminal table with one row per segment. Averaged p-values at or below
/// `alpha` get a trailing `*`.
pub fn render_pvalues(pvals: &PValueTable, digits: usize, alpha: Option<f64>) -> Table {
    let mut table = new_table();
    let mut hdr = vec![pvals.segment_column().to_string()];
    hdr.extend(pvals.column_names().map(str::to_string));
    table.set_header(hdr.iter().map(Cell::new).collect::<Vec<_>>());

    let flagged: Vec<bool> = pvals
        .columns()
        .iter()
        .map(|c| pvals.variables().iter().any(|v| average_column(v) == c.name))
        .collect();

    for (row, segment) in pvals.segments().iter().enumerate() {
        let mut cells = vec![Cell::new(segment)];
        for (column, &is_pvalue) in pvals.columns().iter().zip(&flagged) {
            let value = column.values[row];
            let suffix = match alpha {
                Some(cut) if is_pvalue && value <= cut + 1e-8 => "*",
                _ => "",
            };
            cells.push(Cell::new(format!("{:.1$}{2}", value, digits, suffix)));
        }
        table.add_row(cells);
    }
    table
}

/// Writes the table as CSV, segment key first. Values keep full precision.
pub fn write_pvalues_csv<W: Write>(out: &mut W, pvals: &PValueTable) -> Result<()> {
    let mut headers = vec![pvals.segment_column().to_string()];
    headers.extend(pvals.column_names().map(str::to_string));

    let rows = pvals.segments().iter().enumerate().map(|(row, segment)| {
        let mut cells = vec![segment.clone()];
        cells.extend(pvals.columns().iter().map(|c| c.values[row].to_string()));
        cells
    });
    write_records(out, &headers, rows)
}

pub fn write_pvalues_json<W: Write>(out: &mut W, pvals: &PValueTable) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, pvals)?;
    writeln!(out)?;
    Ok(())
}

/// First `rows` rows of a frame as a terminal table.
pub fn render_preview(frame: &Frame, rows: usize) -> Table {
    let mut table = new_table();
    table.set_header(frame.headers().iter().map(Cell::new).collect::<Vec<_>>());
    for row in frame.head(rows).rows() {
        table.add_row(row.iter().map(Cell::new).collect::<Vec<_>>());
    }
    table
}
