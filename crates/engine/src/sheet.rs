use serde::{Deserialize, Serialize};

use crate::cell::CellValue;

/// Fixed vertical layout of a supplier sheet.
///
/// Rows 0–1 are display headers and are never reprocessed. Row 2 holds the
/// per-column aggregate sums. Transactional data begins at row 3.
pub const SUMMARY_ROW: usize = 2;
pub const DATA_START: usize = 3;

/// Rows captured as the display-header snapshot when a batch is saved
/// (headers + summary row).
pub const HEADER_SNAPSHOT_ROWS: usize = 4;

static EMPTY: CellValue = CellValue::Empty;

/// A sheet as a row-major matrix of canonical cells.
///
/// Rows may be ragged after import; writes past the current width right-pad
/// with Empty. Sheets are rebuilt from scratch on every ingestion: a loaded
/// sheet never mutates a previously loaded one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Widest row. Rows are ragged until a writer pads them.
    pub fn col_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    /// Cell at (row, col); out-of-bounds reads as Empty.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Write a cell, right-padding the row with Empty if it is short.
    /// Writes to rows that don't exist are dropped; stages only ever write
    /// into the summary row and existing data rows.
    pub fn set(&mut self, row: usize, col: usize, value: CellValue) {
        let Some(r) = self.rows.get_mut(row) else {
            return;
        };
        if r.len() <= col {
            r.resize(col + 1, CellValue::Empty);
        }
        r[col] = value;
    }

    /// Data rows (index `DATA_START` onward), with their absolute indices.
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &Vec<CellValue>)> {
        self.rows.iter().enumerate().skip(DATA_START)
    }

    /// The display-header slice saved alongside record batches.
    pub fn header_snapshot(&self) -> Vec<Vec<CellValue>> {
        self.rows
            .iter()
            .take(HEADER_SNAPSHOT_ROWS)
            .cloned()
            .collect()
    }
}
