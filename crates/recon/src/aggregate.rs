use daybook_engine::cell::CellValue;
use daybook_engine::sheet::{Sheet, DATA_START, SUMMARY_ROW};

use crate::config::AggregateSpec;

/// Literal written into the flag column when quantity parts disagree with
/// the reported total.
pub const DIFFERENCE_FLAG: &str = "difference";

/// Recompute the summary-row sums and per-row difference flags in place.
///
/// The summary row and flag column are pure functions of the data rows, so
/// this overwrites whatever was stored there. Idempotent: the inputs it
/// reads are never cells it writes. All three call sites (initial load,
/// full-sheet save, maintenance sweep) go through here.
pub fn recompute(sheet: &mut Sheet, spec: &AggregateSpec) {
    recompute_sums(sheet, spec);
    recompute_flags(sheet, spec);
}

fn recompute_sums(sheet: &mut Sheet, spec: &AggregateSpec) {
    // No data rows, nothing to summarize.
    if sheet.row_count() <= DATA_START {
        return;
    }
    for &col in &spec.sum_columns {
        let total: f64 = sheet
            .data_rows()
            .map(|(_, row)| {
                row.get(col)
                    .and_then(CellValue::coerce_number)
                    .unwrap_or(0.0)
            })
            .sum();
        // An all-empty column still gets an explicit 0.
        sheet.set(SUMMARY_ROW, col, CellValue::Number(total));
    }
}

/// Flag source coercion: an empty cell counts as 0, but non-numeric text is
/// a coercion failure that forces the flag empty for the whole row.
fn flag_source(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Empty => Some(0.0),
        other => other.coerce_number(),
    }
}

fn recompute_flags(sheet: &mut Sheet, spec: &AggregateSpec) {
    for row_idx in DATA_START..sheet.row_count() {
        if sheet.rows[row_idx].len() < spec.min_flag_width {
            continue;
        }
        let parts: Option<Vec<f64>> = spec
            .part_columns
            .iter()
            .map(|&c| flag_source(sheet.cell(row_idx, c)))
            .collect();
        let reported = flag_source(sheet.cell(row_idx, spec.reported_column));

        let flag = match (parts, reported) {
            (Some(parts), Some(reported)) if parts.iter().sum::<f64>() != reported => {
                CellValue::Text(DIFFERENCE_FLAG.to_string())
            }
            // Equal sums and coercion failures both clear the flag.
            _ => CellValue::Empty,
        };
        sheet.set(row_idx, spec.flag_column, flag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> CellValue {
        CellValue::Number(n)
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    /// Data row with the given quantity parts (cols 11-13), reported total
    /// (col 14), wide enough for the flag column.
    fn data_row(parts: [f64; 3], reported: f64) -> Vec<CellValue> {
        let mut row = vec![CellValue::Empty; 16];
        row[0] = text("Acme");
        row[11] = num(parts[0]);
        row[12] = num(parts[1]);
        row[13] = num(parts[2]);
        row[14] = num(reported);
        row
    }

    fn sheet_with(rows: Vec<Vec<CellValue>>) -> Sheet {
        let mut all = vec![
            vec![text("header")],
            vec![text("header")],
            vec![], // summary row, filled by recompute
        ];
        all.extend(rows);
        Sheet::new("test", all)
    }

    #[test]
    fn sums_written_to_summary_row() {
        let mut sheet = sheet_with(vec![data_row([1.0, 2.0, 3.0], 6.0), data_row([2.0, 0.0, 0.0], 2.0)]);
        recompute(&mut sheet, &AggregateSpec::default());
        assert_eq!(*sheet.cell(SUMMARY_ROW, 11), num(3.0));
        assert_eq!(*sheet.cell(SUMMARY_ROW, 12), num(2.0));
        assert_eq!(*sheet.cell(SUMMARY_ROW, 14), num(8.0));
    }

    #[test]
    fn non_numeric_cells_contribute_zero() {
        let mut row = data_row([1.0, 0.0, 0.0], 1.0);
        row[8] = text("n/a");
        let mut other = data_row([0.0, 0.0, 0.0], 0.0);
        other[8] = num(4.0);
        let mut sheet = sheet_with(vec![row, other]);
        recompute(&mut sheet, &AggregateSpec::default());
        assert_eq!(*sheet.cell(SUMMARY_ROW, 8), num(4.0));
    }

    #[test]
    fn numeric_text_is_summed() {
        let mut row = data_row([0.0, 0.0, 0.0], 0.0);
        row[9] = text("12");
        let mut sheet = sheet_with(vec![row]);
        recompute(&mut sheet, &AggregateSpec::default());
        assert_eq!(*sheet.cell(SUMMARY_ROW, 9), num(12.0));
    }

    #[test]
    fn zero_sum_is_explicit_zero_not_empty() {
        let mut sheet = sheet_with(vec![data_row([0.0, 0.0, 0.0], 0.0)]);
        recompute(&mut sheet, &AggregateSpec::default());
        assert_eq!(*sheet.cell(SUMMARY_ROW, 18), num(0.0));
    }

    #[test]
    fn sums_skipped_without_data_rows() {
        let mut sheet = Sheet::new("s", vec![vec![text("h")], vec![], vec![]]);
        recompute(&mut sheet, &AggregateSpec::default());
        assert_eq!(*sheet.cell(SUMMARY_ROW, 8), CellValue::Empty);
    }

    #[test]
    fn mismatch_sets_difference_flag() {
        let mut sheet = sheet_with(vec![data_row([1.0, 2.0, 3.0], 5.0)]);
        recompute(&mut sheet, &AggregateSpec::default());
        assert_eq!(*sheet.cell(3, 15), text(DIFFERENCE_FLAG));
    }

    #[test]
    fn match_clears_flag() {
        let mut row = data_row([1.0, 2.0, 3.0], 6.0);
        row[15] = text("stale");
        let mut sheet = sheet_with(vec![row]);
        recompute(&mut sheet, &AggregateSpec::default());
        assert_eq!(*sheet.cell(3, 15), CellValue::Empty);
    }

    #[test]
    fn empty_parts_coerce_to_zero() {
        let mut row = data_row([0.0, 0.0, 0.0], 0.0);
        row[11] = CellValue::Empty;
        row[12] = CellValue::Empty;
        row[13] = CellValue::Empty;
        row[14] = num(3.0);
        let mut sheet = sheet_with(vec![row]);
        recompute(&mut sheet, &AggregateSpec::default());
        assert_eq!(*sheet.cell(3, 15), text(DIFFERENCE_FLAG));
    }

    #[test]
    fn coercion_failure_forces_empty_flag() {
        let mut row = data_row([1.0, 2.0, 3.0], 5.0);
        row[12] = text("???");
        let mut sheet = sheet_with(vec![row]);
        recompute(&mut sheet, &AggregateSpec::default());
        assert_eq!(*sheet.cell(3, 15), CellValue::Empty);
    }

    #[test]
    fn narrow_rows_left_unflagged() {
        let mut narrow = vec![CellValue::Empty; 15];
        narrow[0] = text("Acme");
        let mut sheet = sheet_with(vec![narrow]);
        recompute(&mut sheet, &AggregateSpec::default());
        assert_eq!(sheet.rows[3].len(), 15);
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut sheet = sheet_with(vec![
            data_row([1.0, 2.0, 3.0], 5.0),
            data_row([2.0, 2.0, 2.0], 6.0),
        ]);
        recompute(&mut sheet, &AggregateSpec::default());
        let first = sheet.clone();
        recompute(&mut sheet, &AggregateSpec::default());
        assert_eq!(sheet, first);
    }
}
