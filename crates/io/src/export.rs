// Sheet export (xlsx only). Presentation snapshot, not a round-trip format.

use std::path::Path;

use rust_xlsxwriter::Workbook;

use daybook_engine::cell::CellValue;

/// Write a row matrix to an `.xlsx` file. Numbers stay numeric, Empty cells
/// are skipped entirely.
pub fn export_sheet(
    rows: &[Vec<CellValue>],
    sheet_name: &str,
    path: &Path,
) -> Result<(), String> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name).map_err(|e| e.to_string())?;

    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            match cell {
                CellValue::Empty => {}
                CellValue::Text(s) => {
                    worksheet
                        .write_string(row_idx as u32, col_idx as u16, s.as_str())
                        .map_err(|e| e.to_string())?;
                }
                CellValue::Number(n) => {
                    worksheet
                        .write_number(row_idx as u32, col_idx as u16, *n)
                        .map_err(|e| e.to_string())?;
                }
            }
        }
    }

    workbook.save(path).map_err(|e| e.to_string())
}
