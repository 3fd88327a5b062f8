// Workbook import (xlsx, xls, xlsb, ods) into the raw sheet model.
//
// One-way conversion: cells come out as canonical values, normalization and
// aggregate recomputation happen downstream in the pipeline. Legacy `.xls`
// files are sniffed for HTML masquerade (some supplier systems export an
// HTML table under the .xls extension) and routed to the HTML reader.

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};

use daybook_engine::cell::CellValue;
use daybook_recon::pipeline::{RawSheet, RawWorkbook, WorkbookSource};

use crate::html;

/// Bytes sniffed from the head of a `.xls` file for HTML markers.
const SNIFF_LEN: usize = 100;

/// Reader for real spreadsheet files, with the HTML-masquerade escape hatch.
#[derive(Debug, Default)]
pub struct ExcelSource;

impl WorkbookSource for ExcelSource {
    fn load(&self, path: &Path, max_sheets: usize) -> Result<RawWorkbook, String> {
        if is_html_masquerade(path)? {
            log::debug!("detected HTML-formatted XLS file: {}", path.display());
            return html::read_table(path);
        }
        load_spreadsheet(path, max_sheets)
    }
}

/// A `.xls` that starts with HTML markup is not a spreadsheet at all.
fn is_html_masquerade(path: &Path) -> Result<bool, String> {
    let is_xls = path
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("xls"))
        .unwrap_or(false);
    if !is_xls {
        return Ok(false);
    }

    let mut file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let mut head = [0u8; SNIFF_LEN];
    let n = file.read(&mut head).map_err(|e| e.to_string())?;
    let head = head[..n].to_ascii_lowercase();

    let markers: [&[u8]; 3] = [b"<html", b"<!doctype", b"<meta"];
    Ok(markers
        .iter()
        .any(|marker| head.windows(marker.len()).any(|w| w == *marker)))
}

fn load_spreadsheet(path: &Path, max_sheets: usize) -> Result<RawWorkbook, String> {
    let mut workbook: Sheets<_> =
        open_workbook_auto(path).map_err(|e| format!("failed to open workbook: {e}"))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err("workbook contains no sheets".to_string());
    }

    let mut sheets = Vec::new();
    for sheet_name in sheet_names.iter().take(max_sheets) {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| format!("failed to read sheet '{sheet_name}': {e}"))?;

        // Range may not begin at A1; keep absolute positions.
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); start_row as usize];

        for row in range.rows() {
            let mut out = vec![CellValue::Empty; start_col as usize];
            out.extend(row.iter().map(convert_cell));
            rows.push(out);
        }

        sheets.push(RawSheet {
            name: sheet_name.clone(),
            rows,
        });
    }

    Ok(RawWorkbook {
        sheets,
        total_sheets: sheet_names.len(),
    })
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => CellValue::Text(format!("#{e:?}")),
        // Dates surface as day serials; the pipeline formats the designated
        // payment-date column, everything else stays numeric.
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
