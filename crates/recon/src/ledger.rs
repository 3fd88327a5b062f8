//! Record deduplication and accumulation.
//!
//! Maps uploaded data rows to durable payment/re-order records, skipping
//! rows whose identity tuple is already recorded for the day. Repeated
//! uploads of overlapping data are the normal case, not an error: the
//! second upload simply reports everything as skipped.
//!
//! The check-then-insert sequence here is NOT atomic across callers.
//! Identities are pre-loaded once, checked in memory, and committed at the
//! end; two concurrent ingests for the same (date, kind) can both pass the
//! in-memory check. Callers serialize uploads per date; the SQLite store's
//! unique identity index backstops the race by failing (and rolling back)
//! the later batch.

use chrono::NaiveDate;
use log::debug;

use daybook_engine::cell::CellValue;
use daybook_engine::sheet::{Sheet, HEADER_SNAPSHOT_ROWS};

use crate::aggregate;
use crate::config::{AggregateSpec, ColumnLayout};
use crate::error::ReconError;
use crate::model::{IdentityKey, IngestBatch, IngestReceipt, RecordKind, TransactionRecord};
use crate::store::{RecordStore, StoredSheet};

/// Ingest one batch of data rows for a (date, kind), deduplicating against
/// everything already recorded for that day.
///
/// Data-level oddities never raise: a row without a company name is skipped
/// outright (counted nowhere), numeric cells degrade to 0 on coercion
/// failure. The only input error is a malformed date string.
pub fn ingest(
    store: &mut dyn RecordStore,
    columns: &ColumnLayout,
    batch: &IngestBatch,
) -> Result<IngestReceipt, ReconError> {
    let date = parse_date(&batch.date)?;

    let mut seen = store.existing_identities(date, batch.kind)?;
    let mut records: Vec<TransactionRecord> = Vec::new();
    let mut skipped = 0usize;

    for row in &batch.rows {
        let Some(record) = map_row(date, batch.kind, columns, row, &batch.created_by) else {
            continue;
        };
        let key = IdentityKey::of(&record);
        if seen.contains(&key) {
            skipped += 1;
            continue;
        }
        seen.insert(key);
        records.push(record);
    }

    let header = (!batch.header_rows.is_empty()).then_some(batch.header_rows.as_slice());
    store.commit_batch(date, batch.kind, &records, header)?;

    let saved = records.len();
    debug!("ingest {date} {}: {saved} saved, {skipped} skipped", batch.kind);

    let mut message = format!("saved {saved} {} record(s) for {date}", batch.kind);
    if skipped > 0 {
        message.push_str(&format!(" ({skipped} duplicate(s) skipped)"));
    }

    Ok(IngestReceipt {
        date,
        kind: batch.kind,
        saved,
        skipped,
        message,
    })
}

/// Map one data row to a record. None when the company cell is empty;
/// such rows are invisible to both counters.
fn map_row(
    date: NaiveDate,
    kind: RecordKind,
    columns: &ColumnLayout,
    row: &[CellValue],
    created_by: &str,
) -> Option<TransactionRecord> {
    let company = cell_text(row, columns.company)?;

    let unit_price = cell_number(row, columns.unit_price);
    let quantity = cell_number(row, columns.quantity) as i64;

    // Payments report the amount in their own column when present;
    // re-orders always derive it from price and quantity.
    let amount = match kind {
        RecordKind::Payment => row
            .get(columns.amount)
            .and_then(CellValue::coerce_number)
            .unwrap_or_else(|| unit_price * quantity as f64),
        RecordKind::Reorder => unit_price * quantity as f64,
    };

    Some(TransactionRecord {
        date,
        kind,
        company,
        product_code: cell_text(row, columns.product_code),
        product_name: cell_text(row, columns.product_name),
        product_option: cell_text(row, columns.product_option),
        unit_price,
        quantity,
        amount,
        raw_row: row.to_vec(),
        created_by: created_by.to_string(),
        created_at: None,
    })
}

fn cell_text(row: &[CellValue], col: usize) -> Option<String> {
    match row.get(col) {
        Some(CellValue::Empty) | None => None,
        Some(cell) => {
            let s = cell.raw_display();
            (!s.is_empty()).then_some(s)
        }
    }
}

fn cell_number(row: &[CellValue], col: usize) -> f64 {
    row.get(col)
        .and_then(CellValue::coerce_number)
        .unwrap_or(0.0)
}

fn parse_date(value: &str) -> Result<NaiveDate, ReconError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ReconError::DateParse {
        value: value.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Full-sheet save + maintenance sweep
// ---------------------------------------------------------------------------

/// Persist a full sheet for (date, kind), recomputing aggregates first so
/// stored sheets always carry fresh sums and flags.
pub fn save_sheet(
    store: &mut dyn RecordStore,
    spec: &AggregateSpec,
    date: &str,
    kind: RecordKind,
    sheet: &mut Sheet,
    created_by: &str,
) -> Result<(), ReconError> {
    let date = parse_date(date)?;
    aggregate::recompute(sheet, spec);
    store.upsert_sheet(&StoredSheet {
        date,
        kind,
        sheet_name: sheet.name.clone(),
        rows: sheet.rows.clone(),
        total_items: sheet.row_count().saturating_sub(HEADER_SNAPSHOT_ROWS),
        created_by: created_by.to_string(),
    })
}

/// Recompute aggregates for a previously stored sheet, in place.
pub fn recompute_stored(stored: &mut StoredSheet, spec: &AggregateSpec) {
    let mut sheet = Sheet::new(stored.sheet_name.clone(), std::mem::take(&mut stored.rows));
    aggregate::recompute(&mut sheet, spec);
    stored.rows = sheet.rows;
}

/// Maintenance pass: recompute sums and flags for every stored sheet and
/// write them back. Returns the number of sheets touched. This is the
/// migration path for sheets saved before a formula change; the regular
/// code paths already recompute on save.
pub fn sweep(store: &mut dyn RecordStore, spec: &AggregateSpec) -> Result<usize, ReconError> {
    let mut sheets = store.stored_sheets()?;
    for stored in &mut sheets {
        recompute_stored(stored, spec);
        store.upsert_sheet(stored)?;
    }
    Ok(sheets.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn num(n: f64) -> CellValue {
        CellValue::Number(n)
    }

    /// Standard-layout data row: company in col 0, code 4, name 5, option 6,
    /// price 7, quantity 14, amount 19.
    fn payment_row(company: &str, price: f64, qty: f64, amount: Option<f64>) -> Vec<CellValue> {
        let mut row = vec![CellValue::Empty; 20];
        row[0] = if company.is_empty() { CellValue::Empty } else { text(company) };
        row[4] = text("P1");
        row[5] = text("Widget");
        row[6] = text("Red");
        row[7] = num(price);
        row[14] = num(qty);
        if let Some(a) = amount {
            row[19] = num(a);
        }
        row
    }

    #[test]
    fn row_with_empty_company_maps_to_none() {
        let columns = ColumnLayout::default();
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let row = payment_row("", 10.0, 5.0, None);
        assert!(map_row(date, RecordKind::Payment, &columns, &row, "op").is_none());
    }

    #[test]
    fn payment_amount_from_amount_column() {
        let columns = ColumnLayout::default();
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let row = payment_row("Acme", 10.0, 5.0, Some(47.0));
        let rec = map_row(date, RecordKind::Payment, &columns, &row, "op").unwrap();
        assert_eq!(rec.amount, 47.0);
    }

    #[test]
    fn payment_amount_falls_back_to_price_times_qty() {
        let columns = ColumnLayout::default();
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let row = payment_row("Acme", 10.0, 5.0, None);
        let rec = map_row(date, RecordKind::Payment, &columns, &row, "op").unwrap();
        assert_eq!(rec.amount, 50.0);
    }

    #[test]
    fn reorder_amount_always_computed() {
        let columns = ColumnLayout::default();
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        // amount column present but ignored for re-orders
        let row = payment_row("Acme", 8.0, 3.0, Some(999.0));
        let rec = map_row(date, RecordKind::Reorder, &columns, &row, "op").unwrap();
        assert_eq!(rec.amount, 24.0);
    }

    #[test]
    fn coercion_failures_degrade_to_zero() {
        let columns = ColumnLayout::default();
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let mut row = payment_row("Acme", 0.0, 0.0, None);
        row[7] = text("free");
        row[14] = text("many");
        let rec = map_row(date, RecordKind::Payment, &columns, &row, "op").unwrap();
        assert_eq!(rec.unit_price, 0.0);
        assert_eq!(rec.quantity, 0);
        assert_eq!(rec.amount, 0.0);
    }

    #[test]
    fn malformed_date_is_rejected() {
        assert!(parse_date("01/05/2024").is_err());
        assert!(parse_date("").is_err());
        assert!(parse_date("2024-01-05").is_ok());
    }

    #[test]
    fn numeric_company_cell_reads_as_text() {
        let columns = ColumnLayout::default();
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let mut row = payment_row("x", 1.0, 1.0, None);
        row[0] = num(1234.0);
        let rec = map_row(date, RecordKind::Payment, &columns, &row, "op").unwrap();
        assert_eq!(rec.company, "1234");
    }
}
