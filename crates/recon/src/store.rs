use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use daybook_engine::cell::CellValue;

use crate::error::ReconError;
use crate::model::{IdentityKey, RecordKind, TransactionRecord};

/// A full sheet persisted per (date, kind, sheet name), re-saved in place.
/// Target of the maintenance sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSheet {
    pub date: NaiveDate,
    pub kind: RecordKind,
    pub sheet_name: String,
    pub rows: Vec<Vec<CellValue>>,
    pub total_items: usize,
    pub created_by: String,
}

/// Running per-company accumulation across every ingested batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyTotal {
    pub company: String,
    pub record_count: i64,
    pub total_amount: f64,
    pub last_date: NaiveDate,
}

/// Persistence seam for the reconciliation engine.
///
/// The engine never touches a storage backend directly; any implementation
/// (SQLite in `daybook-io`, in-memory doubles in tests) must keep
/// `commit_batch` atomic: records, header snapshot and company totals land
/// together or not at all.
pub trait RecordStore {
    /// Identity tuples already recorded for (date, kind). Loaded once per
    /// ingest call, never re-queried per row.
    fn existing_identities(
        &self,
        date: NaiveDate,
        kind: RecordKind,
    ) -> Result<HashSet<IdentityKey>, ReconError>;

    /// Atomically persist a batch: insert every record, upsert the header
    /// snapshot slot for (date, kind) when one is given, bump company
    /// totals. All-or-nothing; a failure must leave no partial writes.
    fn commit_batch(
        &mut self,
        date: NaiveDate,
        kind: RecordKind,
        records: &[TransactionRecord],
        header_rows: Option<&[Vec<CellValue>]>,
    ) -> Result<(), ReconError>;

    fn records_by_date(
        &self,
        date: NaiveDate,
        kind: RecordKind,
    ) -> Result<Vec<TransactionRecord>, ReconError>;

    fn distinct_dates(&self, kind: RecordKind) -> Result<Vec<NaiveDate>, ReconError>;

    /// Bulk delete of every record of a kind. Irreversible by design;
    /// returns the number of rows removed.
    fn delete_kind(&mut self, kind: RecordKind) -> Result<usize, ReconError>;

    /// Header snapshot slot for (date, kind), if one was ever saved.
    fn header_rows(
        &self,
        date: NaiveDate,
        kind: RecordKind,
    ) -> Result<Option<Vec<Vec<CellValue>>>, ReconError>;

    fn company_totals(&self) -> Result<Vec<CompanyTotal>, ReconError>;

    /// Insert or replace the stored sheet for its (date, kind, sheet name).
    fn upsert_sheet(&mut self, sheet: &StoredSheet) -> Result<(), ReconError>;

    fn stored_sheets(&self) -> Result<Vec<StoredSheet>, ReconError>;

    fn stored_sheet(
        &self,
        date: NaiveDate,
        kind: RecordKind,
        sheet_name: &str,
    ) -> Result<Option<StoredSheet>, ReconError>;
}
