// SQLite-backed record store.
//
// Implements the engine's `RecordStore` seam. The identity unique index is
// the backstop for the engine's non-atomic check-then-insert: a concurrent
// double-write fails the later transaction instead of duplicating rows.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};

use daybook_engine::cell::CellValue;
use daybook_recon::error::ReconError;
use daybook_recon::model::{IdentityKey, RecordKind, TransactionRecord};
use daybook_recon::store::{CompanyTotal, RecordStore, StoredSheet};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY,
    record_date TEXT NOT NULL,
    kind TEXT NOT NULL,
    company TEXT NOT NULL,
    product_code TEXT NOT NULL DEFAULT '',
    product_name TEXT NOT NULL DEFAULT '',
    product_option TEXT NOT NULL DEFAULT '',
    unit_price REAL NOT NULL DEFAULT 0,
    quantity INTEGER NOT NULL DEFAULT 0,
    amount REAL NOT NULL DEFAULT 0,
    raw_row TEXT NOT NULL,
    created_by TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

-- Identity columns store '' (never NULL): NULLs compare distinct in SQLite
-- unique indexes, which would defeat the dedup backstop.
CREATE UNIQUE INDEX IF NOT EXISTS idx_records_identity
    ON records (record_date, kind, company, product_code, product_name, product_option, quantity);

CREATE INDEX IF NOT EXISTS idx_records_date ON records (record_date, kind);

CREATE TABLE IF NOT EXISTS header_snapshots (
    record_date TEXT NOT NULL,
    kind TEXT NOT NULL,
    rows_json TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (record_date, kind)
);

CREATE TABLE IF NOT EXISTS company_totals (
    company TEXT PRIMARY KEY,
    record_count INTEGER NOT NULL DEFAULT 0,
    total_amount REAL NOT NULL DEFAULT 0,
    last_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS stored_sheets (
    record_date TEXT NOT NULL,
    kind TEXT NOT NULL,
    sheet_name TEXT NOT NULL,
    rows_json TEXT NOT NULL,
    total_items INTEGER NOT NULL DEFAULT 0,
    created_by TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (record_date, kind, sheet_name)
);
"#;

pub struct SqliteStore {
    conn: Connection,
}

fn storage(e: impl std::fmt::Display) -> ReconError {
    ReconError::Storage(e.to_string())
}

fn parse_kind(s: &str) -> Result<RecordKind, ReconError> {
    s.parse::<RecordKind>().map_err(ReconError::Storage)
}

fn parse_date(s: &str) -> Result<NaiveDate, ReconError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(storage)
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, ReconError> {
        let conn = Connection::open(path).map_err(storage)?;
        conn.execute_batch(SCHEMA).map_err(storage)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, ReconError> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        conn.execute_batch(SCHEMA).map_err(storage)?;
        Ok(Self { conn })
    }
}

impl RecordStore for SqliteStore {
    fn existing_identities(
        &self,
        date: NaiveDate,
        kind: RecordKind,
    ) -> Result<HashSet<IdentityKey>, ReconError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT company, product_code, product_name, product_option, quantity
                 FROM records WHERE record_date = ?1 AND kind = ?2",
            )
            .map_err(storage)?;

        let keys = stmt
            .query_map(params![date.to_string(), kind.as_str()], |row| {
                Ok(IdentityKey {
                    company: row.get(0)?,
                    product_code: row.get(1)?,
                    product_name: row.get(2)?,
                    product_option: row.get(3)?,
                    quantity: row.get(4)?,
                })
            })
            .map_err(storage)?
            .collect::<Result<HashSet<_>, _>>()
            .map_err(storage)?;

        Ok(keys)
    }

    fn commit_batch(
        &mut self,
        date: NaiveDate,
        kind: RecordKind,
        records: &[TransactionRecord],
        header_rows: Option<&[Vec<CellValue>]>,
    ) -> Result<(), ReconError> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().map_err(storage)?;

        {
            let mut insert = tx
                .prepare(
                    "INSERT INTO records
                     (record_date, kind, company, product_code, product_name, product_option,
                      unit_price, quantity, amount, raw_row, created_by, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                )
                .map_err(storage)?;

            let mut bump = tx
                .prepare(
                    "INSERT INTO company_totals (company, record_count, total_amount, last_date)
                     VALUES (?1, 1, ?2, ?3)
                     ON CONFLICT(company) DO UPDATE SET
                        record_count = record_count + 1,
                        total_amount = total_amount + excluded.total_amount,
                        last_date = max(last_date, excluded.last_date)",
                )
                .map_err(storage)?;

            for record in records {
                let raw_row = serde_json::to_string(&record.raw_row).map_err(storage)?;
                insert
                    .execute(params![
                        date.to_string(),
                        kind.as_str(),
                        record.company,
                        record.product_code.clone().unwrap_or_default(),
                        record.product_name.clone().unwrap_or_default(),
                        record.product_option.clone().unwrap_or_default(),
                        record.unit_price,
                        record.quantity,
                        record.amount,
                        raw_row,
                        record.created_by,
                        now,
                    ])
                    .map_err(storage)?;
                bump.execute(params![record.company, record.amount, date.to_string()])
                    .map_err(storage)?;
            }

            if let Some(rows) = header_rows {
                let rows_json = serde_json::to_string(rows).map_err(storage)?;
                tx.execute(
                    "INSERT INTO header_snapshots (record_date, kind, rows_json, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(record_date, kind) DO UPDATE SET
                        rows_json = excluded.rows_json,
                        updated_at = excluded.updated_at",
                    params![date.to_string(), kind.as_str(), rows_json, now],
                )
                .map_err(storage)?;
            }
        }

        // Drop of an uncommitted transaction rolls back, so a failed insert
        // above leaves nothing behind.
        tx.commit().map_err(storage)
    }

    fn records_by_date(
        &self,
        date: NaiveDate,
        kind: RecordKind,
    ) -> Result<Vec<TransactionRecord>, ReconError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT record_date, kind, company, product_code, product_name, product_option,
                        unit_price, quantity, amount, raw_row, created_by, created_at
                 FROM records WHERE record_date = ?1 AND kind = ?2
                 ORDER BY company, id",
            )
            .map_err(storage)?;

        let raw: Vec<(String, String, String, String, String, String, f64, i64, f64, String, String, String)> = stmt
            .query_map(params![date.to_string(), kind.as_str()], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                    row.get(11)?,
                ))
            })
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;

        let mut records = Vec::with_capacity(raw.len());
        for (date_s, kind_s, company, code, name, option, unit_price, quantity, amount, raw_row, created_by, created_at) in raw {
            records.push(TransactionRecord {
                date: parse_date(&date_s)?,
                kind: parse_kind(&kind_s)?,
                company,
                product_code: (!code.is_empty()).then_some(code),
                product_name: (!name.is_empty()).then_some(name),
                product_option: (!option.is_empty()).then_some(option),
                unit_price,
                quantity,
                amount,
                raw_row: serde_json::from_str(&raw_row).map_err(storage)?,
                created_by,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .ok()
                    .map(|t| t.with_timezone(&Utc)),
            });
        }
        Ok(records)
    }

    fn distinct_dates(&self, kind: RecordKind) -> Result<Vec<NaiveDate>, ReconError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT DISTINCT record_date FROM records WHERE kind = ?1 ORDER BY record_date",
            )
            .map_err(storage)?;
        let dates: Vec<String> = stmt
            .query_map(params![kind.as_str()], |row| row.get(0))
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        dates.iter().map(|d| parse_date(d)).collect()
    }

    fn delete_kind(&mut self, kind: RecordKind) -> Result<usize, ReconError> {
        let tx = self.conn.transaction().map_err(storage)?;
        let deleted = tx
            .execute("DELETE FROM records WHERE kind = ?1", params![kind.as_str()])
            .map_err(storage)?;
        tx.execute(
            "DELETE FROM header_snapshots WHERE kind = ?1",
            params![kind.as_str()],
        )
        .map_err(storage)?;
        tx.commit().map_err(storage)?;
        Ok(deleted)
    }

    fn header_rows(
        &self,
        date: NaiveDate,
        kind: RecordKind,
    ) -> Result<Option<Vec<Vec<CellValue>>>, ReconError> {
        let mut stmt = self
            .conn
            .prepare("SELECT rows_json FROM header_snapshots WHERE record_date = ?1 AND kind = ?2")
            .map_err(storage)?;
        let mut rows = stmt
            .query_map(params![date.to_string(), kind.as_str()], |row| {
                row.get::<_, String>(0)
            })
            .map_err(storage)?;

        match rows.next() {
            Some(json) => {
                let json = json.map_err(storage)?;
                Ok(Some(serde_json::from_str(&json).map_err(storage)?))
            }
            None => Ok(None),
        }
    }

    fn company_totals(&self) -> Result<Vec<CompanyTotal>, ReconError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT company, record_count, total_amount, last_date
                 FROM company_totals ORDER BY company",
            )
            .map_err(storage)?;
        let raw: Vec<(String, i64, f64, String)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;

        raw.into_iter()
            .map(|(company, record_count, total_amount, last_date)| {
                Ok(CompanyTotal {
                    company,
                    record_count,
                    total_amount,
                    last_date: parse_date(&last_date)?,
                })
            })
            .collect()
    }

    fn upsert_sheet(&mut self, sheet: &StoredSheet) -> Result<(), ReconError> {
        let rows_json = serde_json::to_string(&sheet.rows).map_err(storage)?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO stored_sheets
                 (record_date, kind, sheet_name, rows_json, total_items, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(record_date, kind, sheet_name) DO UPDATE SET
                    rows_json = excluded.rows_json,
                    total_items = excluded.total_items,
                    updated_at = excluded.updated_at",
                params![
                    sheet.date.to_string(),
                    sheet.kind.as_str(),
                    sheet.sheet_name,
                    rows_json,
                    sheet.total_items as i64,
                    sheet.created_by,
                    now,
                ],
            )
            .map_err(storage)?;
        Ok(())
    }

    fn stored_sheets(&self) -> Result<Vec<StoredSheet>, ReconError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT record_date, kind, sheet_name, rows_json, total_items, created_by
                 FROM stored_sheets ORDER BY record_date, kind, sheet_name",
            )
            .map_err(storage)?;
        let raw: Vec<(String, String, String, String, i64, String)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;

        raw.into_iter()
            .map(|(date_s, kind_s, sheet_name, rows_json, total_items, created_by)| {
                Ok(StoredSheet {
                    date: parse_date(&date_s)?,
                    kind: parse_kind(&kind_s)?,
                    sheet_name,
                    rows: serde_json::from_str(&rows_json).map_err(storage)?,
                    total_items: total_items as usize,
                    created_by,
                })
            })
            .collect()
    }

    fn stored_sheet(
        &self,
        date: NaiveDate,
        kind: RecordKind,
        sheet_name: &str,
    ) -> Result<Option<StoredSheet>, ReconError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT rows_json, total_items, created_by
                 FROM stored_sheets
                 WHERE record_date = ?1 AND kind = ?2 AND sheet_name = ?3",
            )
            .map_err(storage)?;
        let mut rows = stmt
            .query_map(
                params![date.to_string(), kind.as_str(), sheet_name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .map_err(storage)?;

        match rows.next() {
            Some(row) => {
                let (rows_json, total_items, created_by) = row.map_err(storage)?;
                Ok(Some(StoredSheet {
                    date,
                    kind,
                    sheet_name: sheet_name.to_string(),
                    rows: serde_json::from_str(&rows_json).map_err(storage)?,
                    total_items: total_items as usize,
                    created_by,
                }))
            }
            None => Ok(None),
        }
    }
}
