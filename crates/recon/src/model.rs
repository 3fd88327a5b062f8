use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use daybook_engine::cell::CellValue;
use daybook_engine::sheet::Sheet;

use crate::classify::SheetKind;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Kind of transactional record accumulated per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Payment line from a receipt sheet.
    Payment,
    /// Re-order line (exchange / undelivered follow-up).
    Reorder,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Reorder => "reorder",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(Self::Payment),
            "reorder" => Ok(Self::Reorder),
            other => Err(format!("unknown record kind '{other}' (payment|reorder)")),
        }
    }
}

/// One durable payment/re-order record. Created once on first ingestion of
/// its identity for a date, never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub date: NaiveDate,
    pub kind: RecordKind,
    pub company: String,
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub product_option: Option<String>,
    pub unit_price: f64,
    pub quantity: i64,
    pub amount: f64,
    /// Full source row, preserved verbatim for display and audit.
    pub raw_row: Vec<CellValue>,
    pub created_by: String,
    /// Stamped by the store; None on a record not yet persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Composite business identity used for duplicate detection. Price and
/// amount are deliberately excluded: a re-upload with corrected pricing is
/// still the same business row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub company: String,
    pub product_code: String,
    pub product_name: String,
    pub product_option: String,
    pub quantity: i64,
}

impl IdentityKey {
    pub fn of(record: &TransactionRecord) -> Self {
        Self {
            company: record.company.clone(),
            product_code: record.product_code.clone().unwrap_or_default(),
            product_name: record.product_name.clone().unwrap_or_default(),
            product_option: record.product_option.clone().unwrap_or_default(),
            quantity: record.quantity,
        }
    }
}

// ---------------------------------------------------------------------------
// Ingest input / output
// ---------------------------------------------------------------------------

/// One upload of data rows for a given day and record kind.
///
/// `rows` must exclude the four header/summary rows of the source sheet;
/// those travel separately in `header_rows` and land in the per-(date, kind)
/// header snapshot slot.
#[derive(Debug, Clone)]
pub struct IngestBatch {
    /// YYYY-MM-DD.
    pub date: String,
    pub kind: RecordKind,
    pub header_rows: Vec<Vec<CellValue>>,
    pub rows: Vec<Vec<CellValue>>,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReceipt {
    pub date: NaiveDate,
    pub kind: RecordKind,
    pub saved: usize,
    pub skipped: usize,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Workbook load output
// ---------------------------------------------------------------------------

/// Metadata stamped onto each loaded sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetMeta {
    pub source_file: String,
    pub sheet_name: String,
    pub kind: SheetKind,
    /// More than one classification rule matched; the recorded kind is the
    /// highest-priority hit.
    pub ambiguous: bool,
    pub rows: usize,
    pub cols: usize,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadedSheet {
    pub meta: SheetMeta,
    pub sheet: Sheet,
}

/// Structured result of a workbook load. Reader failures land in `error`;
/// the orchestrator never propagates them as faults.
#[derive(Debug, Serialize)]
pub struct LoadOutcome {
    pub success: bool,
    pub sheets: Vec<LoadedSheet>,
    /// True sheet count of the workbook, including sheets past the load cap.
    pub total_sheets: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoadOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            sheets: Vec::new(),
            total_sheets: 0,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(company: &str, price: f64, qty: i64) -> TransactionRecord {
        TransactionRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            kind: RecordKind::Payment,
            company: company.to_string(),
            product_code: Some("P1".into()),
            product_name: Some("Widget".into()),
            product_option: Some("Red".into()),
            unit_price: price,
            quantity: qty,
            amount: price * qty as f64,
            raw_row: Vec::new(),
            created_by: "tester".into(),
            created_at: None,
        }
    }

    #[test]
    fn identity_ignores_price_and_amount() {
        let a = IdentityKey::of(&record("Acme", 10.0, 5));
        let b = IdentityKey::of(&record("Acme", 99.0, 5));
        assert_eq!(a, b);
    }

    #[test]
    fn identity_distinguishes_quantity() {
        let a = IdentityKey::of(&record("Acme", 10.0, 5));
        let b = IdentityKey::of(&record("Acme", 10.0, 6));
        assert_ne!(a, b);
    }

    #[test]
    fn missing_product_fields_default_to_empty() {
        let mut r = record("Acme", 10.0, 5);
        r.product_code = None;
        r.product_option = None;
        let key = IdentityKey::of(&r);
        assert_eq!(key.product_code, "");
        assert_eq!(key.product_option, "");
    }

    #[test]
    fn record_kind_round_trips() {
        assert_eq!("payment".parse::<RecordKind>().unwrap(), RecordKind::Payment);
        assert_eq!("reorder".parse::<RecordKind>().unwrap(), RecordKind::Reorder);
        assert!("other".parse::<RecordKind>().is_err());
    }
}
