//! Payment-date coercion for the designated date column.
//!
//! Supplier exports carry dates in every shape at once: spreadsheet day
//! serials, ISO timestamps, already-formatted "MM/DD" text. Everything is
//! folded to `MM/DD`; anything unrecognizable passes through untouched so a
//! bad cell never aborts an upload.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::cell::CellValue;

/// Day-serial epoch used by the 1900 date system (with the off-by-two
/// Lotus leap-year quirk already folded in).
fn serial_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Day-count serial → "MM/DD". Fractional days carry time-of-day and are
/// kept below the day boundary.
pub fn serial_to_month_day(serial: f64) -> Option<String> {
    if !serial.is_finite() {
        return None;
    }
    let seconds = (serial * 86_400.0) as i64;
    let stamp = serial_epoch().checked_add_signed(Duration::seconds(seconds))?;
    Some(stamp.format("%m/%d").to_string())
}

fn iso_to_month_day(text: &str) -> Option<String> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.format("%m/%d").to_string());
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(text, pattern) {
            return Some(stamp.format("%m/%d").to_string());
        }
    }
    None
}

/// Best-effort `MM/DD` for a payment-date cell.
///
/// Tried in order: numeric day serial; ISO-8601 text (contains 'T');
/// already-slashed text (first two segments verbatim); numeric re-parse of
/// text. On total failure the original cell is returned unchanged; this
/// function has no error path.
pub fn month_day(cell: &CellValue) -> CellValue {
    match cell {
        CellValue::Number(n) => match serial_to_month_day(*n) {
            Some(s) => CellValue::Text(s),
            None => cell.clone(),
        },
        CellValue::Text(s) => {
            if s.contains('T') {
                if let Some(md) = iso_to_month_day(s) {
                    return CellValue::Text(md);
                }
                return cell.clone();
            }
            if s.contains('/') {
                let parts: Vec<&str> = s.split('/').collect();
                if parts.len() >= 2 {
                    return CellValue::Text(format!("{}/{}", parts[0], parts[1]));
                }
                return cell.clone();
            }
            match s.trim().parse::<f64>().ok().and_then(serial_to_month_day) {
                Some(md) => CellValue::Text(md),
                None => cell.clone(),
            }
        }
        CellValue::Empty => CellValue::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_45000_is_march_15() {
        // 1899-12-30 + 45000 days = 2023-03-15
        assert_eq!(serial_to_month_day(45000.0).as_deref(), Some("03/15"));
    }

    #[test]
    fn serial_fraction_stays_same_day() {
        assert_eq!(serial_to_month_day(45000.75).as_deref(), Some("03/15"));
    }

    #[test]
    fn iso_text_with_t() {
        let cell = CellValue::Text("2025-08-12T00:00:00".into());
        assert_eq!(month_day(&cell), CellValue::Text("08/12".into()));
    }

    #[test]
    fn iso_text_with_zulu_suffix() {
        let cell = CellValue::Text("2025-08-12T09:30:00Z".into());
        assert_eq!(month_day(&cell), CellValue::Text("08/12".into()));
    }

    #[test]
    fn slashed_text_keeps_first_two_segments() {
        let cell = CellValue::Text("08/12/2025".into());
        assert_eq!(month_day(&cell), CellValue::Text("08/12".into()));
        let short = CellValue::Text("08/12".into());
        assert_eq!(month_day(&short), CellValue::Text("08/12".into()));
    }

    #[test]
    fn numeric_text_reparsed_as_serial() {
        let cell = CellValue::Text("45000".into());
        assert_eq!(month_day(&cell), CellValue::Text("03/15".into()));
    }

    #[test]
    fn unparseable_text_passes_through() {
        let cell = CellValue::Text("next week".into());
        assert_eq!(month_day(&cell), cell);
    }

    #[test]
    fn numeric_cell_converted() {
        let cell = CellValue::Number(45000.0);
        assert_eq!(month_day(&cell), CellValue::Text("03/15".into()));
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(month_day(&CellValue::Empty), CellValue::Empty);
    }
}
