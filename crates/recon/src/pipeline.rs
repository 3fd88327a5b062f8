//! Ingestion orchestrator: load → normalize → classify → recompute → cache.

use std::path::Path;

use chrono::Utc;
use log::{debug, warn};

use daybook_engine::cell::CellValue;
use daybook_engine::dates;
use daybook_engine::sheet::{Sheet, DATA_START};

use crate::aggregate;
use crate::cache::{CacheKey, SheetCache};
use crate::classify::classify;
use crate::config::IngestConfig;
use crate::model::{LoadOutcome, LoadedSheet, SheetMeta};

/// One sheet exactly as the reader produced it: raw typed cells, no
/// normalization applied yet.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

#[derive(Debug, Clone)]
pub struct RawWorkbook {
    pub sheets: Vec<RawSheet>,
    /// True sheet count, even when fewer were materialized.
    pub total_sheets: usize,
}

/// Spreadsheet-reading capability. Implementations materialize at most
/// `max_sheets` sheets but always report the workbook's true sheet count.
pub trait WorkbookSource {
    fn load(&self, path: &Path, max_sheets: usize) -> Result<RawWorkbook, String>;
}

/// Drives the ingestion pipeline and owns the loaded-sheet cache.
pub struct Ingestor {
    config: IngestConfig,
    cache: SheetCache,
}

impl Ingestor {
    pub fn new(config: IngestConfig) -> Self {
        let cache = SheetCache::new(config.cache_capacity);
        Self { config, cache }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn cache(&self) -> &SheetCache {
        &self.cache
    }

    /// Load a workbook and run every sheet through the pipeline.
    ///
    /// Reader failures come back as a structured `LoadOutcome` with
    /// `success = false`, never as an Err. `display_name` is the
    /// user-facing filename (uploads usually arrive via a temp path).
    pub fn load_workbook(
        &mut self,
        source: &dyn WorkbookSource,
        path: &Path,
        display_name: &str,
    ) -> LoadOutcome {
        let raw = match source.load(path, self.config.max_sheets) {
            Ok(raw) => raw,
            Err(error) => return LoadOutcome::failure(error),
        };

        let file_stem = Path::new(display_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| display_name.to_string());

        if raw.total_sheets > self.config.max_sheets {
            debug!(
                "loading {} of {} sheets from {display_name}",
                self.config.max_sheets, raw.total_sheets
            );
        }

        let total_sheets = raw.total_sheets;
        let mut sheets = Vec::new();
        for raw_sheet in raw.sheets.into_iter().take(self.config.max_sheets) {
            let loaded = self.prepare_sheet(display_name, raw_sheet);
            self.cache.insert(
                CacheKey {
                    file_stem: file_stem.clone(),
                    sheet_name: loaded.meta.sheet_name.clone(),
                },
                loaded.clone(),
            );
            sheets.push(loaded);
        }

        LoadOutcome {
            success: true,
            sheets,
            total_sheets,
            error: None,
        }
    }

    /// Normalize every cell, convert the payment-date column, classify,
    /// recompute aggregates, stamp metadata.
    fn prepare_sheet(&self, display_name: &str, raw: RawSheet) -> LoadedSheet {
        let date_col = self.config.payment_date_column;
        let rows: Vec<Vec<CellValue>> = raw
            .rows
            .into_iter()
            .enumerate()
            .map(|(row_idx, row)| {
                row.into_iter()
                    .enumerate()
                    .map(|(col_idx, cell)| {
                        let cell = cell.normalize();
                        if row_idx >= DATA_START && col_idx == date_col {
                            dates::month_day(&cell)
                        } else {
                            cell
                        }
                    })
                    .collect()
            })
            .collect();

        let mut sheet = Sheet::new(raw.name, rows);

        let classification = classify(&self.config.classify_rules, display_name, &sheet.name);
        if classification.ambiguous {
            warn!(
                "ambiguous classification for '{display_name}'/'{}', using {}",
                sheet.name, classification.kind
            );
        }

        aggregate::recompute(&mut sheet, &self.config.aggregate);

        let meta = SheetMeta {
            source_file: display_name.to_string(),
            sheet_name: sheet.name.clone(),
            kind: classification.kind,
            ambiguous: classification.ambiguous,
            rows: sheet.row_count(),
            cols: sheet.col_count(),
            loaded_at: Utc::now(),
        };

        LoadedSheet { meta, sheet }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::SheetKind;
    use daybook_engine::sheet::SUMMARY_ROW;

    struct FixedSource(Result<RawWorkbook, String>);

    impl WorkbookSource for FixedSource {
        fn load(&self, _path: &Path, _max_sheets: usize) -> Result<RawWorkbook, String> {
            self.0.clone()
        }
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn num(n: f64) -> CellValue {
        CellValue::Number(n)
    }

    fn workbook_with(rows: Vec<Vec<CellValue>>) -> RawWorkbook {
        RawWorkbook {
            sheets: vec![RawSheet {
                name: "0812".into(),
                rows,
            }],
            total_sheets: 1,
        }
    }

    fn data_row() -> Vec<CellValue> {
        let mut row = vec![CellValue::Empty; 22];
        row[0] = text("Acme");
        row[8] = num(2.0);
        row[11] = num(1.0);
        row[12] = num(1.0);
        row[13] = num(1.0);
        row[14] = num(4.0);
        row[21] = num(45000.0);
        row
    }

    #[test]
    fn reader_failure_is_structured() {
        let mut ingestor = Ingestor::new(IngestConfig::default());
        let source = FixedSource(Err("unreadable file".into()));
        let outcome = ingestor.load_workbook(&source, Path::new("x.xls"), "x.xls");
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("unreadable file"));
        assert!(outcome.sheets.is_empty());
    }

    #[test]
    fn pipeline_normalizes_classifies_and_recomputes() {
        let mut ingestor = Ingestor::new(IngestConfig::default());
        let mut rows = vec![vec![text("h")], vec![text("h")], vec![]];
        rows.push(data_row());
        let source = FixedSource(Ok(workbook_with(rows)));

        let outcome = ingestor.load_workbook(&source, Path::new("/tmp/up.tmp"), "order-0812.xlsx");
        assert!(outcome.success);
        let loaded = &outcome.sheets[0];

        assert_eq!(loaded.meta.kind, SheetKind::Order);
        // summary sum over col 8
        assert_eq!(*loaded.sheet.cell(SUMMARY_ROW, 8), num(2.0));
        // difference flag: 1+1+1 != 4
        assert_eq!(*loaded.sheet.cell(3, 15), text("difference"));
        // payment date column converted to MM/DD
        assert_eq!(*loaded.sheet.cell(3, 21), text("03/15"));
    }

    #[test]
    fn payment_date_not_touched_in_header_rows() {
        let mut ingestor = Ingestor::new(IngestConfig::default());
        let mut header = vec![CellValue::Empty; 22];
        header[21] = num(45000.0);
        let rows = vec![header, vec![], vec![], data_row()];
        let source = FixedSource(Ok(workbook_with(rows)));

        let outcome = ingestor.load_workbook(&source, Path::new("f"), "order.xlsx");
        assert_eq!(*outcome.sheets[0].sheet.cell(0, 21), num(45000.0));
    }

    #[test]
    fn sheets_past_cap_are_skipped() {
        let mut ingestor = Ingestor::new(IngestConfig::default());
        let sheets = (0..5)
            .map(|i| RawSheet {
                name: format!("s{i}"),
                rows: vec![],
            })
            .collect();
        let source = FixedSource(Ok(RawWorkbook {
            sheets,
            total_sheets: 5,
        }));

        let outcome = ingestor.load_workbook(&source, Path::new("f"), "order.xlsx");
        assert_eq!(outcome.sheets.len(), 3);
        assert_eq!(outcome.total_sheets, 5);
    }

    #[test]
    fn loaded_sheets_are_cached_by_stem_and_name() {
        let mut ingestor = Ingestor::new(IngestConfig::default());
        let source = FixedSource(Ok(workbook_with(vec![vec![], vec![], vec![], data_row()])));
        ingestor.load_workbook(&source, Path::new("/tmp/x.tmp"), "order-0812.xlsx");

        let key = CacheKey {
            file_stem: "order-0812".into(),
            sheet_name: "0812".into(),
        };
        assert!(ingestor.cache().get(&key).is_some());
    }
}
