use serde::Deserialize;

use crate::classify::{default_rules, ClassifyRule};
use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything the ingestion pipeline needs to know about the sheet layout.
///
/// Defaults encode the standard supplier order template; a TOML file can
/// override any section for suppliers with shifted columns.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Upload size bound: sheets past this index are ignored.
    pub max_sheets: usize,
    /// Column holding the payment date, converted to MM/DD on load.
    pub payment_date_column: usize,
    /// Loaded-sheet cache capacity (LRU by load timestamp).
    pub cache_capacity: usize,
    pub columns: ColumnLayout,
    pub aggregate: AggregateSpec,
    pub classify_rules: Vec<ClassifyRule>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_sheets: 3,
            payment_date_column: 21,
            cache_capacity: 32,
            columns: ColumnLayout::default(),
            aggregate: AggregateSpec::default(),
            classify_rules: default_rules(),
        }
    }
}

impl IngestConfig {
    pub fn from_toml(text: &str) -> Result<Self, ReconError> {
        let config: IngestConfig =
            toml::from_str(text).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.max_sheets == 0 {
            return Err(ReconError::ConfigValidation("max_sheets must be >= 1".into()));
        }
        if self.cache_capacity == 0 {
            return Err(ReconError::ConfigValidation(
                "cache_capacity must be >= 1".into(),
            ));
        }
        if self.classify_rules.is_empty() {
            return Err(ReconError::ConfigValidation(
                "classify_rules must not be empty".into(),
            ));
        }
        if self.classify_rules.iter().any(|r| r.keywords.is_empty()) {
            return Err(ReconError::ConfigValidation(
                "every classify rule needs at least one keyword".into(),
            ));
        }
        self.aggregate.validate()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Record column layout
// ---------------------------------------------------------------------------

/// Column indices the record mapper reads from a data row.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    pub company: usize,
    pub product_code: usize,
    pub product_name: usize,
    pub product_option: usize,
    pub unit_price: usize,
    pub quantity: usize,
    pub amount: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            company: 0,
            product_code: 4,
            product_name: 5,
            product_option: 6,
            unit_price: 7,
            quantity: 14,
            amount: 19,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate spec
// ---------------------------------------------------------------------------

/// Which columns the summary row sums, and how the per-row difference flag
/// is derived: `flag = "difference" if part0+part1+part2 != reported`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregateSpec {
    pub sum_columns: Vec<usize>,
    pub part_columns: [usize; 3],
    pub reported_column: usize,
    pub flag_column: usize,
    /// Rows narrower than this are left without a flag.
    pub min_flag_width: usize,
}

impl Default for AggregateSpec {
    fn default() -> Self {
        Self {
            sum_columns: vec![8, 9, 10, 11, 12, 13, 14, 18, 19, 20],
            part_columns: [11, 12, 13],
            reported_column: 14,
            flag_column: 15,
            min_flag_width: 16,
        }
    }
}

impl AggregateSpec {
    pub fn validate(&self) -> Result<(), ReconError> {
        if self.sum_columns.is_empty() {
            return Err(ReconError::ConfigValidation(
                "aggregate.sum_columns must not be empty".into(),
            ));
        }
        if self.min_flag_width <= self.flag_column {
            return Err(ReconError::ConfigValidation(format!(
                "aggregate.min_flag_width ({}) must exceed flag_column ({})",
                self.min_flag_width, self.flag_column
            )));
        }
        Ok(())
    }
}
