use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sheet kinds
// ---------------------------------------------------------------------------

/// Semantic role of an uploaded sheet within the daily workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetKind {
    /// Day-A order sheet.
    Order,
    /// Day-A+1 order receipt.
    OrderReceipt,
    /// Day-A+1 receipt slip inquiry.
    ReceiptInquiry,
    /// Day-A+1 follow-up order.
    NextOrder,
}

impl SheetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::OrderReceipt => "order_receipt",
            Self::ReceiptInquiry => "receipt_inquiry",
            Self::NextOrder => "next_order",
        }
    }
}

impl std::fmt::Display for SheetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// One classification rule: any keyword hit (case-insensitive substring of
/// the filename or the sheet name) assigns `kind`. Rules are checked in
/// list order; the first hit wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRule {
    pub kind: SheetKind,
    pub keywords: Vec<String>,
}

/// Default rule list for the standard supplier workflow. Korean aliases
/// cover the supplier-side file naming, English tokens cover re-exports.
/// Order matters: "order" is a substring of "order-receipt", so the more
/// specific rules sit first.
pub fn default_rules() -> Vec<ClassifyRule> {
    vec![
        ClassifyRule {
            kind: SheetKind::ReceiptInquiry,
            keywords: vec!["receipt-inquiry".into(), "입고전표".into()],
        },
        ClassifyRule {
            kind: SheetKind::OrderReceipt,
            keywords: vec!["order-receipt".into(), "주문입고".into()],
        },
        ClassifyRule {
            kind: SheetKind::Order,
            keywords: vec!["order".into(), "주문서".into()],
        },
    ]
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Outcome of classifying one sheet. `ambiguous` is set when more than one
/// rule matched: the highest-priority rule still wins, but callers should
/// surface the ambiguity instead of trusting it silently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub kind: SheetKind,
    pub ambiguous: bool,
    /// Keyword that decided the kind; None when the digit heuristic or the
    /// default fired.
    pub matched_keyword: Option<String>,
}

/// Classify a sheet from its workbook filename and sheet name.
///
/// Keyword rules first (priority order, case-insensitive substring on both
/// names), then the digit heuristic (supplier order sheets are routinely
/// named by date, so a digit within the sheet name's first four characters
/// reads as an order sheet), then the Order default.
pub fn classify(rules: &[ClassifyRule], filename: &str, sheet_name: &str) -> Classification {
    let filename_lower = filename.to_lowercase();
    let sheet_lower = sheet_name.to_lowercase();

    let mut hits: Vec<(SheetKind, &str)> = Vec::new();
    for rule in rules {
        let matched = rule.keywords.iter().find(|kw| {
            let kw = kw.to_lowercase();
            filename_lower.contains(&kw) || sheet_lower.contains(&kw)
        });
        if let Some(kw) = matched {
            hits.push((rule.kind, kw.as_str()));
        }
    }

    if let Some(&(kind, keyword)) = hits.first() {
        return Classification {
            kind,
            ambiguous: hits.len() > 1,
            matched_keyword: Some(keyword.to_string()),
        };
    }

    if sheet_name.chars().take(4).any(|c| c.is_ascii_digit()) {
        return Classification {
            kind: SheetKind::Order,
            ambiguous: false,
            matched_keyword: None,
        };
    }

    Classification {
        kind: SheetKind::Order,
        ambiguous: false,
        matched_keyword: None,
    }
}
