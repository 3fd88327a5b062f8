// HTML table reader for legacy spreadsheet exports.
//
// Some supplier back offices export an HTML <table> under a .xls extension.
// The table is a plain dump (one <tr> per row, <td>/<th> per cell), so a
// tolerant regex scan is enough; these files are not well-formed XML and a
// strict parser chokes on them.

use std::path::Path;

use regex::Regex;

use daybook_engine::cell::CellValue;
use daybook_recon::pipeline::{RawSheet, RawWorkbook};

/// Read an HTML-masquerading workbook as a single sheet named "Sheet1"
/// (these exports never carry more than one table worth of data).
pub fn read_table(path: &Path) -> Result<RawWorkbook, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let text = decode(&bytes);
    let rows = parse_rows(&text)?;

    Ok(RawWorkbook {
        sheets: vec![RawSheet {
            name: "Sheet1".to_string(),
            rows,
        }],
        total_sheets: 1,
    })
}

/// Decode with the declared charset when one is present, otherwise UTF-8
/// with an EUC-KR fallback (the common legacy encoding for these exports).
fn decode(bytes: &[u8]) -> String {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]).to_lowercase();
    if head.contains("charset=euc-kr") || head.contains("charset=ks_c_5601") {
        let (decoded, _, _) = encoding_rs::EUC_KR.decode(bytes);
        return decoded.into_owned();
    }

    let (decoded, _, had_errors) = encoding_rs::UTF_8.decode(bytes);
    if !had_errors {
        return decoded.into_owned();
    }
    let (decoded, _, _) = encoding_rs::EUC_KR.decode(bytes);
    decoded.into_owned()
}

fn parse_rows(html: &str) -> Result<Vec<Vec<CellValue>>, String> {
    let row_re = Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").map_err(|e| e.to_string())?;
    let cell_re = Regex::new(r"(?is)<t[dh][^>]*>(.*?)</t[dh]\s*>").map_err(|e| e.to_string())?;
    let tag_re = Regex::new(r"(?s)<[^>]*>").map_err(|e| e.to_string())?;

    let mut rows = Vec::new();
    for row_match in row_re.captures_iter(html) {
        let row_html = &row_match[1];
        let mut row = Vec::new();
        for cell_match in cell_re.captures_iter(row_html) {
            let inner = tag_re.replace_all(&cell_match[1], "");
            row.push(cell_value(&unescape(&inner)));
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err("no table rows found in HTML workbook".to_string());
    }
    Ok(rows)
}

/// Re-type a cell the way a spreadsheet reader would: numeric-looking text
/// (thousands separators included) becomes a number.
fn cell_value(text: &str) -> CellValue {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    let candidate = if trimmed.contains(',') && trimmed.chars().all(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-' | '+')) {
        trimmed.replace(',', "")
    } else {
        trimmed.to_string()
    };
    match candidate.parse::<f64>() {
        Ok(n) => CellValue::Number(n),
        Err(_) => CellValue::Text(trimmed.to_string()),
    }
}

fn unescape(text: &str) -> String {
    let mut out = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    // numeric character references
    while let Some(start) = out.find("&#") {
        let Some(end) = out[start..].find(';').map(|i| start + i) else {
            break;
        };
        let replacement = out[start + 2..end]
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default();
        out.replace_range(start..=end, &replacement);
    }
    // ampersand last so freed entities don't re-trigger
    out.replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"<html><head><meta charset="utf-8"></head><body>
<table>
  <tr><th>company</th><th>amount</th></tr>
  <tr><td>Acme</td><td>1,250</td></tr>
  <tr><td><span>Beta&nbsp;Corp</span></td><td>42.5</td></tr>
  <tr><td></td><td>&#65;</td></tr>
</table>
</body></html>"#;

    #[test]
    fn parses_rows_and_retypes_numbers() {
        let rows = parse_rows(SAMPLE).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][0], CellValue::Text("company".into()));
        assert_eq!(rows[1][1], CellValue::Number(1250.0));
        assert_eq!(rows[2][0], CellValue::Text("Beta Corp".into()));
        assert_eq!(rows[2][1], CellValue::Number(42.5));
        assert_eq!(rows[3][0], CellValue::Empty);
        assert_eq!(rows[3][1], CellValue::Text("A".into()));
    }

    #[test]
    fn no_table_is_an_error() {
        assert!(parse_rows("<html><body>nothing here</body></html>").is_err());
    }

    #[test]
    fn read_table_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.xls");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(SAMPLE.as_bytes()).unwrap();

        let workbook = read_table(&path).unwrap();
        assert_eq!(workbook.total_sheets, 1);
        assert_eq!(workbook.sheets[0].name, "Sheet1");
        assert_eq!(workbook.sheets[0].rows.len(), 4);
    }

    #[test]
    fn euc_kr_charset_is_honored() {
        // "주문" in EUC-KR
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"<html><meta charset=euc-kr><table><tr><td>");
        bytes.extend_from_slice(&[0xC1, 0xD6, 0xB9, 0xAE]);
        bytes.extend_from_slice(b"</td></tr></table></html>");

        let text = decode(&bytes);
        let rows = parse_rows(&text).unwrap();
        assert_eq!(rows[0][0], CellValue::Text("주문".into()));
    }

    #[test]
    fn ampersand_entity_decoded_once() {
        assert_eq!(unescape("A &amp; B"), "A & B");
        assert_eq!(unescape("&amp;nbsp;"), "&nbsp;");
    }
}
