// src/normalize/table.rs
//! Minimal HTML table reader for filing documents.
//!
//! Produces a rectangular grid of cleaned cell texts with `rowspan`/`colspan`
//! expanded, so a metric name spanning two rows appears on both.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::text::clean_html;

static RE_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table>").expect("table regex"));
static RE_TR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("tr regex"));
static RE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<t([dh])\b([^>]*)>(.*?)</t[dh]>").expect("cell regex"));
static RE_ROWSPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)rowspan\s*=\s*["']?(\d+)"#).expect("rowspan regex"));
static RE_COLSPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)colspan\s*=\s*["']?(\d+)"#).expect("colspan regex"));

const MAX_SPAN: usize = 64;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(String::is_empty))
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.rows.iter().flatten().any(|c| c.contains(needle))
    }
}

fn span(attrs: &str, re: &Regex) -> usize {
    re.captures(attrs)
        .and_then(|c| c[1].parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_SPAN)
}

/// Tables in document order. Nesting is not supported: a table ends at the
/// first `</table>` after it opens.
pub fn read_tables(html: &str) -> Vec<Table> {
    RE_TABLE
        .captures_iter(html)
        .map(|c| parse_table(c.get(1).map(|m| m.as_str()).unwrap_or_default()))
        .filter(|t| !t.is_empty())
        .collect()
}

fn parse_table(inner: &str) -> Table {
    // (remaining rows, text) per column carried down by rowspan
    let mut carry: Vec<Option<(usize, String)>> = Vec::new();
    let mut rows = Vec::new();

    for tr in RE_TR.captures_iter(inner) {
        let mut row: Vec<String> = Vec::new();
        let mut col = 0usize;
        let mut cells = RE_CELL.captures_iter(&tr[1]);

        loop {
            // fill columns still covered by a rowspan from above
            while let Some(Some((left, text))) = carry.get_mut(col) {
                row.push(text.clone());
                *left -= 1;
                if *left == 0 {
                    carry[col] = None;
                }
                col += 1;
            }
            let Some(cell) = cells.next() else {
                break;
            };
            let attrs = &cell[2];
            let text = clean_html(&cell[3]);
            let rs = span(attrs, &RE_ROWSPAN);
            let cs = span(attrs, &RE_COLSPAN);
            for _ in 0..cs {
                if carry.len() <= col {
                    carry.resize(col + 1, None);
                }
                if rs > 1 {
                    carry[col] = Some((rs - 1, text.clone()));
                }
                row.push(text.clone());
                col += 1;
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }
    Table { rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_are_expanded() {
        let html = r#"
<table border="1">
  <tr><td rowspan="2">매출액</td><td>당해실적</td><td>1,000</td></tr>
  <tr><td>누계실적</td><td>4,000</td></tr>
  <tr><td colspan="2">영업이익</td><td>(50)</td></tr>
</table>"#;
        let tables = read_tables(html);
        assert_eq!(tables.len(), 1);
        let t = &tables[0];
        assert_eq!(t.rows[0], ["매출액", "당해실적", "1,000"]);
        assert_eq!(t.rows[1], ["매출액", "누계실적", "4,000"]);
        assert_eq!(t.rows[2], ["영업이익", "영업이익", "(50)"]);
        assert_eq!((t.height(), t.width()), (3, 3));
        assert!(t.contains("누계"));
    }

    #[test]
    fn header_cells_count_as_cells() {
        let html = "<table><tr><th>구분</th><th>당기</th></tr><tr><td>a</td><td>1</td></tr></table>";
        let t = &read_tables(html)[0];
        assert_eq!(t.rows[0], ["구분", "당기"]);
    }

    #[test]
    fn empty_tables_are_dropped() {
        assert!(read_tables("<table><tr><td> </td></tr></table>").is_empty());
    }
}
