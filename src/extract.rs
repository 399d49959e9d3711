// src/extract.rs

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

static TABLE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("selector should parse"));
static TR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("selector should parse"));

// `_` joins header levels, so `\b` would miss "S No_S No".
static SERIAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])(s\.?\s*no|sr\.?\s*no|serial\s+no)(?:$|[^a-z0-9])")
        .expect("valid regex")
});
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("valid regex")
});

/// Span attributes beyond this are treated as malformed.
const MAX_SPAN: usize = 1000;

#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// A parsed table. Never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct RawTableCandidate {
    pub columns: Vec<String>,
    pub kinds: Vec<ColumnKind>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTableCandidate {
    /// Build from flattened labels and raw cell texts.
    pub fn from_text_rows(columns: Vec<String>, text_rows: Vec<Vec<String>>) -> Self {
        let width = text_rows
            .iter()
            .map(|r| r.len())
            .max()
            .unwrap_or(0)
            .max(columns.len());
        let mut columns = columns;
        for i in columns.len()..width {
            columns.push(i.to_string());
        }
        let rows: Vec<Vec<Cell>> = text_rows
            .into_iter()
            .map(|r| {
                let mut cells: Vec<Cell> = r.iter().map(|t| coerce_cell(t)).collect();
                cells.resize(width, Cell::Empty);
                cells
            })
            .filter(|r| r.iter().any(|c| *c != Cell::Empty))
            .collect();
        let kinds = (0..width)
            .map(|c| {
                let mut saw_number = false;
                for row in &rows {
                    match &row[c] {
                        Cell::Number(_) => saw_number = true,
                        Cell::Text(_) => return ColumnKind::Text,
                        Cell::Empty => {}
                    }
                }
                if saw_number {
                    ColumnKind::Numeric
                } else {
                    ColumnKind::Text
                }
            })
            .collect();
        Self {
            columns,
            kinds,
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn has_serial_column(&self) -> bool {
        self.columns.iter().any(|c| is_serial_label(c))
    }
}

pub fn is_serial_label(label: &str) -> bool {
    SERIAL_RE.is_match(label)
}

/// Strip thousands separators and parse; anything else stays text.
pub fn coerce_cell(raw: &str) -> Cell {
    let t = raw.trim();
    if t.is_empty() {
        return Cell::Empty;
    }
    let stripped: String = t.chars().filter(|c| *c != ',').collect();
    if NUMBER_RE.is_match(&stripped) {
        if let Ok(n) = stripped.parse::<f64>() {
            return Cell::Number(n);
        }
    }
    Cell::Text(t.to_string())
}

/// Picks the data table out of a rendered result fragment.
#[derive(Default)]
pub struct TableExtractor;

impl TableExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 1) a table with a serial-number column and more than one row wins
    ///    outright;
    /// 2) otherwise the largest rows × columns table with more than one row
    ///    and more than two columns.
    pub fn extract(&self, html: &str) -> Option<RawTableCandidate> {
        let doc = Html::parse_fragment(html);
        let mut best: Option<RawTableCandidate> = None;
        let mut scanned = 0usize;

        for table in doc.select(&TABLE_SEL) {
            scanned += 1;
            let cand = parse_table(table);
            if cand.has_serial_column() && cand.row_count() > 1 {
                debug!(
                    rows = cand.row_count(),
                    cols = cand.column_count(),
                    "serial-number table selected"
                );
                return Some(cand);
            }
            if cand.row_count() <= 1 || cand.column_count() <= 2 {
                continue;
            }
            let area = cand.row_count() * cand.column_count();
            let better = best
                .as_ref()
                .map_or(true, |b| area > b.row_count() * b.column_count());
            if better {
                best = Some(cand);
            }
        }
        debug!(tables = scanned, found = best.is_some(), "table scan finished");
        best
    }
}

struct RawCell {
    text: String,
    is_header: bool,
    rowspan: usize,
    colspan: usize,
}

fn span_attr(el: &ElementRef<'_>, name: &str) -> usize {
    el.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_SPAN)
}

fn cell_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Nearest enclosing `table` of a row is `table` itself.
fn owned_by(tr: &ElementRef<'_>, table: &ElementRef<'_>) -> bool {
    tr.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "table")
        .map_or(false, |a| a == *table)
}

fn in_thead(tr: &ElementRef<'_>) -> bool {
    tr.parent()
        .and_then(ElementRef::wrap)
        .map_or(false, |p| p.value().name() == "thead")
}

fn parse_table(table: ElementRef<'_>) -> RawTableCandidate {
    let mut head: Vec<Vec<RawCell>> = Vec::new();
    let mut body: Vec<Vec<RawCell>> = Vec::new();
    let mut saw_thead = false;

    let rows: Vec<(bool, Vec<RawCell>)> = table
        .select(&TR_SEL)
        .filter(|tr| owned_by(tr, &table))
        .map(|tr| {
            let cells = tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .map(|c| RawCell {
                    text: cell_text(&c),
                    is_header: c.value().name() == "th",
                    rowspan: span_attr(&c, "rowspan"),
                    colspan: span_attr(&c, "colspan"),
                })
                .collect();
            let thead = in_thead(&tr);
            saw_thead |= thead;
            (thead, cells)
        })
        .collect();

    let mut leading = true;
    for (thead, cells) in rows {
        if cells.is_empty() {
            continue;
        }
        let is_head = if saw_thead {
            thead
        } else {
            leading && cells.iter().all(|c| c.is_header)
        };
        if is_head {
            head.push(cells);
        } else {
            leading = false;
            body.push(cells);
        }
    }

    let columns = flatten_header(&expand_spans(&head));
    RawTableCandidate::from_text_rows(columns, expand_spans(&body))
}

/// Lay cells out on a grid, repeating spanned cells in every slot they cover.
fn expand_spans(rows: &[Vec<RawCell>]) -> Vec<Vec<String>> {
    let mut out: Vec<Vec<String>> = Vec::with_capacity(rows.len());
    // per column: text still spanning down, and how many more rows it covers
    let mut carry: Vec<Option<(String, usize)>> = Vec::new();

    for row in rows {
        let mut line: Vec<String> = Vec::new();
        let mut cells = row.iter();
        let mut col = 0usize;
        loop {
            if let Some((text, left)) = carry.get_mut(col).and_then(|c| c.take()) {
                line.push(text.clone());
                if left > 1 {
                    carry[col] = Some((text, left - 1));
                }
                col += 1;
                continue;
            }
            match cells.next() {
                Some(cell) => {
                    for _ in 0..cell.colspan {
                        if carry.len() <= col {
                            carry.resize(col + 1, None);
                        }
                        if cell.rowspan > 1 {
                            carry[col] = Some((cell.text.clone(), cell.rowspan - 1));
                        }
                        line.push(cell.text.clone());
                        col += 1;
                    }
                }
                None => {
                    let pending = carry.iter().skip(col).any(|c| c.is_some());
                    if !pending {
                        break;
                    }
                    line.push(String::new());
                    col += 1;
                }
            }
        }
        out.push(line);
    }
    out
}

/// Join header segments per column with `_`, skipping blanks and segments
/// repeated by a vertical span.
fn flatten_header(grid: &[Vec<String>]) -> Vec<String> {
    let width = grid.iter().map(|r| r.len()).max().unwrap_or(0);
    (0..width)
        .map(|c| {
            let mut parts: Vec<&str> = Vec::new();
            for row in grid {
                let seg = row.get(c).map(|s| s.trim()).unwrap_or("");
                if seg.is_empty() || parts.last() == Some(&seg) {
                    continue;
                }
                parts.push(seg);
            }
            if parts.is_empty() {
                c.to_string()
            } else {
                parts.join("_")
            }
        })
        .collect()
}
