//! HTML table extraction backends.
//!
//! Both backends reduce a document to the same shape: every `<table>` in
//! document order, each row an ordered list of whitespace-normalized cell
//! texts. The event extractor only ever sees that shape.

use std::fmt::Debug;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

pub type Row = Vec<String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    pub fn header(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Data rows paired with their position in the table (header is 0).
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.rows.iter().enumerate().skip(1)
    }
}

pub trait TableSource: Debug + Send + Sync {
    fn tables(&self, html: &str) -> Vec<Table>;
}

/// Which [`TableSource`] a scraper is composed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableBackend {
    #[default]
    Dom,
    Regex,
}

impl TableBackend {
    pub fn source(self) -> Arc<dyn TableSource> {
        match self {
            TableBackend::Dom => Arc::new(DomTables),
            TableBackend::Regex => Arc::new(RegexTables),
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

static SEL_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("invalid selector: table"));

/// Walks a parsed DOM. Rows belonging to nested tables are left to those
/// tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomTables;

impl DomTables {
    fn rows(table: ElementRef) -> Vec<Row> {
        let mut rows = Vec::new();
        for child in table.children().filter_map(ElementRef::wrap) {
            match child.value().name() {
                "tr" => rows.push(Self::cells(child)),
                "thead" | "tbody" | "tfoot" => rows.extend(
                    child
                        .children()
                        .filter_map(ElementRef::wrap)
                        .filter(|e| e.value().name() == "tr")
                        .map(Self::cells),
                ),
                _ => {}
            }
        }
        rows
    }

    fn cells(row: ElementRef) -> Row {
        row.children()
            .filter_map(ElementRef::wrap)
            .filter(|e| matches!(e.value().name(), "td" | "th"))
            .map(|cell| normalize_whitespace(&cell.text().collect::<String>()))
            .collect()
    }
}

impl TableSource for DomTables {
    fn tables(&self, html: &str) -> Vec<Table> {
        let document = Html::parse_document(html);
        document
            .select(&SEL_TABLE)
            .map(|table| Table {
                rows: Self::rows(table),
            })
            .collect()
    }
}

static RE_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table>").expect("invalid regex: table"));
static RE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("invalid regex: row"));
static RE_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<t([dh])\b[^>]*>(.*?)</t[dh]>").expect("invalid regex: cell")
});
static RE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("invalid regex: tag"));
static RE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("invalid regex: comment"));

/// Scans markup with regular expressions, for callers that cannot afford a
/// DOM. Nested tables are not supported: a table ends at its first
/// `</table>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexTables;

impl RegexTables {
    fn cell_text(inner: &str) -> String {
        let stripped = RE_TAG.replace_all(inner, " ");
        normalize_whitespace(&decode_entities(&stripped))
    }
}

impl TableSource for RegexTables {
    fn tables(&self, html: &str) -> Vec<Table> {
        let html = RE_COMMENT.replace_all(html, "");
        RE_TABLE
            .captures_iter(&html)
            .map(|table| Table {
                rows: RE_ROW
                    .captures_iter(&table[1])
                    .map(|row| {
                        RE_CELL
                            .captures_iter(&row[1])
                            .map(|cell| Self::cell_text(&cell[2]))
                            .collect()
                    })
                    .collect(),
            })
            .collect()
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
