use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::difficulty::difficulty_code;
use super::{element_text, title_attr, ParseError};

/// Rows the listing shows per page.
pub const ROWS_PER_PAGE: u32 = 100;

/// The listing renders the difficulty icon in this column and labels its
/// header with the trail-name text, so the header is always overwritten.
pub const DIFFICULTY_COLUMN: usize = 1;
pub const DIFFICULTY_HEADER: &str = "difficulty";

static COUNT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".trail-count").unwrap());
static TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table#trails_table").unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TH_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static TD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*").unwrap());

/// The first page of a region listing.
#[derive(Debug, Clone)]
pub struct ListingPage {
    /// Displayed total trail count for the whole region.
    pub total: u32,
    pub header: Vec<String>,
    pub rows: Vec<ListingRow>,
}

/// One trail row as displayed, plus the ordinal of its difficulty label.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    pub cells: Vec<String>,
    /// Set only when the difficulty label is a known one.
    pub difficulty: Option<u8>,
}

impl ListingPage {
    /// Parse the first listing page: count, header and rows.
    pub fn parse_first(html: &str) -> Result<Self, ParseError> {
        let doc = Html::parse_document(html);
        let table = find_table(&doc)?;
        Ok(Self {
            total: parse_total(&doc)?,
            header: parse_header(table)?,
            rows: parse_rows(table),
        })
    }
}

/// Rows of a follow-up listing page.
pub fn parse_page_rows(html: &str) -> Result<Vec<ListingRow>, ParseError> {
    let doc = Html::parse_document(html);
    Ok(parse_rows(find_table(&doc)?))
}

pub fn page_count(total: u32) -> u32 {
    total.div_ceil(ROWS_PER_PAGE)
}

fn find_table(doc: &Html) -> Result<ElementRef<'_>, ParseError> {
    doc.select(&TABLE_SEL)
        .next()
        .ok_or(ParseError::MissingElement("trails table"))
}

fn parse_total(doc: &Html) -> Result<u32, ParseError> {
    let el = doc
        .select(&COUNT_SEL)
        .next()
        .ok_or(ParseError::MissingElement("trail count"))?;
    let text = element_text(el);
    NUMBER_RE
        .find(&text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
        .ok_or(ParseError::BadCount(text))
}

fn parse_header(table: ElementRef<'_>) -> Result<Vec<String>, ParseError> {
    let row = table
        .select(&ROW_SEL)
        .find(|r| r.select(&TH_SEL).next().is_some())
        .ok_or(ParseError::MissingElement("header row"))?;

    let mut header: Vec<String> = row
        .select(&TH_SEL)
        .map(|th| canonical_header(&element_text(th)))
        .collect();
    if let Some(h) = header.get_mut(DIFFICULTY_COLUMN) {
        *h = DIFFICULTY_HEADER.to_string();
    }
    Ok(header)
}

fn canonical_header(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    match lower.as_str() {
        "trail" | "trail name" | "title" => "name".to_string(),
        _ => lower,
    }
}

fn parse_rows(table: ElementRef<'_>) -> Vec<ListingRow> {
    table
        .select(&ROW_SEL)
        .filter(|r| r.select(&TD_SEL).next().is_some())
        .map(parse_row)
        .collect()
}

/// Difficulty cells carry their label in a `title`; the mapped ordinal
/// replaces the cell text. Unmapped labels keep the displayed text and
/// leave `difficulty` unset.
fn parse_row(tr: ElementRef<'_>) -> ListingRow {
    let mut difficulty = None;
    let cells = tr
        .select(&TD_SEL)
        .enumerate()
        .map(|(i, td)| {
            if i == DIFFICULTY_COLUMN {
                if let Some(label) = title_attr(td) {
                    match difficulty_code(label) {
                        Some(code) => {
                            difficulty = Some(code);
                            return code.to_string();
                        }
                        None => debug!(label, "Unmapped difficulty label"),
                    }
                }
            }
            element_text(td)
        })
        .collect();
    ListingRow { cells, difficulty }
}
