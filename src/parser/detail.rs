use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::difficulty::difficulty_code;
use super::units::to_feet;
use super::{element_text, ParseError, TITLED_SEL};
use crate::trail::TrailRecord;

static NAME_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static STAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(distance|climb|descent)\s*:\s*(\d[\d.,]*\s*[a-z]+)").unwrap()
});

/// Parse a single trail page into a record.
///
/// Stats come from `Label: value` pairs in the page text; each label binds to
/// the field of the same name and the first occurrence wins.
pub fn parse_trail(html: &str) -> Result<TrailRecord, ParseError> {
    let doc = Html::parse_document(html);

    let name = doc
        .select(&NAME_SEL)
        .map(element_text)
        .find(|t| !t.is_empty())
        .ok_or(ParseError::MissingElement("trail name"))?;

    let difficulty = doc
        .select(&TITLED_SEL)
        .filter_map(|el| el.value().attr("title"))
        .find_map(difficulty_code);

    let text = element_text(doc.root_element());
    let mut distance_ft = None;
    let mut climb_ft = None;
    let mut descent_ft = None;
    for caps in STAT_RE.captures_iter(&text) {
        let slot = match caps[1].to_lowercase().as_str() {
            "distance" => &mut distance_ft,
            "climb" => &mut climb_ft,
            _ => &mut descent_ft,
        };
        if slot.is_none() {
            *slot = to_feet(&caps[2]);
        }
    }

    Ok(TrailRecord {
        name,
        difficulty,
        distance_ft,
        climb_ft,
        descent_ft,
        extras: Vec::new(),
    })
}
