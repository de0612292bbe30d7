pub mod detail;
pub mod difficulty;
pub mod listing;
pub mod units;

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("page has no {0}")]
    MissingElement(&'static str),
    #[error("unreadable trail count {0:?}")]
    BadCount(String),
}

pub(crate) static TITLED_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[title]").unwrap());

/// Visible text of an element with whitespace runs collapsed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `title` attribute of the element itself or its first titled descendant.
pub(crate) fn title_attr<'a>(el: ElementRef<'a>) -> Option<&'a str> {
    el.value()
        .attr("title")
        .or_else(|| el.select(&TITLED_SEL).find_map(|t| t.value().attr("title")))
}
