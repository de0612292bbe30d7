pub const DEFAULT_BASE_URL: &str = "https://www.trailforks.com";

/// Region name as it appears in site paths and cache filenames.
pub fn region_slug(region: &str) -> String {
    region
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

pub fn listing_url(base: &str, region: &str) -> String {
    format!("{}/region/{}/trails/", base.trim_end_matches('/'), region_slug(region))
}

/// Page 1 is the bare listing URL; later pages add `?page=N`.
pub fn page_url(listing: &str, page: u32) -> String {
    if page <= 1 {
        listing.to_string()
    } else {
        format!("{}?page={}", listing, page)
    }
}

/// Accepts either a trail slug or a full trail URL.
pub fn trail_url(base: &str, slug_or_url: &str) -> String {
    if slug_or_url.starts_with("http://") || slug_or_url.starts_with("https://") {
        slug_or_url.to_string()
    } else {
        format!(
            "{}/trails/{}/",
            base.trim_end_matches('/'),
            slug_or_url.trim_matches('/')
        )
    }
}
