use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::fetch::Fetch;
use crate::parser::detail::parse_trail;
use crate::parser::listing::{page_count, parse_page_rows, ListingPage, ListingRow};
use crate::parser::units::to_feet;
use crate::trail::{RegionDataset, TrailRecord, METRIC_COLUMNS};
use crate::urls::{listing_url, page_url, trail_url};

pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(5);

/// Listing columns that say nothing about the trail itself.
pub const DROPPED_COLUMNS: &[&str] = &[
    "",
    "rating",
    "status",
    "condition",
    "last report",
    "activity",
    "faved",
    "ridden",
    "ride log",
    "photos",
    "videos",
];

/// Builds region datasets from the listing pages, serving the cache when it can.
pub struct RegionBuilder<F> {
    fetcher: F,
    cache: Cache,
    base_url: String,
    page_delay: Duration,
    refresh: bool,
}

impl<F: Fetch> RegionBuilder<F> {
    pub fn new(fetcher: F, cache: Cache, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            cache,
            base_url: base_url.into(),
            page_delay: DEFAULT_PAGE_DELAY,
            refresh: false,
        }
    }

    pub fn page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Skip the cache read; the entry is still rewritten after scraping.
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Cached dataset for `region`, or a fresh scrape that is then cached.
    pub async fn build(&self, region: &str) -> Result<RegionDataset> {
        let source = listing_url(&self.base_url, region);

        if !self.refresh {
            if let Some(dataset) = self.cache.lookup(region, &source)? {
                info!(region, trails = dataset.len(), "Loaded region from cache");
                return Ok(dataset);
            }
        }

        let dataset = self.scrape(region, &source).await?;
        self.cache
            .store(&dataset, &source)
            .with_context(|| format!("Failed to cache region {region}"))?;
        Ok(dataset)
    }

    /// Walk every listing page of the region. Nothing is kept if a page fails.
    async fn scrape(&self, region: &str, source: &str) -> Result<RegionDataset> {
        let first_url = page_url(source, 1);
        let html = self.fetcher.fetch(&first_url).await?;
        let ListingPage {
            total,
            header,
            mut rows,
        } = ListingPage::parse_first(&html).with_context(|| format!("Failed to parse {first_url}"))?;

        let pages = page_count(total);
        info!(region, total, pages, "Scraping region listing");

        let pb = ProgressBar::new(pages.max(1) as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} page {pos}/{len}")?
                .progress_chars("=> "),
        );
        pb.inc(1);

        for page in 2..=pages {
            tokio::time::sleep(self.page_delay).await;
            let url = page_url(source, page);
            let html = self.fetcher.fetch(&url).await?;
            let page_rows = parse_page_rows(&html).with_context(|| format!("Failed to parse {url}"))?;
            debug!(page, rows = page_rows.len(), "Parsed listing page");
            rows.extend(page_rows);
            pb.inc(1);
        }
        pb.finish_and_clear();

        if rows.len() != total as usize {
            warn!(region, total, scraped = rows.len(), "Row count differs from displayed total");
        }
        Ok(into_dataset(region, &header, rows))
    }

    /// Fetch and parse a single trail page.
    pub async fn trail(&self, slug_or_url: &str) -> Result<TrailRecord> {
        let url = trail_url(&self.base_url, slug_or_url);
        let html = self.fetcher.fetch(&url).await?;
        parse_trail(&html).with_context(|| format!("Failed to parse {url}"))
    }
}

/// Drop irrelevant columns, normalize lengths to feet and type each row.
pub fn into_dataset(region: &str, header: &[String], rows: Vec<ListingRow>) -> RegionDataset {
    let col = |name: &str| header.iter().position(|h| h == name);
    let name_col = col("name").unwrap_or(0);
    let distance_col = col("distance");
    let descent_col = col("descent");
    let climb_col = col("climb");

    let extra_idx: Vec<usize> = header
        .iter()
        .enumerate()
        .filter(|(_, h)| {
            !METRIC_COLUMNS.contains(&h.as_str()) && !DROPPED_COLUMNS.contains(&h.as_str())
        })
        .map(|(i, _)| i)
        .filter(|&i| i != name_col)
        .collect();

    let trails = rows
        .into_iter()
        .map(|ListingRow { cells, difficulty }| {
            let cell = |i: Option<usize>| i.and_then(|i| cells.get(i)).map(String::as_str).unwrap_or("");
            let feet = |i: Option<usize>| {
                let text = cell(i);
                let ft = to_feet(text);
                if ft.is_none() && !text.is_empty() {
                    debug!(text, "Unreadable length");
                }
                ft
            };
            TrailRecord {
                name: cell(Some(name_col)).to_string(),
                difficulty,
                distance_ft: feet(distance_col),
                climb_ft: feet(climb_col),
                descent_ft: feet(descent_col),
                extras: extra_idx.iter().map(|&i| cell(Some(i)).to_string()).collect(),
            }
        })
        .collect();

    RegionDataset {
        region: region.to_string(),
        extra_columns: extra_idx.iter().map(|&i| header[i].clone()).collect(),
        trails,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use crate::fetch::FetchError;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::time::Instant;

    const BASE: &str = "https://trails.test";
    const LISTING: &str = "https://trails.test/region/moab/trails/";

    /// Serves canned pages and records when each URL was requested.
    #[derive(Default)]
    struct FakeSite {
        pages: HashMap<String, String>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl FakeSite {
        fn with_region(total: u32) -> Self {
            let mut site = Self::default();
            for page in 1..=page_count(total).max(1) {
                let start = (page - 1) * 100;
                let end = (page * 100).min(total);
                site.pages
                    .insert(page_url(LISTING, page), listing_html(total, start..end));
            }
            site
        }

        fn urls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
        }

        fn times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
        }
    }

    impl Fetch for FakeSite {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push((url.to_string(), Instant::now()));
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(url.to_string()))
        }
    }

    fn listing_html(total: u32, rows: std::ops::Range<u32>) -> String {
        let mut html = format!(
            "<html><body><div class=\"trail-count\">{total} trails</div>\
             <table id=\"trails_table\"><tr><th>Trail Name</th><th>Trail Name</th>\
             <th>Rating</th><th>Distance</th><th>Descent</th><th>Climb</th><th>Riding Area</th></tr>"
        );
        for i in rows {
            html.push_str(&format!(
                "<tr><td>Trail {i}</td><td><span title=\"Easy / Green Circle\"></span></td>\
                 <td>4.0</td><td>{i} ft</td><td>1,{i:03} ft</td><td>0.5 miles</td><td>Area {i}</td></tr>"
            ));
        }
        html.push_str("</table></body></html>");
        html
    }

    fn builder<'a>(site: &'a FakeSite, dir: &TempDir) -> RegionBuilder<&'a FakeSite> {
        RegionBuilder::new(site, Cache::new(dir.path(), CachePolicy::Trust), BASE)
    }

    #[tokio::test(start_paused = true)]
    async fn two_pages_with_pause_between() {
        let site = FakeSite::with_region(150);
        let dir = TempDir::new().unwrap();

        let dataset = builder(&site, &dir).build("Moab").await.unwrap();

        assert_eq!(dataset.len(), 150);
        assert_eq!(site.urls(), vec![LISTING.to_string(), format!("{LISTING}?page=2")]);
        let times = site.times();
        assert!(times[1] - times[0] >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn page_count_drives_fetches() {
        let site = FakeSite::with_region(250);
        let dir = TempDir::new().unwrap();

        let dataset = builder(&site, &dir).build("moab").await.unwrap();

        assert_eq!(dataset.len(), 250);
        assert_eq!(site.urls().len(), 3);
        assert_eq!(site.urls()[2], format!("{LISTING}?page=3"));
    }

    #[tokio::test(start_paused = true)]
    async fn single_page_has_no_pause() {
        let site = FakeSite::with_region(100);
        let dir = TempDir::new().unwrap();
        let start = Instant::now();

        let dataset = builder(&site, &dir).build("Moab").await.unwrap();

        assert_eq!(dataset.len(), 100);
        assert_eq!(site.urls().len(), 1);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn rows_are_normalized() {
        let site = FakeSite::with_region(3);
        let dir = TempDir::new().unwrap();

        let dataset = builder(&site, &dir).build("Moab").await.unwrap();

        let t = &dataset.trails[2];
        assert_eq!(t.name, "Trail 2");
        assert_eq!(t.difficulty, Some(3));
        assert_eq!(t.distance_ft, Some(2));
        assert_eq!(t.descent_ft, Some(1002));
        assert_eq!(t.climb_ft, Some(2640));
        assert_eq!(dataset.extra_columns, vec!["riding area"]);
        assert_eq!(t.extras, vec!["Area 2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn second_build_reads_cache() {
        let site = FakeSite::with_region(150);
        let dir = TempDir::new().unwrap();
        let b = builder(&site, &dir);

        let first = b.build("Moab").await.unwrap();
        let second = b.build("MOAB").await.unwrap();

        assert_eq!(site.urls().len(), 2);
        assert_eq!(first.trails, second.trails);
        assert!(dir.path().join("moab-trails.csv").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_bypasses_cache() {
        let site = FakeSite::with_region(50);
        let dir = TempDir::new().unwrap();

        builder(&site, &dir).build("Moab").await.unwrap();
        builder(&site, &dir).refresh(true).build("Moab").await.unwrap();

        assert_eq!(site.urls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_page_keeps_nothing() {
        let mut site = FakeSite::with_region(150);
        site.pages.remove(&format!("{LISTING}?page=2"));
        let dir = TempDir::new().unwrap();

        let err = builder(&site, &dir).build("Moab").await.unwrap_err();

        assert!(err.to_string().contains("page=2"));
        assert!(!dir.path().join("moab-trails.csv").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn broken_first_page_is_an_error() {
        let mut site = FakeSite::default();
        site.pages.insert(LISTING.to_string(), "<html><body>maintenance</body></html>".into());
        let dir = TempDir::new().unwrap();

        let err = builder(&site, &dir).build("Moab").await.unwrap_err();
        assert!(format!("{err:#}").contains("trails table"));
    }

    #[tokio::test]
    async fn trail_detail_page() {
        let mut site = FakeSite::default();
        site.pages.insert(
            "https://trails.test/trails/porcupine-rim/".into(),
            std::fs::read_to_string("tests/fixtures/trail_detail.html").unwrap(),
        );
        let dir = TempDir::new().unwrap();

        let t = builder(&site, &dir).trail("porcupine-rim").await.unwrap();
        assert_eq!(t.name, "Porcupine Rim");
        assert_eq!(t.distance_ft, Some(16368));
        assert_eq!(t.climb_ft, Some(200));
        assert_eq!(t.descent_ft, Some(16368));
    }

    #[test]
    fn fixture_columns_are_pruned() {
        let html = std::fs::read_to_string("tests/fixtures/region_listing.html").unwrap();
        let page = ListingPage::parse_first(&html).unwrap();
        let dataset = into_dataset("Moab", &page.header, page.rows);

        assert_eq!(dataset.extra_columns, vec!["riding area"]);
        let first = &dataset.trails[0];
        assert_eq!(first.name, "Lower Sidewinder");
        assert_eq!(first.difficulty, Some(4));
        assert_eq!(first.distance_ft, Some(16368));
        assert_eq!(first.descent_ft, Some(1207));
        assert_eq!(first.climb_ft, Some(210));
        assert_eq!(first.extras, vec!["Klondike Bluffs"]);

        let unmapped = &dataset.trails[2];
        assert_eq!(unmapped.difficulty, None);
        assert_eq!(unmapped.distance_ft, Some(950));
    }

    #[test]
    fn short_rows_pad_with_none() {
        let header: Vec<String> = ["name", "difficulty", "distance", "descent", "climb"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let row = ListingRow {
            cells: vec!["Stub".into()],
            difficulty: None,
        };
        let dataset = into_dataset("x", &header, vec![row]);
        let t = &dataset.trails[0];
        assert_eq!(t.name, "Stub");
        assert_eq!(t.difficulty, None);
        assert_eq!(t.distance_ft, None);
    }

    #[tokio::test(start_paused = true)]
    async fn numeric_text_under_unknown_label_is_not_a_difficulty() {
        let html = "<div class=\"trail-count\">2 trails</div>\
                    <table id=\"trails_table\"><tr><th>Trail Name</th><th>Trail Name</th>\
                    <th>Distance</th></tr>\
                    <tr><td>Odd One</td><td><span title=\"Unrated\">3</span></td><td>10 ft</td></tr>\
                    <tr><td>Plain</td><td><span title=\"Easy / Green Circle\">3</span></td><td>20 ft</td></tr>\
                    </table>";
        let mut site = FakeSite::default();
        site.pages.insert(LISTING.to_string(), html.to_string());
        let dir = TempDir::new().unwrap();

        let dataset = builder(&site, &dir).build("Moab").await.unwrap();
        assert_eq!(dataset.trails[0].difficulty, None);
        assert_eq!(dataset.trails[1].difficulty, Some(3));

        let cached = Cache::new(dir.path(), CachePolicy::Trust).load("Moab").unwrap().unwrap();
        assert_eq!(cached.trails[0].difficulty, None);
    }
}
