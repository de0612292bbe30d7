mod cache;
mod dataset;
mod fetch;
mod parser;
mod settings;
mod trail;
mod urls;

use std::cmp::Ordering;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use cache::Cache;
use dataset::RegionBuilder;
use fetch::HttpFetcher;
use parser::difficulty::difficulty_label;
use parser::listing::{page_count, ROWS_PER_PAGE};
use parser::units::FEET_PER_MILE;
use settings::Settings;
use trail::{RegionDataset, TrailRecord};

#[derive(Parser)]
#[command(name = "trail_scraper", about = "Mountain-bike trail stats per region, cached as CSV")]
struct Cli {
    /// Directory holding `<region>-trails.csv` (default: TRAILS_CACHE_DIR or .)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    /// Seconds to wait before each listing page after the first
    #[arg(long, global = true)]
    delay_secs: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a region dataset (cached after the first run) and print it
    Region {
        name: String,
        /// Re-scrape even if a cached table exists
        #[arg(long)]
        refresh: bool,
        /// Treat cached tables older than this as stale
        #[arg(long)]
        max_age_hours: Option<u64>,
        #[command(flatten)]
        view: View,
    },
    /// Print a cached region dataset without touching the network
    Show {
        name: String,
        #[command(flatten)]
        view: View,
    },
    /// Fetch one trail page by slug or URL
    Trail {
        slug: String,
        #[arg(long)]
        json: bool,
    },
    /// Number of listing pages for a trail total
    Pages { total: u32 },
}

#[derive(clap::Args)]
struct View {
    #[arg(short, long, value_enum, default_value = "listing")]
    sort: SortKey,
    /// Max rows to display
    #[arg(short = 'n', long, default_value = "50")]
    limit: usize,
    /// Print records as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortKey {
    Listing,
    Difficulty,
    Distance,
    Climb,
    Descent,
    Ratio,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(dir) = cli.cache_dir {
        settings.cache_dir = dir;
    }
    if let Some(secs) = cli.delay_secs {
        settings.page_delay_secs = secs;
    }

    let result = match cli.command {
        Commands::Region {
            name,
            refresh,
            max_age_hours,
            view,
        } => {
            if max_age_hours.is_some() {
                settings.max_cache_age_hours = max_age_hours;
            }
            let builder = region_builder(&settings)?.refresh(refresh);
            let dataset = builder
                .build(&name)
                .await
                .with_context(|| format!("Failed to build region {name}"))?;
            println!(
                "Cache: {}",
                builder.cache().table_path(&dataset.region).display()
            );
            print_dataset(&dataset, &view)
        }
        Commands::Show { name, view } => {
            let cache = Cache::new(&settings.cache_dir, settings.cache_policy()?);
            match cache.load(&name)? {
                Some(dataset) => print_dataset(&dataset, &view),
                None => {
                    println!("No cached dataset for {name}. Run 'region {name}' first.");
                    Ok(())
                }
            }
        }
        Commands::Trail { slug, json } => {
            let trail = region_builder(&settings)?.trail(&slug).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&trail)?);
            } else {
                print_trail(&trail);
            }
            Ok(())
        }
        Commands::Pages { total } => {
            println!(
                "{} trails -> {} pages of {}",
                total,
                page_count(total),
                ROWS_PER_PAGE
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn region_builder(settings: &Settings) -> anyhow::Result<RegionBuilder<HttpFetcher>> {
    let fetcher = HttpFetcher::new(&settings.user_agent, settings.timeout())
        .context("Failed to create HTTP client")?;
    let cache = Cache::new(&settings.cache_dir, settings.cache_policy()?);
    Ok(RegionBuilder::new(fetcher, cache, settings.base_url.clone()).page_delay(settings.page_delay()))
}

fn print_dataset(dataset: &RegionDataset, view: &View) -> anyhow::Result<()> {
    if dataset.is_empty() {
        println!("No trails listed for {}.", dataset.region);
        return Ok(());
    }

    let mut trails: Vec<&TrailRecord> = dataset.trails.iter().collect();
    sort_trails(&mut trails, view.sort);
    trails.truncate(view.limit);

    if view.json {
        println!("{}", serde_json::to_string_pretty(&trails)?);
        return Ok(());
    }

    println!(
        "{:>4} | {:<30} | {:>4} | {:>8} | {:>7} | {:>7} | {:>5}",
        "#", "Trail", "Diff", "Dist mi", "Climb", "Descent", "D/C"
    );
    println!("{}", "-".repeat(85));
    for (i, t) in trails.iter().enumerate() {
        println!(
            "{:>4} | {:<30} | {:>4} | {:>8} | {:>7} | {:>7} | {:>5}",
            i + 1,
            truncate(&t.name, 30),
            dash(t.difficulty),
            t.distance_ft
                .map(|ft| format!("{:.2}", ft as f64 / FEET_PER_MILE))
                .unwrap_or_else(|| "-".into()),
            dash(t.climb_ft),
            dash(t.descent_ft),
            t.descent_climb_ratio()
                .map(|r| format!("{:.2}", r))
                .unwrap_or_else(|| "-".into()),
        );
    }

    println!(
        "\n{} of {} trails in {} | lengths in feet unless noted",
        trails.len(),
        dataset.len(),
        dataset.region
    );
    Ok(())
}

fn print_trail(t: &TrailRecord) {
    println!("Name:       {}", t.name);
    println!(
        "Difficulty: {}",
        t.difficulty
            .map(|d| format!("{} ({})", d, difficulty_label(d).unwrap_or("?")))
            .unwrap_or_else(|| "-".into())
    );
    println!("Distance:   {} ft", dash(t.distance_ft));
    println!("Climb:      {} ft", dash(t.climb_ft));
    println!("Descent:    {} ft", dash(t.descent_ft));
    if let Some(r) = t.descent_climb_ratio() {
        println!("D/C ratio:  {:.2}", r);
    }
}

/// Numeric keys sort descending with missing values last.
fn sort_trails(trails: &mut [&TrailRecord], key: SortKey) {
    fn desc<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
    match key {
        SortKey::Listing => {}
        SortKey::Difficulty => trails.sort_by(|a, b| desc(a.difficulty, b.difficulty)),
        SortKey::Distance => trails.sort_by(|a, b| desc(a.distance_ft, b.distance_ft)),
        SortKey::Climb => trails.sort_by(|a, b| desc(a.climb_ft, b.climb_ft)),
        SortKey::Descent => trails.sort_by(|a, b| desc(a.descent_ft, b.descent_ft)),
        SortKey::Ratio => {
            trails.sort_by(|a, b| desc(a.descent_climb_ratio(), b.descent_climb_ratio()))
        }
    }
}

fn dash<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
