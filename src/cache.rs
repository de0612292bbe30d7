use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::trail::{RegionDataset, TrailRecord, METRIC_COLUMNS};
use crate::urls::region_slug;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// When a cached table may be served instead of re-scraping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Any existing table is served.
    #[default]
    Trust,
    /// Served only if the metadata names the same source and is younger than this.
    MaxAge(Duration),
}

/// Sidecar describing where and when a cached table was scraped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub region: String,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub trails: usize,
}

/// One `<region>-trails.csv` table per region, plus its `.meta.json`.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
    policy: CachePolicy,
}

impl Cache {
    pub fn new(dir: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }

    pub fn table_path(&self, region: &str) -> PathBuf {
        self.dir.join(format!("{}-trails.csv", cache_key(region)))
    }

    pub fn meta_path(&self, region: &str) -> PathBuf {
        self.dir.join(format!("{}-trails.meta.json", cache_key(region)))
    }

    /// Cached dataset for `region` if the policy accepts it for `source`.
    pub fn lookup(&self, region: &str, source: &str) -> Result<Option<RegionDataset>, CacheError> {
        if !self.table_path(region).exists() {
            debug!(region, "No cache entry");
            return Ok(None);
        }
        let meta = self.read_meta(region).unwrap_or_else(|e| {
            warn!(region, error = %e, "Ignoring unreadable cache metadata");
            None
        });
        if !self.is_fresh(meta.as_ref(), source, Utc::now()) {
            info!(region, "Cache entry is stale");
            return Ok(None);
        }
        self.load(region)
    }

    /// Cached dataset regardless of policy.
    pub fn load(&self, region: &str) -> Result<Option<RegionDataset>, CacheError> {
        let path = self.table_path(region);
        if !path.exists() {
            return Ok(None);
        }
        read_table(&path, region).map(Some)
    }

    pub fn read_meta(&self, region: &str) -> Result<Option<CacheMeta>, CacheError> {
        let path = self.meta_path(region);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Write the table and its metadata. Returns the table path.
    ///
    /// Each file is written to a temporary sibling and renamed into place, so
    /// a failed write leaves any previous entry intact.
    pub fn store(&self, dataset: &RegionDataset, source: &str) -> Result<PathBuf, CacheError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.table_path(&dataset.region);
        let table = write_table(NamedTempFile::new_in(&self.dir)?, dataset)?;
        table.persist(&path).map_err(|e| e.error)?;

        let meta = CacheMeta {
            region: dataset.region.clone(),
            source: source.to_string(),
            fetched_at: Utc::now(),
            trails: dataset.len(),
        };
        let mut out = BufWriter::new(NamedTempFile::new_in(&self.dir)?);
        serde_json::to_writer_pretty(&mut out, &meta)?;
        out.flush()?;
        let tmp = out.into_inner().map_err(|e| e.into_error())?;
        tmp.persist(self.meta_path(&dataset.region)).map_err(|e| e.error)?;

        info!(region = %dataset.region, path = %path.display(), trails = dataset.len(), "Cached dataset");
        Ok(path)
    }

    fn is_fresh(&self, meta: Option<&CacheMeta>, source: &str, now: DateTime<Utc>) -> bool {
        match self.policy {
            CachePolicy::Trust => true,
            CachePolicy::MaxAge(max_age) => {
                meta.is_some_and(|m| m.source == source && now - m.fetched_at <= max_age)
            }
        }
    }
}

/// Lower-cased region with whitespace runs joined by `-`.
fn cache_key(region: &str) -> String {
    region_slug(region)
}

fn write_table(out: NamedTempFile, dataset: &RegionDataset) -> Result<NamedTempFile, CacheError> {
    let mut w = csv::Writer::from_writer(out);

    let mut header = vec![""];
    header.extend(METRIC_COLUMNS);
    header.extend(dataset.extra_columns.iter().map(String::as_str));
    w.write_record(&header)?;

    for (i, t) in dataset.trails.iter().enumerate() {
        let mut record = vec![
            i.to_string(),
            t.name.clone(),
            opt(t.difficulty),
            opt(t.distance_ft),
            opt(t.descent_ft),
            opt(t.climb_ft),
        ];
        record.extend(t.extras.iter().cloned());
        w.write_record(&record)?;
    }
    w.into_inner().map_err(|e| e.into_error().into())
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn read_table(path: &Path, region: &str) -> Result<RegionDataset, CacheError> {
    let mut r = csv::Reader::from_path(path)?;
    let headers = r.headers()?.clone();

    let corrupt = |reason: String| CacheError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| corrupt(format!("missing column {name:?}")))
    };
    let [name, difficulty, distance, descent, climb] = [
        column("name")?,
        column("difficulty")?,
        column("distance")?,
        column("descent")?,
        column("climb")?,
    ];

    // Column 0 is the row index.
    let extra_idx: Vec<usize> = (1..headers.len())
        .filter(|&i| !METRIC_COLUMNS.contains(&&headers[i]))
        .collect();
    let extra_columns = extra_idx.iter().map(|&i| headers[i].to_string()).collect();

    let mut trails = Vec::new();
    for (line, row) in r.records().enumerate() {
        let row = row?;
        let cell = |i: usize| row.get(i).unwrap_or("").trim();
        let number = |i: usize| -> Result<Option<u32>, CacheError> {
            match cell(i) {
                "" => Ok(None),
                s => s
                    .parse()
                    .map(Some)
                    .map_err(|_| corrupt(format!("row {}: bad number {s:?}", line + 1))),
            }
        };
        trails.push(TrailRecord {
            name: cell(name).to_string(),
            difficulty: number(difficulty)?.and_then(|d| u8::try_from(d).ok()),
            distance_ft: number(distance)?,
            climb_ft: number(climb)?,
            descent_ft: number(descent)?,
            extras: extra_idx.iter().map(|&i| cell(i).to_string()).collect(),
        });
    }

    Ok(RegionDataset {
        region: region.to_string(),
        extra_columns,
        trails,
    })
}
