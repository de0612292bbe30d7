use serde::{Deserialize, Serialize};

/// Metric columns every dataset carries, in cache order.
pub const METRIC_COLUMNS: [&str; 5] = ["name", "difficulty", "distance", "descent", "climb"];

/// One trail. Lengths are whole feet; `None` marks a value the source did
/// not provide in a readable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailRecord {
    pub name: String,
    pub difficulty: Option<u8>,
    pub distance_ft: Option<u32>,
    pub climb_ft: Option<u32>,
    pub descent_ft: Option<u32>,
    /// Values of the dataset's extra columns, same order.
    #[serde(default)]
    pub extras: Vec<String>,
}

impl TrailRecord {
    pub fn descent_climb_ratio(&self) -> Option<f64> {
        match (self.descent_ft, self.climb_ft) {
            (Some(d), Some(c)) if c > 0 => Some(d as f64 / c as f64),
            _ => None,
        }
    }
}

/// All trails listed for one region, in listing order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegionDataset {
    pub region: String,
    /// Raw listing columns kept alongside the metric columns.
    pub extra_columns: Vec<String>,
    pub trails: Vec<TrailRecord>,
}

impl RegionDataset {
    pub fn len(&self) -> usize {
        self.trails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }
}
