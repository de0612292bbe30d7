use std::sync::LazyLock;

use regex::Regex;

pub const FEET_PER_MILE: f64 = 5280.0;

static LEADING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(-?\d*\.?\d+)").unwrap());

/// Convert a displayed length ("3.2 miles", "1,450 ft") into whole feet.
///
/// Miles are rounded to the nearest foot. Returns `None` when no unit token
/// is present, the text has no leading number, or the value is negative.
pub fn to_feet(text: &str) -> Option<u32> {
    let cleaned = text.replace(',', "");
    let lower = cleaned.to_lowercase();
    let number = LEADING_NUMBER_RE.captures(&cleaned)?.get(1)?.as_str();

    let feet = if lower.contains("mile") {
        number.parse::<f64>().ok()? * FEET_PER_MILE
    } else if lower.contains("ft") {
        match number.parse::<i64>() {
            Ok(n) => n as f64,
            Err(_) => number.parse::<f64>().ok()?,
        }
    } else {
        return None;
    };

    if !feet.is_finite() || feet < 0.0 || feet > u32::MAX as f64 {
        return None;
    }
    Some(feet.round() as u32)
}
