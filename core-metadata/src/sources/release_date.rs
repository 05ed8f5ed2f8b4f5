//! Release date extraction from catalog payloads.
//!
//! Catalogs return either one date string or a map keyed by region. A region
//! map is read in the order UK, PAL, EU/Europe, then any other region.
//! Partial dates are completed with `01` for the missing month/day.

use chrono::NaiveDate;
use serde_json::Value;

/// Region keys in priority order; each group is tried before the next.
const REGION_PRIORITY: &[&[&str]] = &[&["uk", "gb"], &["pal"], &["eu", "europe"]];

/// Pick and normalize a release date from a scalar or region-keyed value.
pub fn pick_release_date(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => normalize_date(s),
        Value::Array(items) => items.iter().find_map(pick_release_date),
        Value::Object(map) => {
            for group in REGION_PRIORITY {
                let preferred = map
                    .iter()
                    .filter(|(key, _)| group.iter().any(|g| key.eq_ignore_ascii_case(g)))
                    .find_map(|(_, v)| pick_release_date(v));
                if preferred.is_some() {
                    return preferred;
                }
            }
            map.values().find_map(pick_release_date)
        }
        _ => None,
    }
}

/// Normalize a date string to `YYYY-MM-DD`.
///
/// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD` (with `-`, `/` or `.` separators,
/// optionally followed by a time) and English month-name forms such as
/// `Nov 9, 2004`. Returns `None` for anything that is not a real date.
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let date_part = raw
        .split(['T', ' '])
        .next()
        .unwrap_or(raw)
        .replace(['/', '.'], "-");

    let parts: Vec<&str> = date_part.split('-').collect();
    let numeric = parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if numeric && parts[0].len() == 4 {
        let year: i32 = parts[0].parse().ok()?;
        let month: u32 = parts.get(1).map_or(Some(1), |m| m.parse().ok())?;
        let day: u32 = parts.get(2).map_or(Some(1), |d| d.parse().ok())?;
        if parts.len() > 3 {
            return None;
        }
        return NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string());
    }

    const TEXT_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y"];
    TEXT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .or_else(|| {
            const MONTH_YEAR: &[&str] = &["%b %Y", "%B %Y"];
            MONTH_YEAR
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(&format!("1 {}", raw), &format!("%d {}", fmt)).ok())
                .map(|d| d.format("%Y-%m-%d").to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_dates_are_completed() {
        assert_eq!(normalize_date("2004"), Some("2004-01-01".to_string()));
        assert_eq!(normalize_date("2012-05"), Some("2012-05-01".to_string()));
        assert_eq!(normalize_date("2012-04-20"), Some("2012-04-20".to_string()));
        assert_eq!(normalize_date("2001/11/15"), Some("2001-11-15".to_string()));
        assert_eq!(
            normalize_date("2004-11-09T00:00:00Z"),
            Some("2004-11-09".to_string())
        );
    }

    #[test]
    fn test_text_dates() {
        assert_eq!(normalize_date("Nov 9, 2004"), Some("2004-11-09".to_string()));
        assert_eq!(normalize_date("November 9, 2004"), Some("2004-11-09".to_string()));
        assert_eq!(normalize_date("March 2002"), Some("2002-03-01".to_string()));
    }

    #[test]
    fn test_invalid_dates() {
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("TBA"), None);
        assert_eq!(normalize_date("2012-13"), None);
        assert_eq!(normalize_date("2012-02-30"), None);
        assert_eq!(normalize_date("12-05-2012"), None);
    }

    #[test]
    fn test_region_priority() {
        let value = json!({"EU": "2012-05", "JP": "2012-04-20"});
        assert_eq!(pick_release_date(&value), Some("2012-05-01".to_string()));

        let value = json!({"JP": "2001-09-14", "PAL": "2002-05-03", "Europe": "2002-05-01"});
        assert_eq!(pick_release_date(&value), Some("2002-05-03".to_string()));

        let value = json!({"uk": "2002-05-10", "pal": "2002-05-03"});
        assert_eq!(pick_release_date(&value), Some("2002-05-10".to_string()));

        let value = json!({"NA": "2001-11-15"});
        assert_eq!(pick_release_date(&value), Some("2001-11-15".to_string()));
    }

    #[test]
    fn test_unparseable_preferred_region_falls_through() {
        let value = json!({"UK": "TBA", "US": "2005-03-01"});
        assert_eq!(pick_release_date(&value), Some("2005-03-01".to_string()));
    }

    #[test]
    fn test_scalar_and_missing() {
        assert_eq!(
            pick_release_date(&json!("2004-11-09")),
            Some("2004-11-09".to_string())
        );
        assert_eq!(pick_release_date(&json!(null)), None);
        assert_eq!(pick_release_date(&json!(2004)), None);
    }
}
