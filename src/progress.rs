use std::sync::LazyLock;

use chrono::{NaiveDate, TimeDelta};
use regex::Regex;
use tracing::debug;

use crate::models::{AnalysisResult, ConsolidatedReport};

static PERCENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*%?").expect("percent pattern is valid")
});

const COMPLETE: f64 = 100.0;

/// Projections further out than this are reported as not derivable.
pub const MAX_PROJECTION_DAYS: i64 = 100 * 365;

/// Leftmost run of ASCII digits in the narrative, capped at 100; 0.0 when
/// there is none.
pub fn extract_progress(narrative: &str) -> f64 {
    PERCENT_PATTERN
        .captures(narrative)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|value| value.min(COMPLETE))
        .unwrap_or(0.0)
}

pub fn consolidate(results: &[AnalysisResult]) -> ConsolidatedReport {
    let overall_progress_percent = if results.is_empty() {
        0.0
    } else {
        results.iter().map(|r| r.progress_percent).sum::<f64>() / results.len() as f64
    };

    let estimated_completion_date = estimate_completion(results);
    debug!(
        count = results.len(),
        overall_progress_percent,
        ?estimated_completion_date,
        "consolidate: done"
    );

    ConsolidatedReport {
        timeline: results.to_vec(),
        overall_progress_percent,
        estimated_completion_date,
    }
}

/// Fits progress against days since the earliest capture and projects the day
/// the line reaches 100%.
///
/// `None` when there are fewer than two distinct capture dates, when the fitted
/// slope is not positive, or when the crossing lies more than
/// [`MAX_PROJECTION_DAYS`] past the earliest capture.
pub fn estimate_completion(results: &[AnalysisResult]) -> Option<NaiveDate> {
    let origin = results.iter().map(|r| r.captured_date).min()?;
    let latest = results.iter().map(|r| r.captured_date).max()?;
    if origin == latest {
        return None;
    }

    let latest_values: Vec<f64> = results
        .iter()
        .filter(|r| r.captured_date == latest)
        .map(|r| r.progress_percent)
        .collect();
    let latest_mean = latest_values.iter().sum::<f64>() / latest_values.len() as f64;
    if latest_mean >= COMPLETE {
        return Some(latest);
    }

    let points: Vec<(f64, f64)> = results
        .iter()
        .map(|r| ((r.captured_date - origin).num_days() as f64, r.progress_percent))
        .collect();
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    let sxy: f64 = points.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    let slope = sxy / sxx;
    if !slope.is_finite() || slope <= 0.0 {
        return None;
    }

    let intercept = mean_y - slope * mean_x;
    // Absorb float noise before rounding up to whole days.
    let days = ((COMPLETE - intercept) / slope - 1e-9).ceil();
    if !days.is_finite() || days > MAX_PROJECTION_DAYS as f64 {
        return None;
    }

    let projected = origin.checked_add_signed(TimeDelta::try_days(days as i64)?)?;
    Some(projected.max(latest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(date: (i32, u32, u32), progress: f64) -> AnalysisResult {
        AnalysisResult {
            reference: format!("gs://site/{}-{}-{}.png", date.0, date.1, date.2),
            captured_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            narrative: format!("about {progress}% done"),
            progress_percent: progress,
            is_simulated: false,
        }
    }

    #[test]
    fn extracts_decimal_percentage() {
        assert_eq!(extract_progress("approximately 73.5% progress"), 73.5);
    }

    #[test]
    fn missing_number_yields_zero() {
        assert_eq!(extract_progress("no numeric info here"), 0.0);
    }

    #[test]
    fn takes_leftmost_number() {
        assert_eq!(extract_progress("Phase 2 is 45% complete"), 2.0);
        assert_eq!(extract_progress("roughly 60 % of the slab is poured"), 60.0);
    }

    #[test]
    fn non_ascii_digits_are_skipped() {
        assert_eq!(extract_progress("phase ٢, approximately 73.5% progress"), 73.5);
        assert_eq!(extract_progress("٧٣% complete"), 0.0);
    }

    #[test]
    fn caps_at_one_hundred() {
        assert_eq!(extract_progress("site spans 250 meters"), 100.0);
    }

    #[test]
    fn overall_is_arithmetic_mean() {
        let results = vec![
            result((2023, 8, 13), 20.0),
            result((2023, 11, 29), 55.5),
            result((2023, 12, 8), 61.0),
        ];
        let report = consolidate(&results);
        let expected = (20.0 + 55.5 + 61.0) / 3.0;
        assert!((report.overall_progress_percent - expected).abs() < 1e-9);
    }

    #[test]
    fn empty_set_is_zero() {
        let report = consolidate(&[]);
        assert_eq!(report.overall_progress_percent, 0.0);
        assert!(report.timeline.is_empty());
        assert_eq!(report.estimated_completion_date, None);
    }

    #[test]
    fn timeline_preserves_input_order() {
        let results = vec![
            result((2024, 3, 1), 70.0),
            result((2024, 1, 1), 30.0),
            result((2024, 2, 1), 50.0),
        ];
        let report = consolidate(&results);
        let refs: Vec<&str> = report.timeline.iter().map(|r| r.reference.as_str()).collect();
        let expected: Vec<&str> = results.iter().map(|r| r.reference.as_str()).collect();
        assert_eq!(refs, expected);
    }

    #[test]
    fn consolidation_is_idempotent() {
        let results = vec![result((2024, 1, 1), 10.0), result((2024, 2, 1), 35.0)];
        assert_eq!(consolidate(&results), consolidate(&results));
    }

    #[test]
    fn extrapolates_linear_progress() {
        let results = vec![
            result((2024, 1, 1), 20.0),
            result((2024, 1, 31), 40.0),
            result((2024, 3, 1), 60.0),
        ];
        // 2/3 percent per day from 20% reaches 100% after 120 days.
        assert_eq!(
            estimate_completion(&results),
            NaiveDate::from_ymd_opt(2024, 4, 30)
        );
    }

    #[test]
    fn single_capture_date_is_not_derivable() {
        let results = vec![result((2024, 1, 1), 20.0), result((2024, 1, 1), 40.0)];
        assert_eq!(estimate_completion(&results), None);
    }

    #[test]
    fn stalled_or_regressing_progress_is_not_derivable() {
        let flat = vec![result((2024, 1, 1), 40.0), result((2024, 2, 1), 40.0)];
        assert_eq!(estimate_completion(&flat), None);

        let regressing = vec![result((2024, 1, 1), 60.0), result((2024, 2, 1), 40.0)];
        assert_eq!(estimate_completion(&regressing), None);
    }

    #[test]
    fn negligible_slope_is_not_derivable() {
        let results = vec![result((2024, 1, 1), 10.0), result((2024, 1, 2), 10.000001)];
        assert_eq!(estimate_completion(&results), None);
    }

    #[test]
    fn projection_within_horizon_is_kept() {
        // Ten points per decade from 10% reaches 100% after 90 years.
        let results = vec![result((2000, 1, 1), 10.0), result((2010, 1, 1), 20.0)];
        let date = estimate_completion(&results).unwrap();
        assert!(date.years_since(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()).unwrap() >= 89);
    }

    #[test]
    fn finished_site_completes_on_latest_capture() {
        let results = vec![result((2024, 1, 1), 80.0), result((2024, 2, 1), 100.0)];
        assert_eq!(
            estimate_completion(&results),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
    }

    #[test]
    fn projection_never_precedes_latest_capture() {
        // Clustered early gains put the fitted crossing before the last capture.
        let results = vec![
            result((2024, 1, 1), 0.0),
            result((2024, 1, 2), 99.0),
            result((2024, 1, 2), 99.0),
            result((2024, 1, 2), 99.0),
            result((2024, 1, 11), 99.9),
        ];
        assert_eq!(
            estimate_completion(&results),
            NaiveDate::from_ymd_opt(2024, 1, 11)
        );
    }
}
