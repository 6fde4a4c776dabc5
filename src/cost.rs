use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use clap::ValueEnum;

use crate::models::{CostPoint, CostReport, CostStats, NcRecord};

pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

/// Sums Cost of Rework and Cost Avoided per period derived from the
/// submission date, with a trailing moving average over each series.
/// Records without a submission date cannot be placed in a period and are
/// counted separately.
pub fn analyze_costs(records: &[NcRecord], period: Period, window: usize) -> CostReport {
    #[derive(Default)]
    struct Acc {
        label: String,
        count: usize,
        rework: f64,
        avoided: f64,
    }

    let mut by_period: BTreeMap<NaiveDate, Acc> = BTreeMap::new();
    let mut rework_values: Vec<f64> = Vec::new();
    let mut avoided_values: Vec<f64> = Vec::new();
    let mut missing_date_count = 0usize;

    for record in records {
        let Some(submitted) = record.date_submitted else {
            missing_date_count += 1;
            continue;
        };
        let (start, label) = period_bucket(submitted, period);
        let entry = by_period.entry(start).or_default();
        entry.label = label;
        entry.count += 1;
        entry.rework += record.cost_of_rework;
        entry.avoided += record.cost_avoided;
        rework_values.push(record.cost_of_rework);
        avoided_values.push(record.cost_avoided);
    }

    // BTreeMap iteration gives the periods in ascending date order, which
    // is what the moving average needs.
    let mut periods: Vec<CostPoint> = by_period
        .into_iter()
        .map(|(start, acc)| CostPoint {
            start,
            label: acc.label,
            count: acc.count,
            rework_total: acc.rework,
            avoided_total: acc.avoided,
            rework_avg: 0.0,
            avoided_avg: 0.0,
        })
        .collect();

    let window = window.max(1);
    let rework_totals: Vec<f64> = periods.iter().map(|p| p.rework_total).collect();
    let avoided_totals: Vec<f64> = periods.iter().map(|p| p.avoided_total).collect();
    for (idx, point) in periods.iter_mut().enumerate() {
        point.rework_avg = trailing_mean(&rework_totals, idx, window);
        point.avoided_avg = trailing_mean(&avoided_totals, idx, window);
    }

    CostReport {
        periods,
        missing_date_count,
        rework: series_stats(&rework_values),
        avoided: series_stats(&avoided_values),
    }
}

fn period_bucket(date: NaiveDate, period: Period) -> (NaiveDate, String) {
    match period {
        Period::Daily => (date, date.format("%Y-%m-%d").to_string()),
        Period::Weekly => {
            let iso = date.iso_week();
            let start = NaiveDate::from_isoywd_opt(iso.year(), iso.week(), Weekday::Mon)
                .unwrap_or(date);
            (start, format!("{}-W{:02}", iso.year(), iso.week()))
        }
        Period::Monthly => {
            let start =
                NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date);
            (start, date.format("%Y-%m").to_string())
        }
        Period::Quarterly => {
            let quarter = (date.month() - 1) / 3 + 1;
            let start = NaiveDate::from_ymd_opt(date.year(), (quarter - 1) * 3 + 1, 1)
                .unwrap_or(date);
            (start, format!("{}-Q{}", date.year(), quarter))
        }
        Period::Yearly => {
            let start = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date);
            (start, date.format("%Y").to_string())
        }
    }
}

/// Mean over the trailing `window` values ending at `idx`, shrinking at
/// the start of the series rather than waiting for a full window.
fn trailing_mean(values: &[f64], idx: usize, window: usize) -> f64 {
    let lo = (idx + 1).saturating_sub(window);
    let slice = &values[lo..=idx];
    slice.iter().sum::<f64>() / slice.len() as f64
}

fn series_stats(values: &[f64]) -> CostStats {
    if values.is_empty() {
        return CostStats::default();
    }
    let total: f64 = values.iter().sum();
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    };
    CostStats {
        total,
        mean: total / values.len() as f64,
        median,
        max: sorted[sorted.len() - 1],
        with_cost: values.iter().filter(|v| **v > 0.0).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, SourceClass, Status};

    fn record(nc_number: &str, submitted: Option<NaiveDate>, rework: f64, avoided: f64) -> NcRecord {
        NcRecord {
            year: None,
            week: None,
            source: SourceClass::External,
            nc_number: nc_number.to_string(),
            priority: Priority::Medium,
            customer: "Acme Corp".to_string(),
            issue_type: "Quality Defect".to_string(),
            status: Status::Open,
            date_submitted: submitted,
            on_time_ship_date: None,
            quantity_affected: 0.0,
            cost_of_rework: rework,
            cost_avoided: avoided,
            employee_responsible: String::new(),
            first_article_completed: false,
        }
    }

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn same_iso_week_collapses_into_one_bucket() {
        // 2024-01-15 is a Monday; the 17th sits in the same ISO week.
        let records = vec![
            record("NC-001", Some(day(2024, 1, 15)), 100.0, 10.0),
            record("NC-002", Some(day(2024, 1, 17)), 50.0, 5.0),
        ];
        let report = analyze_costs(&records, Period::Weekly, 3);
        assert_eq!(report.periods.len(), 1);
        let point = &report.periods[0];
        assert_eq!(point.label, "2024-W03");
        assert_eq!(point.count, 2);
        assert!((point.rework_total - 150.0).abs() < 1e-9);
        assert!((point.avoided_total - 15.0).abs() < 1e-9);
    }

    #[test]
    fn iso_week_crosses_the_year_boundary() {
        // 2024-12-30 and 2025-01-02 both belong to ISO week 2025-W01.
        let records = vec![
            record("NC-001", Some(day(2024, 12, 30)), 10.0, 0.0),
            record("NC-002", Some(day(2025, 1, 2)), 20.0, 0.0),
        ];
        let report = analyze_costs(&records, Period::Weekly, 3);
        assert_eq!(report.periods.len(), 1);
        assert_eq!(report.periods[0].label, "2025-W01");
    }

    #[test]
    fn period_labels_per_granularity() {
        let date = day(2024, 8, 15);
        assert_eq!(period_bucket(date, Period::Daily).1, "2024-08-15");
        assert_eq!(period_bucket(date, Period::Monthly).1, "2024-08");
        assert_eq!(period_bucket(date, Period::Quarterly).1, "2024-Q3");
        assert_eq!(period_bucket(date, Period::Yearly).1, "2024");
        assert_eq!(period_bucket(date, Period::Quarterly).0, day(2024, 7, 1));
    }

    #[test]
    fn periods_come_back_in_ascending_order() {
        let records = vec![
            record("NC-001", Some(day(2024, 3, 5)), 10.0, 0.0),
            record("NC-002", Some(day(2024, 1, 5)), 20.0, 0.0),
            record("NC-003", Some(day(2024, 2, 5)), 30.0, 0.0),
        ];
        let report = analyze_costs(&records, Period::Monthly, 3);
        let labels: Vec<&str> = report.periods.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["2024-01", "2024-02", "2024-03"]);
    }

    #[test]
    fn moving_average_shrinks_at_the_start() {
        let records = vec![
            record("NC-001", Some(day(2024, 1, 5)), 10.0, 0.0),
            record("NC-002", Some(day(2024, 2, 5)), 20.0, 0.0),
            record("NC-003", Some(day(2024, 3, 5)), 30.0, 0.0),
            record("NC-004", Some(day(2024, 4, 5)), 40.0, 0.0),
        ];
        let report = analyze_costs(&records, Period::Monthly, 3);
        let averages: Vec<f64> = report.periods.iter().map(|p| p.rework_avg).collect();
        assert!((averages[0] - 10.0).abs() < 1e-9);
        assert!((averages[1] - 15.0).abs() < 1e-9);
        assert!((averages[2] - 20.0).abs() < 1e-9);
        assert!((averages[3] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn missing_dates_are_counted_not_bucketed() {
        let records = vec![
            record("NC-001", Some(day(2024, 1, 5)), 10.0, 0.0),
            record("NC-002", None, 99.0, 0.0),
        ];
        let report = analyze_costs(&records, Period::Monthly, 3);
        assert_eq!(report.periods.len(), 1);
        assert_eq!(report.missing_date_count, 1);
        assert!((report.rework.total - 10.0).abs() < 1e-9);
    }

    #[test]
    fn series_stats_summarize_per_record_costs() {
        let records = vec![
            record("NC-001", Some(day(2024, 1, 5)), 100.0, 0.0),
            record("NC-002", Some(day(2024, 1, 6)), 0.0, 0.0),
            record("NC-003", Some(day(2024, 1, 7)), 50.0, 0.0),
        ];
        let report = analyze_costs(&records, Period::Monthly, 3);
        assert!((report.rework.total - 150.0).abs() < 1e-9);
        assert!((report.rework.mean - 50.0).abs() < 1e-9);
        assert!((report.rework.median - 50.0).abs() < 1e-9);
        assert!((report.rework.max - 100.0).abs() < 1e-9);
        assert_eq!(report.rework.with_cost, 2);
    }
}
