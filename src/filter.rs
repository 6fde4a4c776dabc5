use chrono::NaiveDate;
use clap::ValueEnum;

use crate::models::{NcRecord, SourceClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceFilter {
    All,
    External,
    Internal,
}

/// User-selected slice of the record set. Every aggregation runs on the
/// output of `apply`, so each tab sees the same subset for the same
/// selection.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub source: SourceFilter,
}

impl Default for SourceFilter {
    fn default() -> Self {
        SourceFilter::All
    }
}

pub fn apply(records: &[NcRecord], filters: &Filters) -> Vec<NcRecord> {
    records
        .iter()
        .filter(|record| matches_source(record, filters.source))
        .filter(|record| matches_date_range(record, filters.start, filters.end))
        .cloned()
        .collect()
}

fn matches_source(record: &NcRecord, source: SourceFilter) -> bool {
    match source {
        SourceFilter::All => true,
        SourceFilter::External => record.source == SourceClass::External,
        SourceFilter::Internal => record.source == SourceClass::Internal,
    }
}

fn matches_date_range(
    record: &NcRecord,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> bool {
    if start.is_none() && end.is_none() {
        return true;
    }
    // A bound cannot be evaluated against a missing submission date.
    let Some(submitted) = record.date_submitted else {
        return false;
    };
    if let Some(start) = start {
        if submitted < start {
            return false;
        }
    }
    if let Some(end) = end {
        if submitted > end {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, Status};

    fn record(nc_number: &str, source: SourceClass, submitted: Option<&str>) -> NcRecord {
        NcRecord {
            year: Some(2024),
            week: Some(10),
            source,
            nc_number: nc_number.to_string(),
            priority: Priority::Medium,
            customer: "Acme Corp".to_string(),
            issue_type: "Quality Defect".to_string(),
            status: Status::Open,
            date_submitted: submitted
                .map(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()),
            on_time_ship_date: None,
            quantity_affected: 0.0,
            cost_of_rework: 0.0,
            cost_avoided: 0.0,
            employee_responsible: String::new(),
            first_article_completed: false,
        }
    }

    #[test]
    fn default_filters_keep_everything() {
        let records = vec![
            record("NC-001", SourceClass::External, Some("2024-01-10")),
            record("NC-002", SourceClass::Internal, None),
        ];
        assert_eq!(apply(&records, &Filters::default()).len(), 2);
    }

    #[test]
    fn source_filter_matches_classification() {
        let records = vec![
            record("NC-001", SourceClass::External, Some("2024-01-10")),
            record("NC-002", SourceClass::Internal, Some("2024-01-11")),
            record(
                "NC-003",
                SourceClass::Other("Unknown".to_string()),
                Some("2024-01-12"),
            ),
        ];
        let external = apply(
            &records,
            &Filters {
                source: SourceFilter::External,
                ..Filters::default()
            },
        );
        assert_eq!(external.len(), 1);
        assert_eq!(external[0].nc_number, "NC-001");

        let all = apply(&records, &Filters::default());
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn date_range_is_inclusive_on_both_ends() {
        let records = vec![
            record("NC-001", SourceClass::External, Some("2024-01-10")),
            record("NC-002", SourceClass::External, Some("2024-01-20")),
            record("NC-003", SourceClass::External, Some("2024-01-31")),
        ];
        let filters = Filters {
            start: NaiveDate::from_ymd_opt(2024, 1, 10),
            end: NaiveDate::from_ymd_opt(2024, 1, 20),
            source: SourceFilter::All,
        };
        let kept = apply(&records, &filters);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].nc_number, "NC-001");
        assert_eq!(kept[1].nc_number, "NC-002");
    }

    #[test]
    fn missing_dates_fall_out_when_a_bound_is_set() {
        let records = vec![
            record("NC-001", SourceClass::External, None),
            record("NC-002", SourceClass::External, Some("2024-01-20")),
        ];
        let filters = Filters {
            start: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Filters::default()
        };
        let kept = apply(&records, &filters);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].nc_number, "NC-002");
    }
}
