use std::collections::HashSet;

use chrono::NaiveDate;

use crate::error::FetchError;
use crate::models::{NcRecord, Priority, SourceClass, Status};

/// Canonical header names for the worksheet. Matching is case-insensitive
/// after trimming; extra columns in the sheet are ignored.
pub const EXPECTED_COLUMNS: [&str; 15] = [
    "Year",
    "Week",
    "External Or Internal",
    "NC Number",
    "Priority",
    "Customer",
    "Issue Type",
    "Status",
    "Date Submitted",
    "On-Time Ship Date",
    "Quantity Affected",
    "Cost of Rework",
    "Cost Avoided",
    "Employee Responsible",
    "First Article Completed",
];

// %y before %Y: %Y would happily read a two-digit year as 0024, while %y
// fails on four-digit years and falls through.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%B %d, %Y"];

/// Typed snapshot of the sheet plus row-level quality counters. Rows that
/// cannot become records are counted, never silently dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedData {
    pub records: Vec<NcRecord>,
    pub discarded_rows: usize,
    pub flagged_rows: usize,
}

struct ColumnMap {
    year: usize,
    week: usize,
    source: usize,
    nc_number: usize,
    priority: usize,
    customer: usize,
    issue_type: usize,
    status: usize,
    date_submitted: usize,
    on_time_ship_date: usize,
    quantity_affected: usize,
    cost_of_rework: usize,
    cost_avoided: usize,
    employee_responsible: usize,
    first_article_completed: usize,
}

pub fn normalize(grid: &[Vec<String>]) -> Result<NormalizedData, FetchError> {
    let Some((header, rows)) = grid.split_first() else {
        return Err(FetchError::Schema {
            missing: EXPECTED_COLUMNS.iter().map(|c| c.to_string()).collect(),
        });
    };
    let columns = map_columns(header)?;

    let mut records: Vec<NcRecord> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut discarded_rows = 0usize;
    let mut flagged_rows = 0usize;

    for row in rows {
        let Some((record, flagged)) = parse_row(row, &columns) else {
            discarded_rows += 1;
            continue;
        };
        // NC numbers are unique within a snapshot; first occurrence wins.
        if !seen.insert(record.nc_number.clone()) {
            discarded_rows += 1;
            continue;
        }
        if flagged {
            flagged_rows += 1;
        }
        records.push(record);
    }

    Ok(NormalizedData {
        records,
        discarded_rows,
        flagged_rows,
    })
}

fn map_columns(header: &[String]) -> Result<ColumnMap, FetchError> {
    let mut missing = Vec::new();
    let mut locate = |name: &str| {
        match header
            .iter()
            .position(|cell| cell.trim().eq_ignore_ascii_case(name))
        {
            Some(idx) => idx,
            None => {
                missing.push(name.to_string());
                usize::MAX
            }
        }
    };

    let map = ColumnMap {
        year: locate("Year"),
        week: locate("Week"),
        source: locate("External Or Internal"),
        nc_number: locate("NC Number"),
        priority: locate("Priority"),
        customer: locate("Customer"),
        issue_type: locate("Issue Type"),
        status: locate("Status"),
        date_submitted: locate("Date Submitted"),
        on_time_ship_date: locate("On-Time Ship Date"),
        quantity_affected: locate("Quantity Affected"),
        cost_of_rework: locate("Cost of Rework"),
        cost_avoided: locate("Cost Avoided"),
        employee_responsible: locate("Employee Responsible"),
        first_article_completed: locate("First Article Completed"),
    };

    if missing.is_empty() {
        Ok(map)
    } else {
        Err(FetchError::Schema { missing })
    }
}

fn parse_row(row: &[String], columns: &ColumnMap) -> Option<(NcRecord, bool)> {
    let cell = |idx: usize| row.get(idx).map(|s| s.trim()).unwrap_or("");

    let nc_number = cell(columns.nc_number);
    if nc_number.is_empty() {
        return None;
    }

    let mut flagged = false;

    let (year, bad_year) = parse_int(cell(columns.year));
    let (week, bad_week) = parse_int(cell(columns.week));
    flagged |= bad_year || bad_week;

    let (date_submitted, bad_submitted) = parse_optional_date(cell(columns.date_submitted));
    let (mut on_time_ship_date, bad_ship) = parse_optional_date(cell(columns.on_time_ship_date));
    flagged |= bad_submitted || bad_ship;

    // A ship date earlier than the submission date cannot be real; keep the
    // record, drop the ship date, and flag the row.
    if let (Some(submitted), Some(ship)) = (date_submitted, on_time_ship_date) {
        if ship < submitted {
            on_time_ship_date = None;
            flagged = true;
        }
    }

    let (quantity_affected, bad_quantity) = parse_amount(cell(columns.quantity_affected));
    let (cost_of_rework, bad_rework) = parse_amount(cell(columns.cost_of_rework));
    let (cost_avoided, bad_avoided) = parse_amount(cell(columns.cost_avoided));
    flagged |= bad_quantity || bad_rework || bad_avoided;

    let record = NcRecord {
        year,
        week,
        source: SourceClass::parse(cell(columns.source)),
        nc_number: nc_number.to_string(),
        priority: Priority::parse(cell(columns.priority)),
        customer: non_empty_or(cell(columns.customer), "Unknown"),
        issue_type: non_empty_or(cell(columns.issue_type), "Unknown"),
        status: Status::parse(cell(columns.status)),
        date_submitted,
        on_time_ship_date,
        quantity_affected,
        cost_of_rework,
        cost_avoided,
        employee_responsible: cell(columns.employee_responsible).to_string(),
        first_article_completed: parse_flag(cell(columns.first_article_completed)),
    };

    Some((record, flagged))
}

fn non_empty_or(raw: &str, fallback: &str) -> String {
    if raw.is_empty() {
        fallback.to_string()
    } else {
        raw.to_string()
    }
}

/// Blank is a normal state and stays `None`; non-blank text that matches
/// none of the accepted formats flags the row.
fn parse_optional_date(raw: &str) -> (Option<NaiveDate>, bool) {
    if raw.is_empty() {
        return (None, false);
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return (Some(date), false);
        }
    }
    (None, true)
}

/// Currency/quantity cells. Strips `$`, thousands separators and inner
/// whitespace; blank means zero; malformed or negative values become zero
/// with the row flagged.
fn parse_amount(raw: &str) -> (f64, bool) {
    if raw.is_empty() {
        return (0.0, false);
    }
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    match cleaned.parse::<f64>() {
        Ok(value) if value >= 0.0 && value.is_finite() => (value, false),
        _ => (0.0, true),
    }
}

fn parse_int(raw: &str) -> (Option<i32>, bool) {
    if raw.is_empty() {
        return (None, false);
    }
    match raw.parse::<i32>() {
        Ok(value) => (Some(value), false),
        Err(_) => (None, true),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_lowercase().as_str(),
        "yes" | "y" | "true" | "x" | "1" | "complete"
    )
}
