use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

use crate::cache::Snapshot;
use crate::cost::Period;
use crate::filter::{self, Filters, SourceFilter};
use crate::models::{AgingReport, CostReport, CustomerReport, NcRecord, ParetoReport};
use crate::{aging, cost, customer, pareto, status};

/// Renders every analysis into one markdown document. Pure: the same
/// snapshot, filters and reference date produce the same text.
pub fn build_report(
    snapshot: &Snapshot,
    filters: &Filters,
    period: Period,
    window: usize,
    as_of: NaiveDate,
) -> String {
    let records = filter::apply(&snapshot.records, filters);
    let status_report = status::track_open_status(&records);
    let aging_report = aging::analyze_aging(&records, as_of);
    let cost_report = cost::analyze_costs(&records, period, window);
    let customer_report = customer::analyze_customers(&records);
    let pareto_report = pareto::analyze_issue_types(&records);

    let mut output = String::new();

    let _ = writeln!(output, "# Non-Conformance Quality Report");
    let _ = writeln!(
        output,
        "Generated {} over {} records (fetched {})",
        as_of,
        records.len(),
        snapshot.fetched_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output, "Scope: {}{}", source_label(filters.source), range_label(filters));

    if snapshot.discarded_rows > 0 || snapshot.flagged_rows > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Data quality: {} rows discarded, {} rows flagged during normalization.",
            snapshot.discarded_rows, snapshot.flagged_rows
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Open NC Status");

    if status_report.statuses.is_empty() {
        let _ = writeln!(output, "No open non-conformances in this selection.");
    } else {
        for entry in &status_report.statuses {
            let priorities = entry
                .priorities
                .iter()
                .map(|p| format!("{} {}", p.priority, p.count))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                output,
                "- {}: {} ({})",
                entry.status, entry.count, priorities
            );
        }
        let _ = writeln!(output, "Total open: {}", status_report.total_open);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Aging");

    for bucket in &aging_report.buckets {
        let _ = writeln!(output, "- {}: {}", bucket.bucket, bucket.count);
    }
    let _ = writeln!(
        output,
        "Mean age {:.1} days, median {:.1}, oldest {}.",
        aging_report.mean_age, aging_report.median_age, aging_report.max_age
    );
    if aging_report.missing_date_count > 0 {
        let _ = writeln!(
            output,
            "{} open NCs have no submission date and were not aged.",
            aging_report.missing_date_count
        );
    }
    if !aging_report.critical.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### Critical (91+ days)");
        for critical in aging_report.critical.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) {} days open, rework ${:.2}",
                critical.nc_number,
                critical.customer,
                critical.issue_type,
                critical.age_days,
                critical.cost_of_rework
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Costs by {}", period_label(period));

    if cost_report.periods.is_empty() {
        let _ = writeln!(output, "No dated records carry costs in this selection.");
    } else {
        for point in &cost_report.periods {
            let _ = writeln!(
                output,
                "- {}: rework ${:.2} (avg ${:.2}), avoided ${:.2} (avg ${:.2}), {} NCs",
                point.label,
                point.rework_total,
                point.rework_avg,
                point.avoided_total,
                point.avoided_avg,
                point.count
            );
        }
        let _ = writeln!(
            output,
            "Rework total ${:.2} ({} NCs with cost); avoided total ${:.2} ({} NCs).",
            cost_report.rework.total,
            cost_report.rework.with_cost,
            cost_report.avoided.total,
            cost_report.avoided.with_cost
        );
    }
    if cost_report.missing_date_count > 0 {
        let _ = writeln!(
            output,
            "{} records had no submission date and were left out of the trend.",
            cost_report.missing_date_count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Customers");

    if customer_report.rows.is_empty() {
        let _ = writeln!(output, "No records in this selection.");
    } else {
        for row in customer_report.rows.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {} NCs ({:.1}% cumulative), rework ${:.2}, avoided ${:.2}",
                row.customer, row.count, row.cumulative_pct, row.rework_total, row.avoided_total
            );
        }
        let _ = writeln!(
            output,
            "{} of {} customers account for 80% of all NCs.",
            customer_report.concentration_count,
            customer_report.rows.len()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Issue Type Pareto");

    if pareto_report.rows.is_empty() {
        let _ = writeln!(output, "No records in this selection.");
    } else {
        for row in &pareto_report.rows {
            let _ = writeln!(
                output,
                "- {}: {} ({:.1}%, cumulative {:.1}%)",
                row.issue_type, row.count, row.pct, row.cumulative_pct
            );
        }
        let _ = writeln!(
            output,
            "{} of {} issue types account for 80% of all NCs.",
            pareto_report.vital_few,
            pareto_report.rows.len()
        );
    }

    output
}

fn source_label(source: SourceFilter) -> &'static str {
    match source {
        SourceFilter::All => "all sources",
        SourceFilter::External => "external only",
        SourceFilter::Internal => "internal only",
    }
}

fn range_label(filters: &Filters) -> String {
    match (filters.start, filters.end) {
        (None, None) => String::new(),
        (Some(start), None) => format!(", submitted on or after {start}"),
        (None, Some(end)) => format!(", submitted on or before {end}"),
        (Some(start), Some(end)) => format!(", submitted {start} to {end}"),
    }
}

fn period_label(period: Period) -> &'static str {
    match period {
        Period::Daily => "day",
        Period::Weekly => "week",
        Period::Monthly => "month",
        Period::Quarterly => "quarter",
        Period::Yearly => "year",
    }
}

/// Flat row shape for the normalized-records CSV, mirroring the sheet
/// columns with typed values.
#[derive(Debug, Serialize)]
pub struct RecordRow {
    pub nc_number: String,
    pub year: Option<i32>,
    pub week: Option<i32>,
    pub source: String,
    pub priority: String,
    pub customer: String,
    pub issue_type: String,
    pub status: String,
    pub date_submitted: Option<NaiveDate>,
    pub on_time_ship_date: Option<NaiveDate>,
    pub quantity_affected: f64,
    pub cost_of_rework: f64,
    pub cost_avoided: f64,
    pub employee_responsible: String,
    pub first_article_completed: bool,
}

pub fn record_rows(records: &[NcRecord]) -> Vec<RecordRow> {
    records
        .iter()
        .map(|record| RecordRow {
            nc_number: record.nc_number.clone(),
            year: record.year,
            week: record.week,
            source: record.source.label().to_string(),
            priority: record.priority.label().to_string(),
            customer: record.customer.clone(),
            issue_type: record.issue_type.clone(),
            status: record.status.label().to_string(),
            date_submitted: record.date_submitted,
            on_time_ship_date: record.on_time_ship_date,
            quantity_affected: record.quantity_affected,
            cost_of_rework: record.cost_of_rework,
            cost_avoided: record.cost_avoided,
            employee_responsible: record.employee_responsible.clone(),
            first_article_completed: record.first_article_completed,
        })
        .collect()
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the normalized records plus one CSV per aggregate table and
/// returns the created paths.
pub fn export_tables(
    dir: &Path,
    records: &[NcRecord],
    aging: &AgingReport,
    cost: &CostReport,
    customers: &CustomerReport,
    pareto: &ParetoReport,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let mut written = Vec::new();

    let path = dir.join("nc_records.csv");
    write_csv(&path, &record_rows(records))?;
    written.push(path);

    let path = dir.join("nc_aging_buckets.csv");
    write_csv(&path, &aging.buckets)?;
    written.push(path);

    let path = dir.join("nc_aging_critical.csv");
    write_csv(&path, &aging.critical)?;
    written.push(path);

    let path = dir.join("nc_cost_trend.csv");
    write_csv(&path, &cost.periods)?;
    written.push(path);

    let path = dir.join("nc_customers.csv");
    write_csv(&path, &customers.rows)?;
    written.push(path);

    let path = dir.join("nc_pareto.csv");
    write_csv(&path, &pareto.rows)?;
    written.push(path);

    Ok(written)
}
