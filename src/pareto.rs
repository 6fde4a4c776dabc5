use std::collections::HashMap;

use crate::models::{NcRecord, ParetoReport, ParetoRow};

const VITAL_FEW_THRESHOLD_PCT: f64 = 80.0;

/// Ranks issue types by frequency with cumulative percentages. The
/// cumulative series is non-decreasing and reaches 100% on the last row;
/// `vital_few` is the length of the prefix that first covers 80% of all
/// NCs.
pub fn analyze_issue_types(records: &[NcRecord]) -> ParetoReport {
    let mut by_issue: HashMap<String, (usize, f64)> = HashMap::new();
    for record in records {
        let entry = by_issue.entry(record.issue_type.clone()).or_default();
        entry.0 += 1;
        entry.1 += record.cost_of_rework;
    }

    let total_count = records.len();
    let mut rows: Vec<ParetoRow> = by_issue
        .into_iter()
        .map(|(issue_type, (count, rework_total))| ParetoRow {
            issue_type,
            count,
            pct: share(count, total_count),
            cumulative_pct: 0.0,
            rework_total,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.issue_type.cmp(&b.issue_type))
    });

    // Cumulative percentages come from the running count, not from adding
    // up rounded per-row shares, so the series ends at exactly 100.
    let mut running = 0usize;
    let mut vital_few = 0usize;
    for row in rows.iter_mut() {
        let before = share(running, total_count);
        running += row.count;
        row.cumulative_pct = share(running, total_count);
        if before < VITAL_FEW_THRESHOLD_PCT {
            vital_few += 1;
        }
    }

    ParetoReport {
        rows,
        total_count,
        vital_few,
    }
}

fn share(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
