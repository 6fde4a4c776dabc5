use std::collections::HashMap;

use crate::models::{CustomerReport, CustomerRow, NcRecord};

const CONCENTRATION_THRESHOLD_PCT: f64 = 80.0;

/// Per-customer NC counts and cost totals, sorted by count descending
/// with an alphabetical tie-break. The concentration flag marks the
/// smallest leading set of customers covering at least 80% of all NCs.
pub fn analyze_customers(records: &[NcRecord]) -> CustomerReport {
    #[derive(Default)]
    struct Acc {
        count: usize,
        rework: f64,
        avoided: f64,
        quantity: f64,
    }

    let mut by_customer: HashMap<String, Acc> = HashMap::new();
    for record in records {
        let entry = by_customer.entry(record.customer.clone()).or_default();
        entry.count += 1;
        entry.rework += record.cost_of_rework;
        entry.avoided += record.cost_avoided;
        entry.quantity += record.quantity_affected;
    }

    let total_count: usize = records.len();
    let mut rows: Vec<CustomerRow> = by_customer
        .into_iter()
        .map(|(customer, acc)| CustomerRow {
            customer,
            count: acc.count,
            rework_total: acc.rework,
            avoided_total: acc.avoided,
            quantity_total: acc.quantity,
            cumulative_pct: 0.0,
            concentration: false,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.customer.cmp(&b.customer))
    });

    let mut running = 0usize;
    let mut concentration_count = 0usize;
    for row in rows.iter_mut() {
        // The row that crosses the threshold still belongs to the set.
        let before_pct = pct(running, total_count);
        running += row.count;
        row.cumulative_pct = pct(running, total_count);
        if before_pct < CONCENTRATION_THRESHOLD_PCT {
            row.concentration = true;
            concentration_count += 1;
        }
    }

    CustomerReport {
        rows,
        total_count,
        concentration_count,
    }
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
