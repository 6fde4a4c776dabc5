use chrono::NaiveDate;

use crate::models::{AgingBucket, AgingReport, CriticalNc, NcRecord};

pub const BUCKET_LABELS: [&str; 4] = ["0-30 days", "31-60 days", "61-90 days", "91+ days"];

/// Days an NC has to sit open before it lands on the critical list.
const CRITICAL_AGE_DAYS: i64 = 91;

/// Ages open records against `as_of`. Records without a submission date
/// cannot be aged; they are excluded from the buckets and reported in
/// `missing_date_count` so the four bucket counts always sum to
/// `open_count - missing_date_count`.
pub fn analyze_aging(records: &[NcRecord], as_of: NaiveDate) -> AgingReport {
    let mut bucket_counts = [0usize; 4];
    let mut ages: Vec<i64> = Vec::new();
    let mut critical: Vec<CriticalNc> = Vec::new();
    let mut open_count = 0usize;
    let mut missing_date_count = 0usize;

    for record in records {
        if record.status.is_closed() {
            continue;
        }
        open_count += 1;
        let Some(submitted) = record.date_submitted else {
            missing_date_count += 1;
            continue;
        };
        // Future-dated submissions age as zero days.
        let age = (as_of - submitted).num_days().max(0);
        bucket_counts[bucket_index(age)] += 1;
        ages.push(age);

        if age >= CRITICAL_AGE_DAYS {
            critical.push(CriticalNc {
                nc_number: record.nc_number.clone(),
                customer: record.customer.clone(),
                issue_type: record.issue_type.clone(),
                status: record.status.label().to_string(),
                age_days: age,
                cost_of_rework: record.cost_of_rework,
            });
        }
    }

    critical.sort_by(|a, b| {
        b.age_days
            .cmp(&a.age_days)
            .then_with(|| a.nc_number.cmp(&b.nc_number))
    });

    let buckets = BUCKET_LABELS
        .into_iter()
        .zip(bucket_counts)
        .map(|(bucket, count)| AgingBucket { bucket, count })
        .collect();

    AgingReport {
        open_count,
        missing_date_count,
        buckets,
        mean_age: mean(&ages),
        median_age: median(&ages),
        max_age: ages.iter().copied().max().unwrap_or(0),
        critical,
    }
}

fn bucket_index(age: i64) -> usize {
    match age {
        0..=30 => 0,
        31..=60 => 1,
        61..=90 => 2,
        _ => 3,
    }
}

fn mean(ages: &[i64]) -> f64 {
    if ages.is_empty() {
        return 0.0;
    }
    ages.iter().sum::<i64>() as f64 / ages.len() as f64
}

fn median(ages: &[i64]) -> f64 {
    if ages.is_empty() {
        return 0.0;
    }
    let mut sorted = ages.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid] as f64
    } else {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    }
}
