use std::collections::HashMap;

use crate::models::{NcRecord, PriorityCount, StatusCount, StatusReport};

/// Counts open records per status, with a priority breakdown inside each
/// status. Ordering is deterministic: count descending, then status name
/// ascending.
pub fn track_open_status(records: &[NcRecord]) -> StatusReport {
    let mut by_status: HashMap<String, (usize, HashMap<String, (u8, usize)>)> = HashMap::new();
    let mut total_open = 0usize;

    for record in records {
        if record.status.is_closed() {
            continue;
        }
        total_open += 1;
        let entry = by_status
            .entry(record.status.label().to_string())
            .or_default();
        entry.0 += 1;
        let priority = entry
            .1
            .entry(record.priority.label().to_string())
            .or_insert((record.priority.rank(), 0));
        priority.1 += 1;
    }

    let mut statuses: Vec<StatusCount> = by_status
        .into_iter()
        .map(|(status, (count, priorities))| {
            let mut priorities: Vec<(u8, PriorityCount)> = priorities
                .into_iter()
                .map(|(priority, (rank, count))| (rank, PriorityCount { priority, count }))
                .collect();
            priorities.sort_by(|a, b| {
                a.0.cmp(&b.0)
                    .then_with(|| a.1.priority.cmp(&b.1.priority))
            });
            StatusCount {
                status,
                count,
                priorities: priorities.into_iter().map(|(_, p)| p).collect(),
            }
        })
        .collect();

    statuses.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.status.cmp(&b.status)));

    StatusReport {
        total_open,
        statuses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, SourceClass, Status};

    fn record(nc_number: &str, status: Status, priority: Priority) -> NcRecord {
        NcRecord {
            year: None,
            week: None,
            source: SourceClass::Internal,
            nc_number: nc_number.to_string(),
            priority,
            customer: "Acme Corp".to_string(),
            issue_type: "Quality Defect".to_string(),
            status,
            date_submitted: None,
            on_time_ship_date: None,
            quantity_affected: 0.0,
            cost_of_rework: 0.0,
            cost_avoided: 0.0,
            employee_responsible: String::new(),
            first_article_completed: false,
        }
    }

    #[test]
    fn single_open_record_counts_once() {
        let records = vec![record("NC-001", Status::Open, Priority::High)];
        let report = track_open_status(&records);
        assert_eq!(report.total_open, 1);
        assert_eq!(report.statuses.len(), 1);
        assert_eq!(report.statuses[0].status, "Open");
        assert_eq!(report.statuses[0].count, 1);
    }

    #[test]
    fn closed_records_are_excluded() {
        let records = vec![
            record("NC-001", Status::Open, Priority::High),
            record("NC-002", Status::Closed, Priority::High),
            record("NC-003", Status::Other("Resolved".to_string()), Priority::Low),
        ];
        let report = track_open_status(&records);
        assert_eq!(report.total_open, 1);
        assert_eq!(report.statuses.len(), 1);
    }

    #[test]
    fn statuses_order_by_count_then_name() {
        let records = vec![
            record("NC-001", Status::OnHold, Priority::High),
            record("NC-002", Status::InProgress, Priority::High),
            record("NC-003", Status::Open, Priority::High),
            record("NC-004", Status::Open, Priority::Low),
        ];
        let report = track_open_status(&records);
        let names: Vec<&str> = report.statuses.iter().map(|s| s.status.as_str()).collect();
        // Open leads on count; the one-count statuses tie and fall back to
        // alphabetical order.
        assert_eq!(names, vec!["Open", "In Progress", "On Hold"]);
    }

    #[test]
    fn priority_breakdown_follows_severity_order() {
        let records = vec![
            record("NC-001", Status::Open, Priority::Low),
            record("NC-002", Status::Open, Priority::High),
            record("NC-003", Status::Open, Priority::Medium),
            record("NC-004", Status::Open, Priority::High),
        ];
        let report = track_open_status(&records);
        let breakdown: Vec<(&str, usize)> = report.statuses[0]
            .priorities
            .iter()
            .map(|p| (p.priority.as_str(), p.count))
            .collect();
        assert_eq!(
            breakdown,
            vec![("High", 2), ("Medium", 1), ("Low", 1)]
        );
    }
}
