use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Open,
    InProgress,
    PendingReview,
    OnHold,
    Closed,
    Other(String),
}

impl Status {
    pub fn parse(raw: &str) -> Status {
        let text = raw.trim();
        if text.is_empty() {
            return Status::Other("Unknown".to_string());
        }
        match text.to_lowercase().as_str() {
            "open" => Status::Open,
            "in progress" => Status::InProgress,
            "pending review" => Status::PendingReview,
            "on hold" => Status::OnHold,
            "closed" => Status::Closed,
            _ => Status::Other(text.to_string()),
        }
    }

    /// The sheet sometimes carries "Complete" or "Resolved" instead of
    /// "Closed"; those count as closed for reporting purposes.
    pub fn is_closed(&self) -> bool {
        match self {
            Status::Closed => true,
            Status::Other(text) => {
                matches!(text.to_lowercase().as_str(), "complete" | "resolved" | "done")
            }
            _ => false,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Status::Open => "Open",
            Status::InProgress => "In Progress",
            Status::PendingReview => "Pending Review",
            Status::OnHold => "On Hold",
            Status::Closed => "Closed",
            Status::Other(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Priority {
    High,
    Medium,
    Low,
    Other(String),
}

impl Priority {
    pub fn parse(raw: &str) -> Priority {
        let text = raw.trim();
        if text.is_empty() {
            // blank priority defaults to Medium in the source sheet
            return Priority::Medium;
        }
        match text.to_lowercase().as_str() {
            "high" => Priority::High,
            "medium" => Priority::Medium,
            "low" => Priority::Low,
            _ => Priority::Other(text.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
            Priority::Other(text) => text,
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
            Priority::Other(_) => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceClass {
    External,
    Internal,
    Other(String),
}

impl SourceClass {
    pub fn parse(raw: &str) -> SourceClass {
        let text = raw.trim();
        if text.is_empty() {
            return SourceClass::Other("Unknown".to_string());
        }
        match text.to_lowercase().as_str() {
            "external" => SourceClass::External,
            "internal" => SourceClass::Internal,
            _ => SourceClass::Other(text.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SourceClass::External => "External",
            SourceClass::Internal => "Internal",
            SourceClass::Other(text) => text,
        }
    }
}

/// One non-conformance event, as normalized from a sheet row.
#[derive(Debug, Clone, PartialEq)]
pub struct NcRecord {
    pub year: Option<i32>,
    pub week: Option<i32>,
    pub source: SourceClass,
    pub nc_number: String,
    pub priority: Priority,
    pub customer: String,
    pub issue_type: String,
    pub status: Status,
    pub date_submitted: Option<NaiveDate>,
    pub on_time_ship_date: Option<NaiveDate>,
    pub quantity_affected: f64,
    pub cost_of_rework: f64,
    pub cost_avoided: f64,
    pub employee_responsible: String,
    pub first_article_completed: bool,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub total_open: usize,
    pub statuses: Vec<StatusCount>,
}

#[derive(Debug, Clone)]
pub struct StatusCount {
    pub status: String,
    pub count: usize,
    pub priorities: Vec<PriorityCount>,
}

#[derive(Debug, Clone)]
pub struct PriorityCount {
    pub priority: String,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct AgingReport {
    pub open_count: usize,
    pub missing_date_count: usize,
    pub buckets: Vec<AgingBucket>,
    pub mean_age: f64,
    pub median_age: f64,
    pub max_age: i64,
    pub critical: Vec<CriticalNc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgingBucket {
    pub bucket: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriticalNc {
    pub nc_number: String,
    pub customer: String,
    pub issue_type: String,
    pub status: String,
    pub age_days: i64,
    pub cost_of_rework: f64,
}

#[derive(Debug, Clone)]
pub struct CostReport {
    pub periods: Vec<CostPoint>,
    pub missing_date_count: usize,
    pub rework: CostStats,
    pub avoided: CostStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostPoint {
    pub start: NaiveDate,
    pub label: String,
    pub count: usize,
    pub rework_total: f64,
    pub avoided_total: f64,
    /// Trailing moving averages over the period series.
    pub rework_avg: f64,
    pub avoided_avg: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CostStats {
    pub total: f64,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    pub with_cost: usize,
}

#[derive(Debug, Clone)]
pub struct CustomerReport {
    pub rows: Vec<CustomerRow>,
    pub total_count: usize,
    pub concentration_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerRow {
    pub customer: String,
    pub count: usize,
    pub rework_total: f64,
    pub avoided_total: f64,
    pub quantity_total: f64,
    pub cumulative_pct: f64,
    /// Part of the customer set covering the first 80% of NC count.
    pub concentration: bool,
}

#[derive(Debug, Clone)]
pub struct ParetoReport {
    pub rows: Vec<ParetoRow>,
    pub total_count: usize,
    pub vital_few: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParetoRow {
    pub issue_type: String,
    pub count: usize,
    pub pct: f64,
    pub cumulative_pct: f64,
    pub rework_total: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_known_and_unknown() {
        assert_eq!(Status::parse("Open"), Status::Open);
        assert_eq!(Status::parse("in progress"), Status::InProgress);
        assert_eq!(Status::parse("CLOSED"), Status::Closed);
        assert_eq!(
            Status::parse("Awaiting Parts"),
            Status::Other("Awaiting Parts".to_string())
        );
        assert_eq!(Status::parse("  ").label(), "Unknown");
    }

    #[test]
    fn closed_synonyms_count_as_closed() {
        assert!(Status::parse("Closed").is_closed());
        assert!(Status::parse("Complete").is_closed());
        assert!(Status::parse("resolved").is_closed());
        assert!(!Status::parse("Open").is_closed());
        assert!(!Status::parse("Awaiting Parts").is_closed());
    }

    #[test]
    fn blank_priority_defaults_to_medium() {
        assert_eq!(Priority::parse(""), Priority::Medium);
        assert_eq!(Priority::parse("high"), Priority::High);
        assert_eq!(
            Priority::parse("Urgent"),
            Priority::Other("Urgent".to_string())
        );
    }

    #[test]
    fn source_class_labels() {
        assert_eq!(SourceClass::parse("external").label(), "External");
        assert_eq!(SourceClass::parse("Internal").label(), "Internal");
        assert_eq!(SourceClass::parse("").label(), "Unknown");
    }
}
