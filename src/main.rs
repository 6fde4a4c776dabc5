use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

mod aging;
mod cache;
mod config;
mod cost;
mod customer;
mod error;
mod filter;
mod models;
mod normalize;
mod pareto;
mod report;
mod sheets;
mod status;

use cache::DataCache;
use config::Config;
use cost::Period;
use filter::{Filters, SourceFilter};
use sheets::SheetsClient;

#[derive(Parser)]
#[command(name = "nc-report")]
#[command(about = "Non-conformance quality reporting from a shared spreadsheet", long_about = None)]
struct Cli {
    /// Refetch from the spreadsheet even if the cached snapshot is fresh
    #[arg(long, global = true)]
    refresh: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    /// Earliest submission date to include (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Latest submission date to include (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Restrict to external or internal non-conformances
    #[arg(long, value_enum, default_value = "all")]
    source: SourceFilter,
}

impl FilterArgs {
    fn to_filters(&self) -> Filters {
        Filters {
            start: self.start,
            end: self.end,
            source: self.source,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show open NC counts by status and priority
    Status {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Show aging buckets and the critical list
    Aging {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Show cost totals per period with a trailing moving average
    Cost {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum, default_value = "monthly")]
        period: Period,
        #[arg(long, default_value_t = cost::DEFAULT_MOVING_AVERAGE_WINDOW)]
        window: usize,
    },
    /// Show NC counts and costs per customer
    Customers {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Rank issue types with cumulative percentages
    Pareto {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Write a combined markdown report
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum, default_value = "monthly")]
        period: Period,
        #[arg(long, default_value_t = cost::DEFAULT_MOVING_AVERAGE_WINDOW)]
        window: usize,
        #[arg(long, default_value = "nc_report.md")]
        out: PathBuf,
    },
    /// Export the aggregate tables as CSV files
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum, default_value = "monthly")]
        period: Period,
        #[arg(long, default_value_t = cost::DEFAULT_MOVING_AVERAGE_WINDOW)]
        window: usize,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).compact().init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let key = config.load_service_account_key()?;
    let client = SheetsClient::new(key, config.fetch_timeout)?;
    let cache = DataCache::new(client, config.cache_ttl);

    let snapshot = if cli.refresh {
        cache
            .force_refresh(&config.spreadsheet_id, &config.sheet_name)
            .await?
    } else {
        cache.get(&config.spreadsheet_id, &config.sheet_name).await?
    };

    if snapshot.discarded_rows > 0 || snapshot.flagged_rows > 0 {
        println!(
            "Note: {} rows discarded, {} rows flagged during normalization.",
            snapshot.discarded_rows, snapshot.flagged_rows
        );
    }

    let today = Utc::now().date_naive();

    match cli.command {
        Commands::Status { filters } => {
            let records = filter::apply(&snapshot.records, &filters.to_filters());
            let tracker = status::track_open_status(&records);
            if tracker.statuses.is_empty() {
                println!("No open non-conformances in this selection.");
                return Ok(());
            }
            println!("Open NCs by status:");
            for entry in &tracker.statuses {
                let priorities = entry
                    .priorities
                    .iter()
                    .map(|p| format!("{} {}", p.priority, p.count))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("- {}: {} ({})", entry.status, entry.count, priorities);
            }
            println!("Total open: {}", tracker.total_open);
        }
        Commands::Aging { filters } => {
            let records = filter::apply(&snapshot.records, &filters.to_filters());
            let aging_report = aging::analyze_aging(&records, today);
            println!("Aging of open NCs (as of {today}):");
            for bucket in &aging_report.buckets {
                println!("- {}: {}", bucket.bucket, bucket.count);
            }
            println!(
                "Mean age {:.1} days, median {:.1}, oldest {}.",
                aging_report.mean_age, aging_report.median_age, aging_report.max_age
            );
            if aging_report.missing_date_count > 0 {
                println!(
                    "{} open NCs have no submission date and were not aged.",
                    aging_report.missing_date_count
                );
            }
            if !aging_report.critical.is_empty() {
                println!("Critical (91+ days):");
                for critical in aging_report.critical.iter().take(10) {
                    println!(
                        "- {} ({}, {}) {} days open, rework ${:.2}",
                        critical.nc_number,
                        critical.customer,
                        critical.issue_type,
                        critical.age_days,
                        critical.cost_of_rework
                    );
                }
            }
        }
        Commands::Cost {
            filters,
            period,
            window,
        } => {
            let records = filter::apply(&snapshot.records, &filters.to_filters());
            let cost_report = cost::analyze_costs(&records, period, window);
            if cost_report.periods.is_empty() {
                println!("No dated records in this selection.");
                return Ok(());
            }
            println!("Cost trend ({window}-period moving average):");
            for point in &cost_report.periods {
                println!(
                    "- {}: rework ${:.2} (avg ${:.2}), avoided ${:.2} (avg ${:.2}), {} NCs",
                    point.label,
                    point.rework_total,
                    point.rework_avg,
                    point.avoided_total,
                    point.avoided_avg,
                    point.count
                );
            }
            println!(
                "Rework total ${:.2} ({} NCs with cost); avoided total ${:.2} ({} NCs).",
                cost_report.rework.total,
                cost_report.rework.with_cost,
                cost_report.avoided.total,
                cost_report.avoided.with_cost
            );
            if cost_report.missing_date_count > 0 {
                println!(
                    "{} records had no submission date and were left out.",
                    cost_report.missing_date_count
                );
            }
        }
        Commands::Customers { filters, limit } => {
            let records = filter::apply(&snapshot.records, &filters.to_filters());
            let customer_report = customer::analyze_customers(&records);
            if customer_report.rows.is_empty() {
                println!("No records in this selection.");
                return Ok(());
            }
            println!("Top customers by NC count:");
            for row in customer_report.rows.iter().take(limit) {
                println!(
                    "- {}: {} NCs ({:.1}% cumulative), rework ${:.2}, avoided ${:.2}",
                    row.customer,
                    row.count,
                    row.cumulative_pct,
                    row.rework_total,
                    row.avoided_total
                );
            }
            println!(
                "{} of {} customers account for 80% of all NCs.",
                customer_report.concentration_count,
                customer_report.rows.len()
            );
        }
        Commands::Pareto { filters } => {
            let records = filter::apply(&snapshot.records, &filters.to_filters());
            let pareto_report = pareto::analyze_issue_types(&records);
            if pareto_report.rows.is_empty() {
                println!("No records in this selection.");
                return Ok(());
            }
            println!("Issue types by frequency:");
            for row in &pareto_report.rows {
                println!(
                    "- {}: {} ({:.1}%, cumulative {:.1}%)",
                    row.issue_type, row.count, row.pct, row.cumulative_pct
                );
            }
            println!(
                "{} of {} issue types account for 80% of all NCs.",
                pareto_report.vital_few,
                pareto_report.rows.len()
            );
        }
        Commands::Report {
            filters,
            period,
            window,
            out,
        } => {
            let text =
                report::build_report(&snapshot, &filters.to_filters(), period, window, today);
            std::fs::write(&out, text)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            filters,
            period,
            window,
            dir,
        } => {
            let records = filter::apply(&snapshot.records, &filters.to_filters());
            let aging_report = aging::analyze_aging(&records, today);
            let cost_report = cost::analyze_costs(&records, period, window);
            let customer_report = customer::analyze_customers(&records);
            let pareto_report = pareto::analyze_issue_types(&records);
            let written = report::export_tables(
                &dir,
                &records,
                &aging_report,
                &cost_report,
                &customer_report,
                &pareto_report,
            )?;
            for path in &written {
                println!("Wrote {}.", path.display());
            }
        }
    }

    Ok(())
}
