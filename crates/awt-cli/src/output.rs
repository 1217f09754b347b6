//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chrono::{DateTime, Utc};

use awt_core::sync::{SyncOutcome, SyncReport, SyncStatus};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the result of a sync run
    pub fn print_report(&self, report: &SyncReport) {
        match self.format {
            OutputFormat::Human => {
                println!("Mode:     {}", report.mode);
                println!(
                    "Window:   {} to {}",
                    report.window.start_date(),
                    report.window.end_date()
                );
                println!("Fetched:  {} record(s)", report.records_fetched);
                println!("Result:   {}", describe_outcome(&report.outcome));
                if report.bytes_persisted() > 0 {
                    println!("Written:  {} bytes", report.bytes_persisted());
                }
            }
            OutputFormat::Json => {
                let mut value = serde_json::to_value(report).unwrap_or_default();
                if let Some(map) = value.as_object_mut() {
                    map.insert(
                        "bytes_persisted".to_string(),
                        report.bytes_persisted().into(),
                    );
                }
                println!("{}", value);
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a snapshot of the persisted sync state
    pub fn print_status(&self, status: &SyncStatus) {
        match self.format {
            OutputFormat::Human => {
                println!("AWT Sync Status");
                println!("===============");
                println!();
                println!("Storage:");
                match (&status.location, &status.unavailable_reason) {
                    (Some(location), _) => println!("  Location: {}", location),
                    (None, Some(reason)) => println!("  Disabled: {}", reason),
                    (None, None) => println!("  Disabled"),
                }
                println!();
                println!("Sync:");
                println!("  Next run:        {}", status.next_mode);
                println!(
                    "  First completed: {}",
                    format_time(status.first_run_completed_at)
                );
                println!("  Last sync:       {}", format_time(status.last_sync_time));
                println!();
                println!("Dataset:");
                match status.cumulative_records {
                    Some(count) => println!("  Records: {}", count),
                    None => println!("  Records: (none)"),
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(status).unwrap_or_default()
                );
            }
            OutputFormat::Quiet => {
                println!("{}", status.next_mode);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json | OutputFormat::Quiet => {}
        }
    }

    /// Print a warning the operator should see even without logs
    pub fn warning(&self, message: &str) {
        if self.format == OutputFormat::Human {
            println!("⚠ {}", message);
        }
    }
}

/// One-line description of a sync outcome
pub fn describe_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::NoData => "no new data".to_string(),
        SyncOutcome::StorageDisabled => "storage disabled, data not persisted".to_string(),
        SyncOutcome::Seeded { key, .. } => format!("seeded {}", key),
        SyncOutcome::Appended {
            key, total_records, ..
        } => format!("appended to {} ({} records total)", key, total_records),
        SyncOutcome::FallbackWritten { key, .. } => {
            format!("merge failed, new data written to {}", key)
        }
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "(never)".to_string())
}
