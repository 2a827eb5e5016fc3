//! Output module for human-readable reports
//!
//! This module handles:
//! - Printing the summary of a finished crawl cycle
//! - Printing store statistics and the cycle history

pub mod stats;

pub use stats::{format_statistics, load_statistics, print_statistics, StoreStatistics};

use crate::catalog::CycleStats;

/// Prints a cycle summary to stdout
pub fn print_cycle_summary(stats: &CycleStats) {
    print!("{}", format_cycle_summary(stats));
}

pub fn format_cycle_summary(stats: &CycleStats) -> String {
    let mut out = String::from("=== Crawl Cycle Summary ===\n\n");

    let outcome = if stats.cancelled {
        "cancelled"
    } else {
        "completed"
    };
    out.push_str(&format!("Status: {}\n", outcome));

    if let Some(elapsed) = stats.elapsed() {
        out.push_str(&format!("Duration: {}s\n", elapsed.num_seconds()));
    }
    if let Some(key) = &stats.index_key {
        out.push_str(&format!(
            "Last position: key '{}', page {}\n",
            key, stats.page_number
        ));
    }

    out.push_str(&format!("\nEntries seen: {}\n", stats.total_seen));
    out.push_str(&format!("  New: {}\n", stats.new_count));
    out.push_str(&format!("  Updated: {}\n", stats.updated_count));
    out.push_str(&format!("  Skipped: {}\n", stats.skipped_count));
    out.push_str(&format!("  Errors: {}\n", stats.error_count));

    match stats.total_records {
        Some(total) => out.push_str(&format!("\nRecords stored: {}\n", total)),
        None => out.push_str("\nRecords stored: unknown\n"),
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_summary() {
        let stats = CycleStats {
            total_seen: 10,
            new_count: 2,
            updated_count: 8,
            index_key: Some("я".to_string()),
            page_number: 3,
            total_records: Some(120),
            ..CycleStats::default()
        };

        let text = format_cycle_summary(&stats);

        assert!(text.contains("Status: completed"));
        assert!(text.contains("Last position: key 'я', page 3"));
        assert!(text.contains("  New: 2\n"));
        assert!(text.contains("Records stored: 120"));
    }

    #[test]
    fn test_cancelled_summary() {
        let stats = CycleStats {
            cancelled: true,
            ..CycleStats::default()
        };

        let text = format_cycle_summary(&stats);

        assert!(text.contains("Status: cancelled"));
        assert!(text.contains("Records stored: unknown"));
    }
}
