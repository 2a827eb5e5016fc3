//! Statistics generation from the catalog database
//!
//! This module provides functionality for extracting and displaying
//! store statistics: how many records are kept and how recent cycles went.

use crate::storage::{CycleRecord, SqliteStore, StoreResult};

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Total number of persisted records
    pub total_records: u64,

    /// Most recent cycles, newest first
    pub recent_cycles: Vec<CycleRecord>,
}

/// Loads statistics from the store
///
/// # Arguments
///
/// * `store` - The store to query
/// * `cycle_limit` - How many recent cycles to include
pub fn load_statistics(store: &SqliteStore, cycle_limit: usize) -> StoreResult<StoreStatistics> {
    Ok(StoreStatistics {
        total_records: store.count_records()?,
        recent_cycles: store.recent_cycles(cycle_limit)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    print!("{}", format_statistics(stats));
}

pub fn format_statistics(stats: &StoreStatistics) -> String {
    let mut out = String::from("=== Catalog Statistics ===\n\n");
    out.push_str(&format!("Records stored: {}\n\n", stats.total_records));

    if stats.recent_cycles.is_empty() {
        out.push_str("No crawl cycles recorded yet\n");
        return out;
    }

    out.push_str(&format!("Recent Cycles ({}):\n", stats.recent_cycles.len()));
    for cycle in &stats.recent_cycles {
        out.push_str(&format!(
            "  #{} {} [{}]: {} seen, {} new, {} updated, {} skipped, {} errors\n",
            cycle.id,
            cycle.started_at,
            cycle.status.to_db_string(),
            cycle.total_seen,
            cycle.new_count,
            cycle.updated_count,
            cycle.skipped_count,
            cycle.error_count
        ));
    }

    // Discovery rate over the listed cycles
    let new_total: u64 = stats.recent_cycles.iter().map(|c| c.new_count).sum();
    out.push_str(&format!(
        "\nNew entries across listed cycles: {}\n",
        new_total
    ));

    out
}
