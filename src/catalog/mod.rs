//! Catalog types shared by the crawler, the store and the notifier
//!
//! # Components
//!
//! - `CatalogEntry`: one entry discovered on a listing page, before persistence
//! - `PersistedRecord`: the long-lived row the store keeps per logical entry
//! - `DedupResult` / `UpsertOutcome`: how an entry was classified by the store
//! - `CycleStats` / `CycleCounters`: per-cycle counters and progress position

mod entry;
mod stats;

pub use entry::{identity_from_url, CatalogEntry, DedupResult, PersistedRecord, UpsertOutcome};
pub use stats::{CycleCounters, CycleStats};
