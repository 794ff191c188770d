use serde::Serialize;

/// Per-table row counts for one sync run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TableCounts {
    pub search_jobs: u64,
    pub price_observations: u64,
    pub price_history: u64,
}

impl TableCounts {
    pub fn total(&self) -> u64 {
        self.search_jobs + self.price_observations + self.price_history
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedReason {
    /// No destination property carries the name.
    NoDestinationMatch,
    /// Another source property of the hotel already claimed the trimmed name.
    DuplicateSourceName,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UnmappedProperty {
    pub source_property_id: i64,
    pub name: String,
    pub reason: UnmappedReason,
}

/// Operator-facing summary of a sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub hotel_id: i64,
    pub deleted: TableCounts,
    pub inserted: TableCounts,
    pub skipped: TableCounts,
    pub unmapped: Vec<UnmappedProperty>,
}
