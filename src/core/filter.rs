// StockScan - core/filter.rs
//
// Search projection over the working set. A pure read-time view: returns
// indices of matching records and never mutates the store. Recomputed on
// every keystroke by the composition layer.

use crate::core::model::StockRecord;

/// Which fields a search query is matched against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// Every displayed field.
    #[default]
    All,
    /// One column, by its display name (e.g. "Reference", "N_CHASSIS").
    Column(String),
}

/// Apply a case-insensitive substring search, returning indices into
/// `records`.
///
/// An empty query matches everything. An unknown column name in
/// `SearchScope::Column` matches nothing — the caller picked the name from
/// the record's own column list, so this only happens on a stale scope
/// after a mode switch.
pub fn search_indices<R: StockRecord>(
    records: &[R],
    query: &str,
    scope: &SearchScope,
) -> Vec<usize> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return (0..records.len()).collect();
    }

    records
        .iter()
        .enumerate()
        .filter(|(_, record)| matches(*record, &needle, scope))
        .map(|(idx, _)| idx)
        .collect()
}

fn matches<R: StockRecord>(record: &R, needle: &str, scope: &SearchScope) -> bool {
    match scope {
        SearchScope::All => record
            .fields()
            .iter()
            .any(|(_, value)| value.to_lowercase().contains(needle)),
        SearchScope::Column(name) => record
            .fields()
            .iter()
            .find(|(column, _)| column == name)
            .is_some_and(|(_, value)| value.to_lowercase().contains(needle)),
    }
}
