// StockScan - core/store.rs
//
// In-memory record store: an ordered working set with stable ids, duplicate
// detection on the record's dedup key, and a configurable reconciliation
// policy. Append-order is preserved; edits and deletes go through RecordId.
// No I/O — the workbook codec and the session layer move data in and out.

use crate::core::model::{RecordId, StockRecord};
use crate::util::constants;

// =============================================================================
// Merge policy
// =============================================================================

/// What happens when a scan's dedup key already exists in the working set.
///
/// The two deployed application variants never agreed on this: the legacy
/// scanner merged quantities, the later one rejected the scan. Both are
/// kept selectable; the configured default is `RejectDuplicate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Add the new scan's quantity onto the existing record.
    IncrementQuantity,
    /// Refuse the new scan and leave the working set unchanged.
    #[default]
    RejectDuplicate,
}

impl MergePolicy {
    /// Parse the config-file spelling. Unknown strings yield `None` so the
    /// config layer can warn and fall back.
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "increment" => Some(Self::IncrementQuantity),
            "reject" => Some(Self::RejectDuplicate),
            _ => None,
        }
    }
}

// =============================================================================
// Insertion outcome
// =============================================================================

/// Result of offering a record to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A new record was appended.
    Added { id: RecordId },
    /// The key already existed; quantities were merged (policy A).
    Merged { id: RecordId, quantite: u32 },
    /// The key already existed; the scan was refused (policy B).
    Duplicate { id: RecordId, key: String },
    /// The working set is at capacity; nothing was inserted.
    Full { max: usize },
}

// =============================================================================
// Store
// =============================================================================

/// Ordered working set of one record shape.
#[derive(Debug)]
pub struct RecordStore<R: StockRecord> {
    records: Vec<R>,
    next_id: u64,
    policy: MergePolicy,
    capacity: usize,
}

impl<R: StockRecord> RecordStore<R> {
    pub fn new(policy: MergePolicy) -> Self {
        Self::with_capacity(policy, constants::MAX_RECORDS)
    }

    /// Store with an explicit record cap (tests shrink it).
    pub fn with_capacity(policy: MergePolicy, capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
            policy,
            capacity,
        }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: MergePolicy) {
        self.policy = policy;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Offer a freshly parsed record to the working set, reconciling against
    /// any existing record with the same dedup key.
    pub fn insert(&mut self, mut record: R) -> ScanOutcome {
        let key = record.dedup_key().to_string();

        if let Some(existing) = self
            .records
            .iter_mut()
            .find(|r| r.dedup_key() == key.as_str())
        {
            return match self.policy {
                MergePolicy::IncrementQuantity => {
                    existing.add_quantite(record.quantite());
                    tracing::info!(key = %key, quantite = existing.quantite(), "Duplicate key merged");
                    ScanOutcome::Merged {
                        id: existing.record_id(),
                        quantite: existing.quantite(),
                    }
                }
                MergePolicy::RejectDuplicate => {
                    tracing::info!(key = %key, "Duplicate key rejected");
                    ScanOutcome::Duplicate {
                        id: existing.record_id(),
                        key,
                    }
                }
            };
        }

        if self.records.len() >= self.capacity {
            tracing::warn!(max = self.capacity, "Working set is full; scan refused");
            return ScanOutcome::Full { max: self.capacity };
        }

        let id = RecordId(self.next_id);
        self.next_id += 1;
        record.set_record_id(id);
        self.records.push(record);
        ScanOutcome::Added { id }
    }

    pub fn get(&self, id: RecordId) -> Option<&R> {
        self.records.iter().find(|r| r.record_id() == id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut R> {
        self.records.iter_mut().find(|r| r.record_id() == id)
    }

    /// First record holding the given dedup key.
    pub fn find_by_key(&self, key: &str) -> Option<&R> {
        self.records.iter().find(|r| r.dedup_key() == key)
    }

    /// Mutable variant of `find_by_key`.
    pub fn find_by_key_mut(&mut self, key: &str) -> Option<&mut R> {
        self.records.iter_mut().find(|r| r.dedup_key() == key)
    }

    /// Apply an edit to the record with this id. Returns false when the id
    /// is unknown (stale row binding) — the caller reports "record not
    /// found" rather than corrupting the list.
    pub fn update<F>(&mut self, id: RecordId, edit: F) -> bool
    where
        F: FnOnce(&mut R),
    {
        match self.get_mut(id) {
            Some(record) => {
                edit(record);
                true
            }
            None => {
                tracing::warn!(%id, "Edit targeted an unknown record id");
                false
            }
        }
    }

    /// Remove the record with this id, preserving the order of the rest.
    pub fn remove(&mut self, id: RecordId) -> Option<R> {
        let index = self.records.iter().position(|r| r.record_id() == id)?;
        Some(self.records.remove(index))
    }

    /// Drop every record, keeping the id sequence monotonic for the session.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Replace the working set wholesale (workbook import). Each record gets
    /// a fresh id; the previous contents are discarded.
    pub fn load(&mut self, records: Vec<R>) {
        self.records.clear();
        for mut record in records {
            if self.records.len() >= self.capacity {
                tracing::warn!(
                    max = self.capacity,
                    "Import truncated at working-set capacity"
                );
                break;
            }
            let id = RecordId(self.next_id);
            self.next_id += 1;
            record.set_record_id(id);
            self.records.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::IncomingRecord;

    fn record(reference: &str) -> IncomingRecord {
        IncomingRecord {
            reference: reference.to_string(),
            ..IncomingRecord::new()
        }
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let mut store = RecordStore::new(MergePolicy::RejectDuplicate);
        let a = store.insert(record("A"));
        let b = store.insert(record("B"));
        assert_eq!(a, ScanOutcome::Added { id: RecordId(1) });
        assert_eq!(b, ScanOutcome::Added { id: RecordId(2) });
        assert_eq!(store.len(), 2);
    }

    /// Policy A: same key twice leaves the length unchanged and increments
    /// the matched record's quantity by the second scan's quantity.
    #[test]
    fn test_increment_policy_merges_quantity() {
        let mut store = RecordStore::new(MergePolicy::IncrementQuantity);
        store.insert(record("A"));

        let mut second = record("A");
        second.quantite = 3;
        let outcome = store.insert(second);

        assert_eq!(
            outcome,
            ScanOutcome::Merged {
                id: RecordId(1),
                quantite: 4
            }
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_key("A").unwrap().quantite, 4);
    }

    /// Policy B: the second scan is rejected outright, length unchanged.
    #[test]
    fn test_reject_policy_refuses_duplicate() {
        let mut store = RecordStore::new(MergePolicy::RejectDuplicate);
        store.insert(record("A"));
        let outcome = store.insert(record("A"));

        assert_eq!(
            outcome,
            ScanOutcome::Duplicate {
                id: RecordId(1),
                key: "A".to_string()
            }
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_key("A").unwrap().quantite, 1);
    }

    #[test]
    fn test_capacity_bound_refuses_insert() {
        let mut store = RecordStore::with_capacity(MergePolicy::RejectDuplicate, 2);
        store.insert(record("A"));
        store.insert(record("B"));
        let outcome = store.insert(record("C"));
        assert_eq!(outcome, ScanOutcome::Full { max: 2 });
        assert_eq!(store.len(), 2);
    }

    /// Merging into an existing key still works at capacity — the set does
    /// not grow.
    #[test]
    fn test_capacity_bound_still_merges_existing_key() {
        let mut store = RecordStore::with_capacity(MergePolicy::IncrementQuantity, 1);
        store.insert(record("A"));
        let outcome = store.insert(record("A"));
        assert!(matches!(outcome, ScanOutcome::Merged { .. }));
    }

    #[test]
    fn test_update_by_id() {
        let mut store = RecordStore::new(MergePolicy::RejectDuplicate);
        let ScanOutcome::Added { id } = store.insert(record("A")) else {
            panic!("expected Added");
        };

        let applied = store.update(id, |r| r.couleur = "rouge".to_string());
        assert!(applied);
        assert_eq!(store.get(id).unwrap().couleur, "rouge");
    }

    #[test]
    fn test_update_unknown_id_is_refused() {
        let mut store: RecordStore<IncomingRecord> =
            RecordStore::new(MergePolicy::RejectDuplicate);
        assert!(!store.update(RecordId(99), |r| r.couleur = "x".to_string()));
    }

    #[test]
    fn test_remove_preserves_order_and_frees_key() {
        let mut store = RecordStore::new(MergePolicy::RejectDuplicate);
        store.insert(record("A"));
        let ScanOutcome::Added { id } = store.insert(record("B")) else {
            panic!("expected Added");
        };
        store.insert(record("C"));

        let removed = store.remove(id).unwrap();
        assert_eq!(removed.reference, "B");
        let refs: Vec<_> = store.records().iter().map(|r| r.reference.as_str()).collect();
        assert_eq!(refs, vec!["A", "C"]);

        // The key is scannable again after deletion.
        assert!(matches!(
            store.insert(record("B")),
            ScanOutcome::Added { .. }
        ));
    }

    #[test]
    fn test_load_replaces_contents_with_fresh_ids() {
        let mut store = RecordStore::new(MergePolicy::RejectDuplicate);
        store.insert(record("OLD"));

        store.load(vec![record("X"), record("Y")]);
        assert_eq!(store.len(), 2);
        assert!(store.find_by_key("OLD").is_none());
        // Ids continue the session sequence; no reuse of the replaced ids.
        assert!(store.records()[0].id.0 > 1);
        assert_ne!(store.records()[0].id, store.records()[1].id);
    }
}
