//! Ordered visitor log.
//!
//! `VisitorLog` is a plain value: every mutation returns a new log and
//! leaves the receiver untouched. Records are kept newest check-in first.

use crate::types::{BlankField, Profile, VisitorRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("visitor id {0} already exists in the log")]
    DuplicateId(Uuid),
    #[error(transparent)]
    BlankField(#[from] BlankField),
}

/// Typed partial update of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Mark the visitor as checked out at `at`. No effect on a record that
    /// is already checked out.
    CheckOut { at: DateTime<Utc> },
    /// Replace the enhanced profile.
    Profile(Profile),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitorLog {
    records: Vec<VisitorRecord>,
}

impl VisitorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from arbitrary records, sorting them newest first.
    ///
    /// Duplicate ids keep their first occurrence.
    pub fn from_records(records: Vec<VisitorRecord>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let mut records: Vec<_> = records
            .into_iter()
            .filter(|r| {
                let fresh = seen.insert(r.id());
                if !fresh {
                    tracing::warn!(id = %r.id(), "dropping duplicate visitor id");
                }
                fresh
            })
            .collect();
        sort_newest_first(&mut records);
        Self { records }
    }

    /// Records ordered by check-in time, newest first.
    pub fn records(&self) -> &[VisitorRecord] {
        &self.records
    }

    pub fn get(&self, id: Uuid) -> Option<&VisitorRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn insert(&self, record: VisitorRecord) -> Result<Self, StoreError> {
        if self.contains(record.id()) {
            return Err(StoreError::DuplicateId(record.id()));
        }
        let mut records = self.records.clone();
        records.push(record);
        sort_newest_first(&mut records);
        Ok(Self { records })
    }

    /// Apply `patch` to the record with `id`. Unknown ids leave the log as is.
    pub fn update(&self, id: Uuid, patch: &Patch) -> Self {
        let mut next = self.clone();
        if let Some(record) = next.records.iter_mut().find(|r| r.id() == id) {
            match patch {
                Patch::CheckOut { at } => {
                    if !record.mark_checked_out(*at) {
                        tracing::debug!(%id, "visitor already checked out");
                    }
                }
                Patch::Profile(profile) => record.enhanced_profile = profile.clone(),
            }
        }
        next
    }

    pub fn delete(&self, id: Uuid) -> Self {
        Self {
            records: self
                .records
                .iter()
                .filter(|r| r.id() != id)
                .cloned()
                .collect(),
        }
    }
}

fn sort_newest_first(records: &mut [VisitorRecord]) {
    records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::*;
    use crate::types::VisitorStatus;

    #[test]
    fn test_insert_orders_newest_first() {
        let t1 = record("Early", "2024-06-10T09:00:00Z");
        let t2 = record("Late", "2024-06-10T15:00:00Z");
        let log = VisitorLog::new().insert(t1.clone()).unwrap().insert(t2.clone()).unwrap();
        assert_eq!(log.records(), &[t2.clone(), t1.clone()]);

        // Insertion order does not matter.
        let log = VisitorLog::new().insert(t2.clone()).unwrap().insert(t1.clone()).unwrap();
        assert_eq!(log.records(), &[t2, t1]);
    }

    #[test]
    fn test_insert_duplicate_id_rejected() {
        let r = record("Alice", "2024-06-10T09:00:00Z");
        let log = VisitorLog::new().insert(r.clone()).unwrap();
        let dup = VisitorRecord::with_id(
            r.id(),
            String::new(),
            profile("Mallory"),
            profile("Mallory"),
            at("2024-06-11T09:00:00Z"),
        );
        assert_eq!(log.insert(dup), Err(StoreError::DuplicateId(r.id())));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_mutations_leave_previous_value_untouched() {
        let r = record("Alice", "2024-06-10T09:00:00Z");
        let before = VisitorLog::new().insert(r.clone()).unwrap();
        let after = before.update(r.id(), &Patch::CheckOut { at: at("2024-06-10T10:00:00Z") });
        assert_eq!(before.get(r.id()).unwrap().status(), VisitorStatus::CheckedIn);
        assert_eq!(after.get(r.id()).unwrap().status(), VisitorStatus::CheckedOut);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let log = VisitorLog::new()
            .insert(record("Alice", "2024-06-10T09:00:00Z"))
            .unwrap();
        let patched = log.update(Uuid::new_v4(), &Patch::Profile(profile("Bob")));
        assert_eq!(patched, log);
    }

    #[test]
    fn test_profile_patch_keeps_raw_profile() {
        let r = record("Alice", "2024-06-10T09:00:00Z");
        let log = VisitorLog::new().insert(r.clone()).unwrap();
        let log = log.update(r.id(), &Patch::Profile(profile("Alicia")));
        let stored = log.get(r.id()).unwrap();
        assert_eq!(stored.enhanced_profile().name, "Alicia");
        assert_eq!(stored.raw_profile().name, "Alice");
    }

    #[test]
    fn test_check_out_patch_applies_once() {
        let r = record("Alice", "2024-06-10T09:00:00Z");
        let log = VisitorLog::new().insert(r.clone()).unwrap();
        let log = log.update(r.id(), &Patch::CheckOut { at: at("2024-06-10T10:00:00Z") });
        let log = log.update(r.id(), &Patch::CheckOut { at: at("2024-06-10T18:00:00Z") });
        assert_eq!(
            log.get(r.id()).unwrap().check_out_time(),
            Some(at("2024-06-10T10:00:00Z"))
        );
    }

    #[test]
    fn test_insert_then_delete_restores_log() {
        let base = VisitorLog::new()
            .insert(record("Alice", "2024-06-10T09:00:00Z"))
            .unwrap()
            .insert(record("Bob", "2024-06-11T09:00:00Z"))
            .unwrap();
        let r = record("Carol", "2024-06-10T12:00:00Z");
        let restored = base.insert(r.clone()).unwrap().delete(r.id());
        assert_eq!(restored, base);
    }

    #[test]
    fn test_delete_unknown_id_is_noop() {
        let log = VisitorLog::new()
            .insert(record("Alice", "2024-06-10T09:00:00Z"))
            .unwrap();
        assert_eq!(log.delete(Uuid::new_v4()), log);
    }

    #[test]
    fn test_from_records_sorts_and_dedups() {
        let a = record("A", "2024-06-10T09:00:00Z");
        let b = record("B", "2024-06-12T09:00:00Z");
        let log = VisitorLog::from_records(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(log.records(), &[b, a]);
    }
}
