use crate::persistence::{self, Slot};
use crate::store::{Patch, StoreError, VisitorLog};
use crate::types::{Profile, VisitorRecord};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Front-desk service: the current visitor log plus the slot it is saved to.
///
/// Each operation swaps in the new log value and then writes the whole
/// snapshot. A failed write is logged and otherwise ignored; the in-memory
/// log stays authoritative for the session.
pub struct Desk<S: Slot> {
    slot: S,
    log: VisitorLog,
}

impl<S: Slot> Desk<S> {
    /// Load the log from `slot`. Unreadable data starts an empty log.
    pub fn open(slot: S) -> Self {
        let log = VisitorLog::from_records(persistence::load_or_default(&slot));
        tracing::info!(visitors = log.len(), "desk opened");
        Self { slot, log }
    }

    pub fn log(&self) -> &VisitorLog {
        &self.log
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    pub fn check_in(&mut self, record: VisitorRecord) -> Result<Uuid, StoreError> {
        let id = record.id();
        record.enhanced_profile().validate()?;
        let next = self.log.insert(record)?;
        tracing::info!(%id, "visitor checked in");
        self.commit(next);
        Ok(id)
    }

    /// Returns false if no visitor has `id`.
    pub fn check_out(&mut self, id: Uuid, at: DateTime<Utc>) -> bool {
        self.apply(id, Patch::CheckOut { at })
    }

    /// Replace the enhanced profile of a visitor. `Ok(false)` if absent.
    ///
    /// A profile with a blank field is rejected and nothing is written.
    pub fn correct_profile(&mut self, id: Uuid, profile: Profile) -> Result<bool, StoreError> {
        profile.validate()?;
        Ok(self.apply(id, Patch::Profile(profile)))
    }

    /// Returns false if no visitor has `id`.
    pub fn remove(&mut self, id: Uuid) -> bool {
        if !self.log.contains(id) {
            tracing::debug!(%id, "remove: visitor not found");
            return false;
        }
        let next = self.log.delete(id);
        tracing::info!(%id, "visitor removed");
        self.commit(next);
        true
    }

    fn apply(&mut self, id: Uuid, patch: Patch) -> bool {
        if !self.log.contains(id) {
            tracing::debug!(%id, "update: visitor not found");
            return false;
        }
        let next = self.log.update(id, &patch);
        tracing::info!(%id, patch = patch_kind(&patch), "visitor updated");
        self.commit(next);
        true
    }

    fn commit(&mut self, next: VisitorLog) {
        self.log = next;
        if let Err(e) = persistence::save(&mut self.slot, self.log.records()) {
            tracing::warn!(error = %e, "failed to persist visitor log; keeping in-memory copy");
        }
    }
}

fn patch_kind(patch: &Patch) -> &'static str {
    match patch {
        Patch::CheckOut { .. } => "check-out",
        Patch::Profile(_) => "profile",
    }
}
