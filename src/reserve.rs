//! Reserve pool.
//!
//! Drivers (optionally paired with a bus) held out of the departure plan
//! for a date and convoy, available as same-day replacement donors.
//!
//! Storage sits behind [`ReserveStore`] so a back office can persist the
//! pool where it keeps the rest of the dispatch. Removal is keyed by entry
//! id and ignores ids that are already gone, which makes a failed cleanup
//! safe to retry.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{BusId, ConvoyId, DriverId, ReserveEntry, ReserveEntryId};

/// Error reported by a reserve store backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("reserve store: {0}")]
pub struct ReserveStoreError(pub String);

/// Storage of reserve pool entries.
pub trait ReserveStore {
    /// Adds a driver to the reserve of a date/convoy.
    ///
    /// An existing entry of the same driver, date and convoy is replaced.
    fn add(
        &mut self,
        date: NaiveDate,
        convoy: &ConvoyId,
        driver: DriverId,
        bus: Option<BusId>,
        reason: String,
    ) -> Result<ReserveEntry, ReserveStoreError>;

    /// Removes entries by id. Unknown ids are ignored.
    ///
    /// Returns how many entries were removed.
    fn remove(&mut self, ids: &[ReserveEntryId]) -> Result<usize, ReserveStoreError>;

    /// Entries of a date/convoy, in insertion order.
    fn list_by_date(&self, date: NaiveDate, convoy: &ConvoyId) -> Vec<ReserveEntry>;

    /// Entries of a date over every convoy.
    fn list_all(&self, date: NaiveDate) -> Vec<ReserveEntry>;

    /// Looks up an entry.
    fn get(&self, id: ReserveEntryId) -> Option<ReserveEntry>;

    /// Entry holding a driver on a date, in any convoy.
    fn find_driver(&self, date: NaiveDate, driver: &DriverId) -> Option<ReserveEntry>;

    /// Entry holding a pre-paired bus on a date, in any convoy.
    fn find_bus(&self, date: NaiveDate, bus: &BusId) -> Option<ReserveEntry>;
}

/// In-memory reserve store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservePool {
    entries: BTreeMap<ReserveEntryId, ReserveEntry>,
    next_id: u64,
}

impl ReservePool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries over all dates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ReserveStore for ReservePool {
    fn add(
        &mut self,
        date: NaiveDate,
        convoy: &ConvoyId,
        driver: DriverId,
        bus: Option<BusId>,
        reason: String,
    ) -> Result<ReserveEntry, ReserveStoreError> {
        self.entries
            .retain(|_, e| !(e.date == date && &e.convoy == convoy && e.driver == driver));

        self.next_id += 1;
        let entry = ReserveEntry {
            id: ReserveEntryId(self.next_id),
            date,
            convoy: convoy.clone(),
            driver,
            bus,
            reason,
        };
        self.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    fn remove(&mut self, ids: &[ReserveEntryId]) -> Result<usize, ReserveStoreError> {
        Ok(ids
            .iter()
            .filter(|id| self.entries.remove(*id).is_some())
            .count())
    }

    fn list_by_date(&self, date: NaiveDate, convoy: &ConvoyId) -> Vec<ReserveEntry> {
        self.entries
            .values()
            .filter(|e| e.date == date && &e.convoy == convoy)
            .cloned()
            .collect()
    }

    fn list_all(&self, date: NaiveDate) -> Vec<ReserveEntry> {
        self.entries
            .values()
            .filter(|e| e.date == date)
            .cloned()
            .collect()
    }

    fn get(&self, id: ReserveEntryId) -> Option<ReserveEntry> {
        self.entries.get(&id).cloned()
    }

    fn find_driver(&self, date: NaiveDate, driver: &DriverId) -> Option<ReserveEntry> {
        self.entries
            .values()
            .find(|e| e.date == date && &e.driver == driver)
            .cloned()
    }

    fn find_bus(&self, date: NaiveDate, bus: &BusId) -> Option<ReserveEntry> {
        self.entries
            .values()
            .find(|e| e.date == date && e.bus.as_ref() == Some(bus))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn convoy() -> ConvoyId {
        ConvoyId::from("C1")
    }

    #[test]
    fn test_add_and_list() {
        let mut pool = ReservePool::new();
        let e1 = pool
            .add(date(), &convoy(), DriverId::from("petrov"), None, "spare".into())
            .unwrap();
        let e2 = pool
            .add(
                date(),
                &convoy(),
                DriverId::from("sidorov"),
                Some(BusId::from("B-7")),
                "spare".into(),
            )
            .unwrap();

        assert_ne!(e1.id, e2.id);
        let listed = pool.list_by_date(date(), &convoy());
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].driver, DriverId::from("petrov"));
        assert!(pool.list_by_date(date(), &ConvoyId::from("C2")).is_empty());
        assert_eq!(pool.list_all(date()).len(), 2);
        assert!(pool.list_all(date().succ_opt().unwrap()).is_empty());
        assert_eq!(
            pool.find_bus(date(), &BusId::from("B-7")).map(|e| e.id),
            Some(e2.id)
        );
    }

    #[test]
    fn test_add_replaces_same_driver() {
        let mut pool = ReservePool::new();
        let first = pool
            .add(date(), &convoy(), DriverId::from("petrov"), None, "a".into())
            .unwrap();
        let second = pool
            .add(date(), &convoy(), DriverId::from("petrov"), None, "b".into())
            .unwrap();

        assert_eq!(pool.len(), 1);
        assert!(pool.get(first.id).is_none());
        assert_eq!(pool.get(second.id).unwrap().reason, "b");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut pool = ReservePool::new();
        let e = pool
            .add(date(), &convoy(), DriverId::from("petrov"), None, "a".into())
            .unwrap();
        let keep = pool
            .add(date(), &convoy(), DriverId::from("orlov"), None, "a".into())
            .unwrap();

        assert_eq!(pool.remove(&[e.id]).unwrap(), 1);
        assert_eq!(pool.remove(&[e.id]).unwrap(), 0);
        assert!(pool.get(keep.id).is_some());
        assert!(pool.find_driver(date(), &DriverId::from("petrov")).is_none());
    }
}
