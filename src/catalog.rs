//! Resource catalog.
//!
//! The catalog is the back office's view of the fleet: which buses and
//! drivers a convoy has, their current status, and the per-date lists of
//! buses returning from planned repair and of stood-down crews (the
//! "order" list). The engine only reads from it.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::models::{Bus, BusId, ConvoyId, DonorEntry, DonorEntryId, Driver, DriverId};

/// Read-only access to fleet resources and external donor lists.
pub trait ResourceCatalog {
    /// Looks up a bus.
    fn bus(&self, id: &BusId) -> Option<Bus>;

    /// Looks up a driver.
    fn driver(&self, id: &DriverId) -> Option<Driver>;

    /// All buses of a convoy.
    fn buses(&self, convoy: &ConvoyId) -> Vec<Bus>;

    /// All drivers of a convoy.
    fn drivers(&self, convoy: &ConvoyId) -> Vec<Driver>;

    /// Buses (optionally with drivers) returning from planned repair.
    fn repair_returns(&self, date: NaiveDate, convoy: &ConvoyId) -> Vec<DonorEntry>;

    /// Stand-down (order) list.
    fn order_list(&self, date: NaiveDate, convoy: &ConvoyId) -> Vec<DonorEntry>;

    /// Finds a repair-return entry by id.
    fn repair_return(
        &self,
        date: NaiveDate,
        convoy: &ConvoyId,
        id: &DonorEntryId,
    ) -> Option<DonorEntry> {
        self.repair_returns(date, convoy)
            .into_iter()
            .find(|e| &e.id == id)
    }

    /// Finds an order-list entry by id.
    fn order_entry(&self, date: NaiveDate, convoy: &ConvoyId, id: &DonorEntryId) -> Option<DonorEntry> {
        self.order_list(date, convoy).into_iter().find(|e| &e.id == id)
    }
}

/// Catalog held in memory.
///
/// Used by embedding applications that load the fleet up front, and by
/// tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    buses: HashMap<BusId, Bus>,
    drivers: HashMap<DriverId, Driver>,
    repair_returns: HashMap<(NaiveDate, ConvoyId), Vec<DonorEntry>>,
    order_lists: HashMap<(NaiveDate, ConvoyId), Vec<DonorEntry>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a bus.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.upsert_bus(bus);
        self
    }

    /// Adds or replaces a driver.
    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.upsert_driver(driver);
        self
    }

    /// Adds a repair-return entry.
    pub fn with_repair_return(
        mut self,
        date: NaiveDate,
        convoy: impl Into<ConvoyId>,
        entry: DonorEntry,
    ) -> Self {
        self.repair_returns
            .entry((date, convoy.into()))
            .or_default()
            .push(entry);
        self
    }

    /// Adds an order-list entry.
    pub fn with_order_entry(
        mut self,
        date: NaiveDate,
        convoy: impl Into<ConvoyId>,
        entry: DonorEntry,
    ) -> Self {
        self.order_lists
            .entry((date, convoy.into()))
            .or_default()
            .push(entry);
        self
    }

    /// Adds or replaces a bus in place.
    pub fn upsert_bus(&mut self, bus: Bus) {
        self.buses.insert(bus.id.clone(), bus);
    }

    /// Adds or replaces a driver in place.
    pub fn upsert_driver(&mut self, driver: Driver) {
        self.drivers.insert(driver.id.clone(), driver);
    }
}

impl ResourceCatalog for InMemoryCatalog {
    fn bus(&self, id: &BusId) -> Option<Bus> {
        self.buses.get(id).cloned()
    }

    fn driver(&self, id: &DriverId) -> Option<Driver> {
        self.drivers.get(id).cloned()
    }

    fn buses(&self, convoy: &ConvoyId) -> Vec<Bus> {
        let mut out: Vec<Bus> = self
            .buses
            .values()
            .filter(|b| &b.convoy == convoy)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    fn drivers(&self, convoy: &ConvoyId) -> Vec<Driver> {
        let mut out: Vec<Driver> = self
            .drivers
            .values()
            .filter(|d| &d.convoy == convoy)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    fn repair_returns(&self, date: NaiveDate, convoy: &ConvoyId) -> Vec<DonorEntry> {
        self.repair_returns
            .get(&(date, convoy.clone()))
            .cloned()
            .unwrap_or_default()
    }

    fn order_list(&self, date: NaiveDate, convoy: &ConvoyId) -> Vec<DonorEntry> {
        self.order_lists
            .get(&(date, convoy.clone()))
            .cloned()
            .unwrap_or_default()
    }
}
