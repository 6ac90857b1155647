//! Donor models.
//!
//! Replacement resources come from four provenance pools. Reserve entries
//! are owned by the engine; repair-return and order-list entries are
//! supplied by the catalog and are read-only here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{BusId, ConvoyId, DonorEntryId, DriverId, ReserveEntryId};

/// A driver held out of the departure plan for a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveEntry {
    /// Store-allocated identifier.
    pub id: ReserveEntryId,
    /// Service date.
    pub date: NaiveDate,
    /// Convoy whose reserve this is.
    pub convoy: ConvoyId,
    /// Reserved driver.
    pub driver: DriverId,
    /// Bus pre-paired with the driver, if any.
    pub bus: Option<BusId>,
    /// Why the driver is in reserve (e.g. "removed from route").
    pub reason: String,
}

/// An entry of an external donor list (repair returns or order list).
///
/// Each entry yields a partial (driver, bus) tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonorEntry {
    /// Entry identifier within its list.
    pub id: DonorEntryId,
    /// Offered driver.
    pub driver: Option<DriverId>,
    /// Offered bus.
    pub bus: Option<BusId>,
    /// Free-text note from the list.
    pub note: String,
}

impl DonorEntry {
    /// Creates an empty entry.
    pub fn new(id: impl Into<DonorEntryId>) -> Self {
        Self {
            id: id.into(),
            driver: None,
            bus: None,
            note: String::new(),
        }
    }

    /// Sets the offered driver.
    pub fn with_driver(mut self, driver: impl Into<DriverId>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Sets the offered bus.
    pub fn with_bus(mut self, bus: impl Into<BusId>) -> Self {
        self.bus = Some(bus.into());
        self
    }

    /// Sets the note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}
