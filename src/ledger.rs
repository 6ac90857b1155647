//! Assignment ledger.
//!
//! Holds the per-date bindings of departures to resources. The ledger is the
//! single point of truth for exclusivity: every write, single-slot or
//! batched, is re-validated against the state it would produce, so a check
//! made earlier by a caller can never turn into a double booking.
//!
//! # Invariant
//! For every date, a bus id appears in at most one assignment, and a driver
//! id appears in at most one exclusive driver slot (shift 1 always, shift 2
//! unless configured otherwise). A driver never holds both shifts of the
//! same departure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::error::{DispatchError, DispatchResult};
use crate::models::{ActorId, Assignment, AssignmentStatus, BusId, DepartureId, DriverId, Shift};

/// A full overwrite of one departure's binding.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotWrite {
    /// Target departure.
    pub departure: DepartureId,
    /// New bus (`None` clears).
    pub bus: Option<BusId>,
    /// New first-shift driver (`None` clears).
    pub driver1: Option<DriverId>,
    /// New second-shift driver (`None` clears).
    pub driver2: Option<DriverId>,
    /// Status tag to record.
    pub status: AssignmentStatus,
    /// Description to record.
    pub description: String,
}

impl SlotWrite {
    /// A write that clears every reference.
    pub fn cleared(departure: DepartureId) -> Self {
        Self {
            departure,
            bus: None,
            driver1: None,
            driver2: None,
            status: AssignmentStatus::Unassigned,
            description: String::new(),
        }
    }

    /// A write that keeps the references of `current` and only retags it.
    pub fn from_assignment(current: &Assignment) -> Self {
        Self {
            departure: current.departure.clone(),
            bus: current.bus.clone(),
            driver1: current.driver1.clone(),
            driver2: current.driver2.clone(),
            status: current.status,
            description: current.description.clone(),
        }
    }

    /// Driver of a shift.
    pub fn driver(&self, shift: Shift) -> Option<&DriverId> {
        match shift {
            Shift::First => self.driver1.as_ref(),
            Shift::Second => self.driver2.as_ref(),
        }
    }

    /// Mutable driver slot of a shift.
    pub fn driver_slot_mut(&mut self, shift: Shift) -> &mut Option<DriverId> {
        match shift {
            Shift::First => &mut self.driver1,
            Shift::Second => &mut self.driver2,
        }
    }
}

/// Per-date departure bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentLedger {
    days: BTreeMap<NaiveDate, BTreeMap<DepartureId, Assignment>>,
    second_shift_exclusive: bool,
}

impl Default for AssignmentLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AssignmentLedger {
    /// Creates an empty ledger with second-shift exclusivity on.
    pub fn new() -> Self {
        Self {
            days: BTreeMap::new(),
            second_shift_exclusive: true,
        }
    }

    /// Sets whether second-shift drivers are exclusive.
    pub fn with_second_shift_exclusive(mut self, exclusive: bool) -> Self {
        self.second_shift_exclusive = exclusive;
        self
    }

    /// Whether second-shift drivers are exclusive.
    #[inline]
    pub fn second_shift_exclusive(&self) -> bool {
        self.second_shift_exclusive
    }

    /// Current binding of a departure, or the empty one.
    pub fn get(&self, date: NaiveDate, departure: &DepartureId) -> Assignment {
        self.days
            .get(&date)
            .and_then(|day| day.get(departure))
            .cloned()
            .unwrap_or_else(|| Assignment::empty(departure.clone(), date))
    }

    /// All committed assignments of a date, ordered by departure id.
    pub fn assignments(&self, date: NaiveDate) -> impl Iterator<Item = &Assignment> {
        self.days.get(&date).into_iter().flat_map(|day| day.values())
    }

    /// Assignment holding a bus on a date.
    pub fn bus_holder(&self, date: NaiveDate, bus: &BusId) -> Option<&Assignment> {
        self.assignments(date).find(|a| a.bus.as_ref() == Some(bus))
    }

    /// Assignments and shifts holding a driver on a date.
    pub fn driver_holders(&self, date: NaiveDate, driver: &DriverId) -> Vec<(&Assignment, Shift)> {
        self.assignments(date)
            .flat_map(|a| a.shifts_of(driver).into_iter().map(move |s| (a, s)))
            .collect()
    }

    /// Dates with at least one committed assignment.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    /// Overwrites one departure's binding.
    ///
    /// `None` references clear the corresponding slot.
    ///
    /// # Errors
    /// `Conflict` when the bus or a driver is already bound elsewhere on
    /// the date, or the same driver is given both shifts.
    #[allow(clippy::too_many_arguments)]
    pub fn commit(
        &mut self,
        date: NaiveDate,
        departure: &DepartureId,
        bus: Option<BusId>,
        driver1: Option<DriverId>,
        driver2: Option<DriverId>,
        status: AssignmentStatus,
        description: impl Into<String>,
        actor: Option<&ActorId>,
    ) -> DispatchResult<Assignment> {
        let write = SlotWrite {
            departure: departure.clone(),
            bus,
            driver1,
            driver2,
            status,
            description: description.into(),
        };
        let mut out = self.apply(date, vec![write], actor)?;
        Ok(out.remove(0))
    }

    /// Clears a departure back to unassigned.
    pub fn clear(
        &mut self,
        date: NaiveDate,
        departure: &DepartureId,
        actor: Option<&ActorId>,
    ) -> DispatchResult<Assignment> {
        let mut out = self.apply(date, vec![SlotWrite::cleared(departure.clone())], actor)?;
        Ok(out.remove(0))
    }

    /// Applies several slot writes as one unit.
    ///
    /// The batch is validated against the state the date would have after
    /// every write landed; if any write conflicts, nothing is applied.
    /// Returns the new assignments in write order.
    pub fn apply(
        &mut self,
        date: NaiveDate,
        writes: Vec<SlotWrite>,
        actor: Option<&ActorId>,
    ) -> DispatchResult<Vec<Assignment>> {
        self.validate(date, &writes)?;

        let day = self.days.entry(date).or_default();
        let mut out = Vec::with_capacity(writes.len());
        for w in writes {
            debug!(
                %date,
                departure = %w.departure,
                bus = ?w.bus,
                driver1 = ?w.driver1,
                driver2 = ?w.driver2,
                status = %w.status,
                "ledger write"
            );
            let assignment = Assignment {
                departure: w.departure.clone(),
                date,
                bus: w.bus,
                driver1: w.driver1,
                driver2: w.driver2,
                status: w.status,
                description: w.description,
                modified: true,
                last_actor: actor.cloned(),
            };
            day.insert(w.departure, assignment.clone());
            out.push(assignment);
        }
        Ok(out)
    }

    /// Checks a batch against the date's state without applying it.
    pub fn validate(&self, date: NaiveDate, writes: &[SlotWrite]) -> DispatchResult<()> {
        let mut touched: HashSet<&DepartureId> = HashSet::new();
        for w in writes {
            if !touched.insert(&w.departure) {
                return Err(DispatchError::validation(
                    date,
                    &w.departure,
                    "departure written twice in one batch",
                ));
            }
        }

        let mut buses: HashMap<&BusId, &DepartureId> = HashMap::new();
        let mut drivers: HashMap<&DriverId, &DepartureId> = HashMap::new();
        for a in self.assignments(date) {
            if touched.contains(&a.departure) {
                continue;
            }
            if let Some(bus) = &a.bus {
                buses.insert(bus, &a.departure);
            }
            for (shift, driver) in a.drivers() {
                if self.is_exclusive(shift) {
                    drivers.insert(driver, &a.departure);
                }
            }
        }

        for w in writes {
            if let (Some(d1), Some(d2)) = (&w.driver1, &w.driver2) {
                if d1 == d2 {
                    return Err(DispatchError::conflict(
                        date,
                        &w.departure,
                        format!("driver {d1}"),
                        "cannot drive both shifts of one departure",
                    ));
                }
            }
            if let Some(bus) = &w.bus {
                if let Some(holder) = buses.insert(bus, &w.departure) {
                    return Err(DispatchError::conflict(
                        date,
                        &w.departure,
                        format!("bus {bus}"),
                        format!("already on {holder}"),
                    ));
                }
            }
            for shift in [Shift::First, Shift::Second] {
                let Some(driver) = w.driver(shift) else {
                    continue;
                };
                if !self.is_exclusive(shift) {
                    continue;
                }
                if let Some(holder) = drivers.insert(driver, &w.departure) {
                    return Err(DispatchError::conflict(
                        date,
                        &w.departure,
                        format!("driver {driver}"),
                        format!("already on {holder}"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn is_exclusive(&self, shift: Shift) -> bool {
        match shift {
            Shift::First => true,
            Shift::Second => self.second_shift_exclusive,
        }
    }
}
