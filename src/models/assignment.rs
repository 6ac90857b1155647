//! Assignment model.
//!
//! An assignment binds a bus and up to two drivers to one departure on one
//! service date. The status tag records how the current binding came to
//! be, which is what the audit trail and the dispatch sheet colour on.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ActorId, BusId, DepartureId, DriverId, Shift};

/// How the current binding of a departure was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Nothing assigned yet, or cleared.
    #[default]
    Unassigned,
    /// Regular assignment from the free lists.
    Normal,
    /// Resource taken from the reserve pool.
    ReplacedFromReserve,
    /// Exchanged with another departure of the same route.
    Permutation,
    /// Exchanged with a departure of another route.
    RearrangedRoute,
    /// Filled from the planned-repair return list.
    RearrangedFromRepair,
    /// Filled from the stand-down (order) list.
    FromOrder,
}

impl AssignmentStatus {
    /// Whether this status marks a mid-day replacement.
    pub fn is_replacement(self) -> bool {
        !matches!(self, AssignmentStatus::Unassigned | AssignmentStatus::Normal)
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignmentStatus::Unassigned => "unassigned",
            AssignmentStatus::Normal => "normal",
            AssignmentStatus::ReplacedFromReserve => "replaced from reserve",
            AssignmentStatus::Permutation => "permutation",
            AssignmentStatus::RearrangedRoute => "rearranged route",
            AssignmentStatus::RearrangedFromRepair => "rearranged from repair",
            AssignmentStatus::FromOrder => "from order",
        };
        f.write_str(s)
    }
}

/// Resource binding of one departure on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Bound departure.
    pub departure: DepartureId,
    /// Service date.
    pub date: NaiveDate,
    /// Assigned bus.
    pub bus: Option<BusId>,
    /// First-shift driver.
    pub driver1: Option<DriverId>,
    /// Second-shift driver.
    pub driver2: Option<DriverId>,
    /// How the binding was produced.
    pub status: AssignmentStatus,
    /// What changed and from where.
    pub description: String,
    /// Set once the slot has been committed at least once.
    pub modified: bool,
    /// Operator of the last commit.
    pub last_actor: Option<ActorId>,
}

impl Assignment {
    /// The binding of a departure that was never committed.
    pub fn empty(departure: DepartureId, date: NaiveDate) -> Self {
        Self {
            departure,
            date,
            bus: None,
            driver1: None,
            driver2: None,
            status: AssignmentStatus::Unassigned,
            description: String::new(),
            modified: false,
            last_actor: None,
        }
    }

    /// Driver of a shift.
    #[inline]
    pub fn driver(&self, shift: Shift) -> Option<&DriverId> {
        match shift {
            Shift::First => self.driver1.as_ref(),
            Shift::Second => self.driver2.as_ref(),
        }
    }

    /// Mutable driver slot of a shift.
    #[inline]
    pub fn driver_slot_mut(&mut self, shift: Shift) -> &mut Option<DriverId> {
        match shift {
            Shift::First => &mut self.driver1,
            Shift::Second => &mut self.driver2,
        }
    }

    /// The shifts a driver holds on this departure.
    pub fn shifts_of(&self, driver: &DriverId) -> Vec<Shift> {
        [Shift::First, Shift::Second]
            .into_iter()
            .filter(|&s| self.driver(s) == Some(driver))
            .collect()
    }

    /// Whether no resource is bound.
    pub fn is_empty(&self) -> bool {
        self.bus.is_none() && self.driver1.is_none() && self.driver2.is_none()
    }

    /// Drivers bound, in shift order.
    pub fn drivers(&self) -> impl Iterator<Item = (Shift, &DriverId)> {
        [Shift::First, Shift::Second]
            .into_iter()
            .filter_map(move |s| self.driver(s).map(|d| (s, d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_empty_assignment() {
        let a = Assignment::empty(DepartureId::from("D1"), date());
        assert!(a.is_empty());
        assert!(!a.modified);
        assert_eq!(a.status, AssignmentStatus::Unassigned);
        assert_eq!(a.drivers().count(), 0);
    }

    #[test]
    fn test_driver_slots() {
        let mut a = Assignment::empty(DepartureId::from("D1"), date());
        *a.driver_slot_mut(Shift::Second) = Some(DriverId::from("P"));
        assert_eq!(a.driver(Shift::Second), Some(&DriverId::from("P")));
        assert_eq!(a.driver(Shift::First), None);
        assert_eq!(a.shifts_of(&DriverId::from("P")), vec![Shift::Second]);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_status_is_replacement() {
        assert!(!AssignmentStatus::Normal.is_replacement());
        assert!(!AssignmentStatus::Unassigned.is_replacement());
        assert!(AssignmentStatus::FromOrder.is_replacement());
        assert!(AssignmentStatus::Permutation.is_replacement());
    }
}
