//! Conflict guard.
//!
//! Answers "may this resource go into this slot on this date?" before an
//! operator commits, and builds the busy maps a dispatch screen uses to
//! warn about conflicts before a destructive action.
//!
//! A resource is unavailable when:
//! - it is already bound to another departure of the date in an exclusive
//!   role (see [`EligibilityPolicy::is_exclusive`]), or
//! - its catalog status is in the policy's ineligible set for the role.
//!
//! The check is advisory. The ledger re-validates exclusivity when the
//! write lands.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::catalog::ResourceCatalog;
use crate::error::{DispatchError, DispatchResult};
use crate::ledger::AssignmentLedger;
use crate::models::{
    BusId, DepartureId, DriverId, ReserveEntry, ReserveEntryId, ResourceKind, Role, RouteId,
    Shift,
};
use crate::policy::EligibilityPolicy;

/// One place a resource is bound on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    /// Departure holding the resource.
    pub departure: DepartureId,
    /// Route of that departure, when the caller knows the plan.
    pub route: Option<RouteId>,
    /// Slot on that departure.
    pub role: Role,
}

/// Where every bus and driver is bound on a date.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BusyMap {
    /// Bus → slots holding it.
    pub buses: BTreeMap<BusId, Vec<Occupancy>>,
    /// Driver → slots holding them.
    pub drivers: BTreeMap<DriverId, Vec<Occupancy>>,
    /// Drivers parked in reserve → their entry.
    pub reserved: BTreeMap<DriverId, ReserveEntryId>,
}

impl BusyMap {
    /// Whether a bus is bound anywhere.
    pub fn is_bus_busy(&self, bus: &BusId) -> bool {
        self.buses.get(bus).is_some_and(|v| !v.is_empty())
    }

    /// Whether a driver is bound anywhere or parked in reserve.
    pub fn is_driver_busy(&self, driver: &DriverId) -> bool {
        self.drivers.get(driver).is_some_and(|v| !v.is_empty())
            || self.reserved.contains_key(driver)
    }

    /// Slots holding a bus.
    pub fn bus_occupancy(&self, bus: &BusId) -> &[Occupancy] {
        self.buses.get(bus).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Slots holding a driver.
    pub fn driver_occupancy(&self, driver: &DriverId) -> &[Occupancy] {
        self.drivers.get(driver).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Adds reserve membership.
    pub fn with_reserve(mut self, entries: impl IntoIterator<Item = ReserveEntry>) -> Self {
        for e in entries {
            self.reserved.insert(e.driver, e.id);
        }
        self
    }
}

/// Pre-commit availability checks over a ledger and a catalog.
pub struct ConflictGuard<'a, C: ResourceCatalog + ?Sized> {
    ledger: &'a AssignmentLedger,
    catalog: &'a C,
    policy: &'a EligibilityPolicy,
}

impl<'a, C: ResourceCatalog + ?Sized> ConflictGuard<'a, C> {
    /// Creates a guard.
    pub fn new(ledger: &'a AssignmentLedger, catalog: &'a C, policy: &'a EligibilityPolicy) -> Self {
        Self {
            ledger,
            catalog,
            policy,
        }
    }

    /// Whether a resource may take a role on a date.
    ///
    /// `resource` is a bus id for [`Role::Bus`] and a driver id otherwise.
    /// Bindings on `exclude` are ignored so a slot can be re-committed to
    /// itself. Unknown resources are unavailable.
    pub fn check_available(
        &self,
        date: NaiveDate,
        role: Role,
        resource: &str,
        exclude: Option<&DepartureId>,
    ) -> bool {
        let target = exclude
            .cloned()
            .unwrap_or_else(|| DepartureId::from("-"));
        let result = match role {
            Role::Bus => self.verify_bus(date, &target, &BusId::from(resource), exclude, true),
            Role::Driver(shift) => self.verify_driver(
                date,
                &target,
                &DriverId::from(resource),
                shift,
                exclude,
                true,
            ),
        };
        debug!(%date, %role, resource, available = result.is_ok(), "availability check");
        result.is_ok()
    }

    /// Checks a bus for a slot.
    ///
    /// `target` names the departure in the error; `exclude` lists the
    /// departure(s) whose current bindings are being rewritten.
    pub fn verify_bus(
        &self,
        date: NaiveDate,
        target: &DepartureId,
        bus: &BusId,
        exclude: Option<&DepartureId>,
        check_status: bool,
    ) -> DispatchResult<()> {
        let exclude: Vec<&DepartureId> = exclude.into_iter().collect();
        self.verify_bus_excluding(date, target, bus, &exclude, check_status)
    }

    /// Checks a driver for a shift.
    pub fn verify_driver(
        &self,
        date: NaiveDate,
        target: &DepartureId,
        driver: &DriverId,
        shift: Shift,
        exclude: Option<&DepartureId>,
        check_status: bool,
    ) -> DispatchResult<()> {
        let exclude: Vec<&DepartureId> = exclude.into_iter().collect();
        self.verify_driver_excluding(date, target, driver, shift, &exclude, check_status)
    }

    /// Checks a bus, ignoring bindings on every departure in `exclude`.
    pub fn verify_bus_excluding(
        &self,
        date: NaiveDate,
        target: &DepartureId,
        bus: &BusId,
        exclude: &[&DepartureId],
        check_status: bool,
    ) -> DispatchResult<()> {
        let Some(record) = self.catalog.bus(bus) else {
            return Err(DispatchError::validation(date, target, format!("unknown bus {bus}")));
        };
        if check_status && !self.policy.bus_eligible(&record) {
            return Err(DispatchError::conflict(
                date,
                target,
                format!("bus {bus}"),
                format!("status {:?} is not eligible", record.status),
            ));
        }
        if let Some(holder) = self.ledger.bus_holder(date, bus) {
            if !exclude.contains(&&holder.departure) {
                return Err(DispatchError::conflict(
                    date,
                    target,
                    format!("bus {bus}"),
                    format!("already on {}", holder.departure),
                ));
            }
        }
        Ok(())
    }

    /// Checks a driver, ignoring bindings on every departure in `exclude`.
    pub fn verify_driver_excluding(
        &self,
        date: NaiveDate,
        target: &DepartureId,
        driver: &DriverId,
        shift: Shift,
        exclude: &[&DepartureId],
        check_status: bool,
    ) -> DispatchResult<()> {
        let Some(record) = self.catalog.driver(driver) else {
            return Err(DispatchError::validation(
                date,
                target,
                format!("unknown driver {driver}"),
            ));
        };
        if check_status && !self.policy.driver_eligible(&record, shift) {
            return Err(DispatchError::conflict(
                date,
                target,
                format!("driver {driver}"),
                format!(
                    "status {:?} is not eligible for shift {}",
                    record.status,
                    shift.number()
                ),
            ));
        }
        if !self.policy.is_exclusive(Role::Driver(shift)) {
            return Ok(());
        }
        let clash = self
            .ledger
            .driver_holders(date, driver)
            .into_iter()
            .find(|(a, s)| {
                !exclude.contains(&&a.departure) && self.policy.is_exclusive(Role::Driver(*s))
            });
        if let Some((holder, s)) = clash {
            return Err(DispatchError::conflict(
                date,
                target,
                format!("driver {driver}"),
                format!("already on {} (shift {})", holder.departure, s.number()),
            ));
        }
        Ok(())
    }

    /// Where every resource is bound on a date.
    pub fn busy_map(&self, date: NaiveDate) -> BusyMap {
        let mut map = BusyMap::default();
        for a in self.ledger.assignments(date) {
            if let Some(bus) = &a.bus {
                map.buses.entry(bus.clone()).or_default().push(Occupancy {
                    departure: a.departure.clone(),
                    route: None,
                    role: Role::Bus,
                });
            }
            for (shift, driver) in a.drivers() {
                map.drivers.entry(driver.clone()).or_default().push(Occupancy {
                    departure: a.departure.clone(),
                    route: None,
                    role: Role::Driver(shift),
                });
            }
        }
        map
    }

    /// Resource kind check used by callers holding untyped ids.
    pub fn exists(&self, kind: ResourceKind, resource: &str) -> bool {
        match kind {
            ResourceKind::Bus => self.catalog.bus(&BusId::from(resource)).is_some(),
            ResourceKind::Driver => self.catalog.driver(&DriverId::from(resource)).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::models::{AssignmentStatus, Bus, BusStatus, Driver, DriverStatus};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_bus(Bus::new("B-101", "C1"))
            .with_bus(Bus::new("B-202", "C1"))
            .with_bus(Bus::new("B-303", "C1").with_status(BusStatus::UnderRepair))
            .with_driver(Driver::new("ivanov", "C1", "Ivanov", "Ivan"))
            .with_driver(Driver::new("petrov", "C1", "Petrov", "Petr"))
            .with_driver(
                Driver::new("orlov", "C1", "Orlov", "Oleg").with_status(DriverStatus::Intern),
            )
    }

    fn ledger() -> AssignmentLedger {
        let mut l = AssignmentLedger::new();
        l.commit(
            date(),
            &DepartureId::from("D1"),
            Some(BusId::from("B-101")),
            Some(DriverId::from("ivanov")),
            None,
            AssignmentStatus::Normal,
            "",
            None,
        )
        .unwrap();
        l
    }

    #[test]
    fn test_committed_bus_unavailable() {
        let (l, c, p) = (ledger(), catalog(), EligibilityPolicy::default());
        let g = ConflictGuard::new(&l, &c, &p);
        assert!(!g.check_available(date(), Role::Bus, "B-101", None));
        assert!(g.check_available(date(), Role::Bus, "B-202", None));
        let d1 = DepartureId::from("D1");
        assert!(g.check_available(date(), Role::Bus, "B-101", Some(&d1)));
    }

    #[test]
    fn test_status_blocks() {
        let (l, c, p) = (ledger(), catalog(), EligibilityPolicy::default());
        let g = ConflictGuard::new(&l, &c, &p);
        assert!(!g.check_available(date(), Role::Bus, "B-303", None));
        assert!(!g.check_available(date(), Role::Driver(Shift::First), "orlov", None));
        assert!(g.check_available(date(), Role::Driver(Shift::Second), "orlov", None));
    }

    #[test]
    fn test_driver_in_any_shift_blocks() {
        let (l, c, p) = (ledger(), catalog(), EligibilityPolicy::default());
        let g = ConflictGuard::new(&l, &c, &p);
        assert!(!g.check_available(date(), Role::Driver(Shift::Second), "ivanov", None));
        let err = g
            .verify_driver(
                date(),
                &DepartureId::from("D2"),
                &DriverId::from("ivanov"),
                Shift::First,
                None,
                true,
            )
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("D1"));
    }

    #[test]
    fn test_unknown_resource() {
        let (l, c, p) = (ledger(), catalog(), EligibilityPolicy::default());
        let g = ConflictGuard::new(&l, &c, &p);
        assert!(!g.check_available(date(), Role::Bus, "nope", None));
        let err = g
            .verify_bus(date(), &DepartureId::from("D2"), &BusId::from("nope"), None, true)
            .unwrap_err();
        assert!(err.is_validation());
        assert!(!g.exists(ResourceKind::Bus, "nope"));
        assert!(g.exists(ResourceKind::Driver, "petrov"));
    }

    #[test]
    fn test_status_skip_for_swaps() {
        let (l, c, p) = (ledger(), catalog(), EligibilityPolicy::default());
        let g = ConflictGuard::new(&l, &c, &p);
        let target = DepartureId::from("D2");
        assert!(g
            .verify_driver(date(), &target, &DriverId::from("orlov"), Shift::First, None, false)
            .is_ok());
    }

    #[test]
    fn test_busy_map() {
        let (l, c, p) = (ledger(), catalog(), EligibilityPolicy::default());
        let g = ConflictGuard::new(&l, &c, &p);
        let map = g.busy_map(date());
        assert!(map.is_bus_busy(&BusId::from("B-101")));
        assert!(!map.is_bus_busy(&BusId::from("B-202")));
        assert_eq!(
            map.driver_occupancy(&DriverId::from("ivanov")),
            &[Occupancy {
                departure: DepartureId::from("D1"),
                route: None,
                role: Role::Driver(Shift::First),
            }]
        );
        assert!(map.bus_occupancy(&BusId::from("B-202")).is_empty());
    }
}
