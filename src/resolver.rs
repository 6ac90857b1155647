//! Replacement resolver.
//!
//! Turns a replacement request into the complete mutation it implies: the
//! target slot write, the donor departure write (if the donor is another
//! departure), and the donor-side follow-up steps on the reserve pool.
//! Nothing is applied here; the engine commits the writes and then runs the
//! follow-up steps.
//!
//! # Categories
//!
//! | Variant | Donor | Target status | Donor side |
//! |---------|-------|---------------|------------|
//! | `FromReserve` | reserve entry | replaced from reserve | entry removed |
//! | `Permutation` | departure, same route | permutation | swapped or vacated |
//! | `RearrangingRoute` | departure, other route | rearranged route | swapped or vacated |
//! | `FromRepair` | repair-return list | rearranged from repair | none |
//! | `FromOrder` | order list | from order | none |

use serde::{Deserialize, Serialize};

use crate::catalog::ResourceCatalog;
use crate::error::{DispatchError, DispatchResult};
use crate::guard::ConflictGuard;
use crate::ledger::{AssignmentLedger, SlotWrite};
use crate::models::{
    Assignment, AssignmentStatus, BusId, Departure, DepartureId, DispatchContext, DonorEntryId,
    DriverId, ReserveEntryId, Shift,
};
use crate::plan::DeparturePlan;
use crate::policy::EngineConfig;
use crate::reserve::ReserveStore;

/// Which field(s) of a departure a replacement changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacedPart {
    Bus,
    Driver(Shift),
    BusAndDriver(Shift),
}

impl ReplacedPart {
    /// Whether the bus changes.
    pub fn includes_bus(self) -> bool {
        matches!(self, ReplacedPart::Bus | ReplacedPart::BusAndDriver(_))
    }

    /// The driver shift that changes, if any.
    pub fn shift(self) -> Option<Shift> {
        match self {
            ReplacedPart::Bus => None,
            ReplacedPart::Driver(s) | ReplacedPart::BusAndDriver(s) => Some(s),
        }
    }
}

/// How resources move between two active departures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transfer {
    /// Both departures exchange the field(s).
    #[default]
    Swap,
    /// The donor's field(s) move to the target; the donor is left empty.
    Move,
}

/// A replacement, one variant per donor category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "category")]
pub enum Replacement {
    /// Take a driver (and optionally the paired bus) from the reserve pool.
    FromReserve {
        entry: ReserveEntryId,
        part: ReplacedPart,
    },
    /// Exchange with another departure of the same route.
    Permutation {
        donor: DepartureId,
        part: ReplacedPart,
        transfer: Transfer,
    },
    /// Exchange with a departure of another route.
    RearrangingRoute {
        donor: DepartureId,
        part: ReplacedPart,
        transfer: Transfer,
    },
    /// Fill from the planned-repair return list.
    FromRepair {
        entry: DonorEntryId,
        part: ReplacedPart,
    },
    /// Fill from the stand-down (order) list.
    FromOrder {
        entry: DonorEntryId,
        part: ReplacedPart,
    },
}

impl Replacement {
    /// Status tag recorded on the target.
    pub fn status(&self) -> AssignmentStatus {
        match self {
            Replacement::FromReserve { .. } => AssignmentStatus::ReplacedFromReserve,
            Replacement::Permutation { .. } => AssignmentStatus::Permutation,
            Replacement::RearrangingRoute { .. } => AssignmentStatus::RearrangedRoute,
            Replacement::FromRepair { .. } => AssignmentStatus::RearrangedFromRepair,
            Replacement::FromOrder { .. } => AssignmentStatus::FromOrder,
        }
    }

    /// Field(s) being replaced.
    pub fn part(&self) -> ReplacedPart {
        match self {
            Replacement::FromReserve { part, .. }
            | Replacement::Permutation { part, .. }
            | Replacement::RearrangingRoute { part, .. }
            | Replacement::FromRepair { part, .. }
            | Replacement::FromOrder { part, .. } => *part,
        }
    }
}

/// A replacement request against one target departure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceRequest {
    /// Departure receiving the resource.
    pub target: DepartureId,
    /// Donor and category.
    pub replacement: Replacement,
    /// Park a driver pulled off the target in the reserve pool.
    #[serde(default)]
    pub park_displaced: bool,
}

impl ReplaceRequest {
    /// Creates a request.
    pub fn new(target: impl Into<DepartureId>, replacement: Replacement) -> Self {
        Self {
            target: target.into(),
            replacement,
            park_displaced: false,
        }
    }

    /// Parks the displaced driver in reserve.
    pub fn parking_displaced(mut self) -> Self {
        self.park_displaced = true;
        self
    }
}

/// Donor-side follow-up run after the target commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "step")]
pub enum CleanupStep {
    /// Remove consumed reserve entries.
    RemoveReserve { entries: Vec<ReserveEntryId> },
    /// Put a displaced driver into the reserve pool.
    ParkDriver { driver: DriverId, reason: String },
}

impl CleanupStep {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            CleanupStep::RemoveReserve { .. } => "remove_reserve",
            CleanupStep::ParkDriver { .. } => "park_driver",
        }
    }
}

/// The full mutation a replacement implies.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReplacement {
    /// Status tag of the category.
    pub status: AssignmentStatus,
    /// Slot writes, target first.
    pub writes: Vec<SlotWrite>,
    /// Follow-up steps, in order.
    pub cleanup: Vec<CleanupStep>,
    /// Target description.
    pub description: String,
    /// Buses touched.
    pub buses: Vec<BusId>,
    /// Drivers touched.
    pub drivers: Vec<DriverId>,
    /// Reserve entries consumed.
    pub reserve_entries: Vec<ReserveEntryId>,
}

/// Removed/installed labels of one slot, rendered into a description.
#[derive(Debug, Clone, Default)]
pub(crate) struct ChangeNote {
    pub(crate) removed: Vec<String>,
    pub(crate) installed: Vec<String>,
}

impl ChangeNote {
    /// `removed: …; installed: … <source>`.
    ///
    /// `removed_to` is appended to the removed list when nothing was
    /// installed (the donor side of a move).
    pub(crate) fn render(&self, source: &str, removed_to: Option<&str>) -> String {
        let mut parts = Vec::new();
        if !self.removed.is_empty() {
            let mut s = format!("removed: {}", self.removed.join(", "));
            if let (true, Some(to)) = (self.installed.is_empty(), removed_to) {
                s.push(' ');
                s.push_str(to);
            }
            parts.push(s);
        }
        if !self.installed.is_empty() {
            let mut s = format!("installed: {}", self.installed.join(", "));
            if !source.is_empty() {
                s.push(' ');
                s.push_str(source);
            }
            parts.push(s);
        }
        parts.join("; ")
    }
}

/// What a donor list entry offers.
struct Offer {
    bus: Option<BusId>,
    driver: Option<DriverId>,
    consumed: Option<ReserveEntryId>,
    source: String,
}

/// Computes replacement mutations against the current dispatch state.
pub struct ReplacementResolver<'a, C: ResourceCatalog + ?Sized, R: ReserveStore + ?Sized> {
    ledger: &'a AssignmentLedger,
    plan: &'a DeparturePlan,
    catalog: &'a C,
    reserve: &'a R,
    config: &'a EngineConfig,
}

impl<'a, C, R> ReplacementResolver<'a, C, R>
where
    C: ResourceCatalog + ?Sized,
    R: ReserveStore + ?Sized,
{
    /// Creates a resolver over the given state.
    pub fn new(
        ledger: &'a AssignmentLedger,
        plan: &'a DeparturePlan,
        catalog: &'a C,
        reserve: &'a R,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            ledger,
            plan,
            catalog,
            reserve,
            config,
        }
    }

    fn guard(&self) -> ConflictGuard<'_, C> {
        ConflictGuard::new(self.ledger, self.catalog, &self.config.policy)
    }

    /// Resolves a request into writes and follow-up steps.
    ///
    /// # Errors
    /// `Validation` for unknown or mismatched targets and donors, or a
    /// replacement that changes nothing; `Conflict` when an installed
    /// resource is bound elsewhere or ineligible.
    pub fn resolve(
        &self,
        ctx: &DispatchContext,
        request: &ReplaceRequest,
    ) -> DispatchResult<ResolvedReplacement> {
        let target = self.target_departure(ctx, &request.target)?;
        let current = self.ledger.get(ctx.date, &target.id);
        let status = request.replacement.status();

        match &request.replacement {
            Replacement::FromReserve { entry, part } => {
                let offer = self.reserve_offer(ctx, &target.id, *entry, *part)?;
                self.from_list(ctx, target, &current, offer, *part, status, request.park_displaced)
            }
            Replacement::FromRepair { entry, part } => {
                let Some(e) = self.catalog.repair_return(ctx.date, &ctx.convoy, entry) else {
                    return Err(DispatchError::validation(
                        ctx.date,
                        &target.id,
                        format!("no repair-return entry {entry}"),
                    ));
                };
                let offer = Offer {
                    bus: e.bus,
                    driver: e.driver,
                    consumed: None,
                    source: "from repair return list".to_string(),
                };
                self.from_list(ctx, target, &current, offer, *part, status, request.park_displaced)
            }
            Replacement::FromOrder { entry, part } => {
                let Some(e) = self.catalog.order_entry(ctx.date, &ctx.convoy, entry) else {
                    return Err(DispatchError::validation(
                        ctx.date,
                        &target.id,
                        format!("no order-list entry {entry}"),
                    ));
                };
                let offer = Offer {
                    bus: e.bus,
                    driver: e.driver,
                    consumed: None,
                    source: "from order list".to_string(),
                };
                self.from_list(ctx, target, &current, offer, *part, status, request.park_displaced)
            }
            Replacement::Permutation {
                donor,
                part,
                transfer,
            } => self.from_departure(
                ctx,
                target,
                &current,
                donor,
                *part,
                *transfer,
                false,
                status,
                request.park_displaced,
            ),
            Replacement::RearrangingRoute {
                donor,
                part,
                transfer,
            } => self.from_departure(
                ctx,
                target,
                &current,
                donor,
                *part,
                *transfer,
                true,
                status,
                request.park_displaced,
            ),
        }
    }

    /// Reserve entries held by drivers about to be installed.
    ///
    /// A driver leaves the reserve the moment they are put on a departure.
    pub fn reserve_consumption<'d>(
        &self,
        ctx: &DispatchContext,
        drivers: impl IntoIterator<Item = &'d DriverId>,
        already: &[ReserveEntryId],
    ) -> Vec<ReserveEntryId> {
        let mut out: Vec<ReserveEntryId> = already.to_vec();
        for d in drivers {
            if let Some(e) = self.reserve.find_driver(ctx.date, d) {
                if !out.contains(&e.id) {
                    out.push(e.id);
                }
            }
        }
        out
    }

    /// Rejects installing a bus pre-paired in a reserve entry, unless that
    /// entry is among `consumed`.
    ///
    /// # Errors
    /// `Conflict` naming the holding entry.
    pub fn verify_bus_unreserved(
        &self,
        ctx: &DispatchContext,
        departure: &DepartureId,
        bus: &BusId,
        consumed: &[ReserveEntryId],
    ) -> DispatchResult<()> {
        match self.reserve.find_bus(ctx.date, bus) {
            Some(e) if !consumed.contains(&e.id) => Err(DispatchError::conflict(
                ctx.date,
                departure,
                self.bus_label(bus),
                format!("pre-paired with driver {} in reserve entry {}", e.driver, e.id),
            )),
            _ => Ok(()),
        }
    }

    /// Audit label of a bus.
    pub fn bus_label(&self, id: &BusId) -> String {
        let name = self
            .catalog
            .bus(id)
            .map(|b| b.label())
            .unwrap_or_else(|| id.to_string());
        format!("bus {name}")
    }

    /// Audit label of a driver in a shift.
    pub fn driver_label(&self, id: &DriverId, shift: Shift) -> String {
        let name = self
            .catalog
            .driver(id)
            .map(|d| d.short_name())
            .unwrap_or_else(|| id.to_string());
        format!("driver {name} (shift {})", shift.number())
    }

    pub(crate) fn target_departure(
        &self,
        ctx: &DispatchContext,
        id: &DepartureId,
    ) -> DispatchResult<&'a Departure> {
        let Some(dep) = self.plan.departure(id) else {
            return Err(DispatchError::validation(ctx.date, id, "unknown departure"));
        };
        match self.plan.route_of(id) {
            Some(route) if route.convoy == ctx.convoy => Ok(dep),
            _ => Err(DispatchError::validation(
                ctx.date,
                id,
                format!("departure is not operated by convoy {}", ctx.convoy),
            )),
        }
    }

    fn reserve_offer(
        &self,
        ctx: &DispatchContext,
        target: &DepartureId,
        entry: ReserveEntryId,
        part: ReplacedPart,
    ) -> DispatchResult<Offer> {
        let Some(e) = self.reserve.get(entry) else {
            return Err(DispatchError::validation(
                ctx.date,
                target,
                format!("no reserve entry {entry}"),
            ));
        };
        if e.date != ctx.date || e.convoy != ctx.convoy {
            return Err(DispatchError::validation(
                ctx.date,
                target,
                format!("reserve entry {entry} belongs to {} / {}", e.date, e.convoy),
            ));
        }
        if part.shift().is_none() {
            return Err(DispatchError::validation(
                ctx.date,
                target,
                "a reserve replacement must install the reserved driver",
            ));
        }
        Ok(Offer {
            bus: e.bus,
            driver: Some(e.driver),
            consumed: Some(e.id),
            source: "from reserve".to_string(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn from_list(
        &self,
        ctx: &DispatchContext,
        target: &Departure,
        current: &Assignment,
        offer: Offer,
        part: ReplacedPart,
        status: AssignmentStatus,
        park_displaced: bool,
    ) -> DispatchResult<ResolvedReplacement> {
        let guard = self.guard();
        let date = ctx.date;
        let mut write = SlotWrite::from_assignment(current);
        write.status = status;
        let mut note = ChangeNote::default();
        let mut buses = Vec::new();
        let mut drivers = Vec::new();
        let mut displaced = Vec::new();

        if part.includes_bus() {
            let Some(bus) = offer.bus else {
                return Err(DispatchError::validation(date, &target.id, "donor offers no bus"));
            };
            guard.verify_bus(date, &target.id, &bus, Some(&target.id), true)?;
            if current.bus.as_ref() != Some(&bus) {
                if let Some(old) = &current.bus {
                    note.removed.push(self.bus_label(old));
                    buses.push(old.clone());
                }
                note.installed.push(self.bus_label(&bus));
                buses.push(bus.clone());
            }
            write.bus = Some(bus);
        }

        let mut installed_driver = None;
        if let Some(shift) = part.shift() {
            let Some(driver) = offer.driver else {
                return Err(DispatchError::validation(date, &target.id, "donor offers no driver"));
            };
            guard.verify_driver(date, &target.id, &driver, shift, Some(&target.id), true)?;
            if current.driver(shift) != Some(&driver) {
                if let Some(old) = current.driver(shift) {
                    note.removed.push(self.driver_label(old, shift));
                    drivers.push(old.clone());
                    displaced.push(old.clone());
                }
                note.installed.push(self.driver_label(&driver, shift));
                drivers.push(driver.clone());
                installed_driver = Some(driver.clone());
            }
            *write.driver_slot_mut(shift) = Some(driver);
        }

        if note.installed.is_empty() {
            return Err(DispatchError::validation(
                date,
                &target.id,
                "replacement changes nothing",
            ));
        }

        let description = note.render(&offer.source, None);
        write.description = description.clone();

        let consumed: Vec<ReserveEntryId> = offer.consumed.into_iter().collect();
        let reserve_entries = self.reserve_consumption(ctx, installed_driver.iter(), &consumed);
        if let (true, Some(bus)) = (part.includes_bus(), &write.bus) {
            self.verify_bus_unreserved(ctx, &target.id, bus, &reserve_entries)?;
        }
        let cleanup = self.cleanup_steps(&reserve_entries, displaced, park_displaced);

        Ok(ResolvedReplacement {
            status,
            writes: vec![write],
            cleanup,
            description,
            buses,
            drivers,
            reserve_entries,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn from_departure(
        &self,
        ctx: &DispatchContext,
        target: &Departure,
        current: &Assignment,
        donor_id: &DepartureId,
        part: ReplacedPart,
        transfer: Transfer,
        cross_route: bool,
        status: AssignmentStatus,
        park_displaced: bool,
    ) -> DispatchResult<ResolvedReplacement> {
        let date = ctx.date;
        if donor_id == &target.id {
            return Err(DispatchError::validation(
                date,
                &target.id,
                "donor and target are the same departure",
            ));
        }
        let Some(donor) = self.plan.departure(donor_id) else {
            return Err(DispatchError::validation(
                date,
                &target.id,
                format!("unknown donor departure {donor_id}"),
            ));
        };
        if self.plan.route_of(donor_id).map(|r| &r.convoy) != Some(&ctx.convoy) {
            return Err(DispatchError::validation(
                date,
                &target.id,
                format!("donor departure {donor_id} is not operated by convoy {}", ctx.convoy),
            ));
        }
        let same_route = donor.route == target.route;
        if cross_route && same_route {
            return Err(DispatchError::validation(
                date,
                &target.id,
                "a route rearrangement needs a donor on another route",
            ));
        }
        if !cross_route && !same_route {
            return Err(DispatchError::validation(
                date,
                &target.id,
                "a permutation needs a donor on the same route",
            ));
        }

        let donor_current = self.ledger.get(date, donor_id);
        let guard = self.guard();
        let check_status = self.config.policy.check_status_on_swap;
        let exclude = [&target.id, donor_id];

        let mut tw = SlotWrite::from_assignment(current);
        let mut dw = SlotWrite::from_assignment(&donor_current);
        tw.status = status;
        dw.status = status;
        let mut tnote = ChangeNote::default();
        let mut dnote = ChangeNote::default();
        let mut buses = Vec::new();
        let mut drivers = Vec::new();
        let mut displaced = Vec::new();

        if part.includes_bus() {
            let (t, d) = (current.bus.clone(), donor_current.bus.clone());
            let (to_target, to_donor) =
                exchange(date, &target.id, "bus", t.clone(), d.clone(), transfer)?;
            if let Some(b) = &to_target {
                guard.verify_bus_excluding(date, &target.id, b, &exclude, check_status)?;
            }
            if let Some(b) = &to_donor {
                guard.verify_bus_excluding(date, donor_id, b, &exclude, check_status)?;
            }
            for b in t.iter().chain(d.iter()) {
                buses.push(b.clone());
            }
            if let Some(b) = &t {
                tnote.removed.push(self.bus_label(b));
            }
            if let Some(b) = &to_target {
                tnote.installed.push(self.bus_label(b));
            }
            if let Some(b) = &d {
                dnote.removed.push(self.bus_label(b));
            }
            if let Some(b) = &to_donor {
                dnote.installed.push(self.bus_label(b));
            }
            tw.bus = to_target;
            dw.bus = to_donor;
        }

        let mut installed = Vec::new();
        if let Some(shift) = part.shift() {
            let (t, d) = (
                current.driver(shift).cloned(),
                donor_current.driver(shift).cloned(),
            );
            let (to_target, to_donor) =
                exchange(date, &target.id, "driver", t.clone(), d.clone(), transfer)?;
            if let Some(x) = &to_target {
                guard.verify_driver_excluding(
                    date,
                    &target.id,
                    x,
                    shift,
                    &exclude,
                    check_status,
                )?;
                installed.push(x.clone());
            }
            if let Some(x) = &to_donor {
                guard.verify_driver_excluding(date, donor_id, x, shift, &exclude, check_status)?;
                installed.push(x.clone());
            }
            for x in t.iter().chain(d.iter()) {
                drivers.push(x.clone());
            }
            if let Some(x) = &t {
                tnote.removed.push(self.driver_label(x, shift));
                if transfer == Transfer::Move {
                    displaced.push(x.clone());
                }
            }
            if let Some(x) = &to_target {
                tnote.installed.push(self.driver_label(x, shift));
            }
            if let Some(x) = &d {
                dnote.removed.push(self.driver_label(x, shift));
            }
            if let Some(x) = &to_donor {
                dnote.installed.push(self.driver_label(x, shift));
            }
            *tw.driver_slot_mut(shift) = to_target;
            *dw.driver_slot_mut(shift) = to_donor;
        }

        let donor_route = self
            .plan
            .route_of(donor_id)
            .map(|r| r.number.clone())
            .unwrap_or_default();
        let target_route = self
            .plan
            .route_of(&target.id)
            .map(|r| r.number.clone())
            .unwrap_or_default();
        let target_source = match transfer {
            Transfer::Swap => format!("swapped with departure {donor_id} (route {donor_route})"),
            Transfer::Move => format!("from departure {donor_id} (route {donor_route})"),
        };
        let donor_source = format!("swapped with departure {} (route {target_route})", target.id);
        let moved_to = format!("(moved to departure {} route {target_route})", target.id);

        tw.description = tnote.render(&target_source, None);
        dw.description = dnote.render(&donor_source, Some(&moved_to));
        let description = tw.description.clone();

        let reserve_entries = self.reserve_consumption(ctx, installed.iter(), &[]);
        let cleanup = self.cleanup_steps(&reserve_entries, displaced, park_displaced);

        Ok(ResolvedReplacement {
            status,
            writes: vec![tw, dw],
            cleanup,
            description,
            buses,
            drivers,
            reserve_entries,
        })
    }

    fn cleanup_steps(
        &self,
        reserve_entries: &[ReserveEntryId],
        displaced: Vec<DriverId>,
        park_displaced: bool,
    ) -> Vec<CleanupStep> {
        let mut steps = Vec::new();
        if !reserve_entries.is_empty() {
            steps.push(CleanupStep::RemoveReserve {
                entries: reserve_entries.to_vec(),
            });
        }
        if park_displaced {
            for driver in displaced {
                steps.push(CleanupStep::ParkDriver {
                    driver,
                    reason: self.config.park_displaced_reason.clone(),
                });
            }
        }
        steps
    }
}

/// New (target, donor) values of one field.
fn exchange<T>(
    date: chrono::NaiveDate,
    target: &DepartureId,
    field: &str,
    on_target: Option<T>,
    on_donor: Option<T>,
    transfer: Transfer,
) -> DispatchResult<(Option<T>, Option<T>)> {
    match transfer {
        Transfer::Move => match on_donor {
            Some(v) => Ok((Some(v), None)),
            None => Err(DispatchError::validation(
                date,
                target,
                format!("donor departure has no {field} to move"),
            )),
        },
        Transfer::Swap => {
            if on_target.is_none() && on_donor.is_none() {
                return Err(DispatchError::validation(
                    date,
                    target,
                    format!("neither departure has a {field} to swap"),
                ));
            }
            Ok((on_donor, on_target))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::models::{Bus, DonorEntry, Driver, DriverStatus, Route, ScheduleTimes};
    use crate::reserve::ReservePool;
    use chrono::{NaiveDate, NaiveTime};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn ctx() -> DispatchContext {
        DispatchContext::new(date(), "C1", "op")
    }

    fn times() -> ScheduleTimes {
        ScheduleTimes::new(
            NaiveTime::from_hms_opt(5, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        )
    }

    struct Fixture {
        ledger: AssignmentLedger,
        plan: DeparturePlan,
        catalog: InMemoryCatalog,
        reserve: ReservePool,
        config: EngineConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let plan = DeparturePlan::new()
                .with_route(
                    Route::new("R12", "C1", "12")
                        .with_departure("D1", times())
                        .with_departure("D2", times()),
                )
                .with_route(Route::new("R40", "C1", "40").with_departure("D3", times()));
            let catalog = InMemoryCatalog::new()
                .with_bus(Bus::new("B-101", "C1"))
                .with_bus(Bus::new("B-202", "C1"))
                .with_bus(Bus::new("B-909", "C1"))
                .with_driver(Driver::new("ivanov", "C1", "Ivanov", "Ivan"))
                .with_driver(Driver::new("petrov", "C1", "Petrov", "Petr"))
                .with_driver(Driver::new("sidorov", "C1", "Sidorov", "Semen"))
                .with_driver(
                    Driver::new("sick", "C1", "Belov", "Boris").with_status(DriverStatus::SickLeave),
                )
                .with_repair_return(date(), "C1", DonorEntry::new("rr-1").with_bus("B-909"))
                .with_order_entry(date(), "C1", DonorEntry::new("o-1").with_driver("sidorov"));

            let mut ledger = AssignmentLedger::new();
            ledger
                .commit(
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
            ledger
                .commit(
                    date(),
                    &DepartureId::from("D2"),
                    Some(BusId::from("B-202")),
                    None,
                    None,
                    AssignmentStatus::Normal,
                    "",
                    None,
                )
                .unwrap();

            Self {
                ledger,
                plan,
                catalog,
                reserve: ReservePool::new(),
                config: EngineConfig::default(),
            }
        }

        fn resolver(&self) -> ReplacementResolver<'_, InMemoryCatalog, ReservePool> {
            ReplacementResolver::new(
                &self.ledger,
                &self.plan,
                &self.catalog,
                &self.reserve,
                &self.config,
            )
        }
    }

    #[test]
    fn test_reserve_replacement_plan() {
        let mut f = Fixture::new();
        let entry = f
            .reserve
            .add(date(), &ctx().convoy, DriverId::from("petrov"), None, "spare".into())
            .unwrap();

        let req = ReplaceRequest::new(
            "D1",
            Replacement::FromReserve {
                entry: entry.id,
                part: ReplacedPart::Driver(Shift::First),
            },
        );
        let r = f.resolver().resolve(&ctx(), &req).unwrap();

        assert_eq!(r.status, AssignmentStatus::ReplacedFromReserve);
        assert_eq!(r.writes.len(), 1);
        assert_eq!(r.writes[0].bus, Some(BusId::from("B-101")));
        assert_eq!(r.writes[0].driver1, Some(DriverId::from("petrov")));
        assert_eq!(
            r.cleanup,
            vec![CleanupStep::RemoveReserve {
                entries: vec![entry.id]
            }]
        );
        assert_eq!(
            r.description,
            "removed: driver Ivanov I. (shift 1); installed: driver Petrov P. (shift 1) from reserve"
        );
    }

    #[test]
    fn test_reserve_bus_only_rejected() {
        let mut f = Fixture::new();
        let entry = f
            .reserve
            .add(
                date(),
                &ctx().convoy,
                DriverId::from("petrov"),
                Some(BusId::from("B-909")),
                "spare".into(),
            )
            .unwrap();
        let req = ReplaceRequest::new(
            "D1",
            Replacement::FromReserve {
                entry: entry.id,
                part: ReplacedPart::Bus,
            },
        );
        assert!(f.resolver().resolve(&ctx(), &req).unwrap_err().is_validation());
    }

    #[test]
    fn test_permutation_bus_swap() {
        let f = Fixture::new();
        let req = ReplaceRequest::new(
            "D1",
            Replacement::Permutation {
                donor: DepartureId::from("D2"),
                part: ReplacedPart::Bus,
                transfer: Transfer::Swap,
            },
        );
        let r = f.resolver().resolve(&ctx(), &req).unwrap();
        assert_eq!(r.writes[0].bus, Some(BusId::from("B-202")));
        assert_eq!(r.writes[1].bus, Some(BusId::from("B-101")));
        assert_eq!(r.writes[0].driver1, Some(DriverId::from("ivanov")));
        assert!(r.cleanup.is_empty());
        assert!(r.description.starts_with("removed: bus B-101; installed: bus B-202 swapped with"));
    }

    #[test]
    fn test_move_parks_displaced_driver() {
        let mut f = Fixture::new();
        f.ledger
            .commit(
                date(),
                &DepartureId::from("D2"),
                Some(BusId::from("B-202")),
                Some(DriverId::from("petrov")),
                None,
                AssignmentStatus::Normal,
                "",
                None,
            )
            .unwrap();
        let req = ReplaceRequest::new(
            "D1",
            Replacement::Permutation {
                donor: DepartureId::from("D2"),
                part: ReplacedPart::Driver(Shift::First),
                transfer: Transfer::Move,
            },
        )
        .parking_displaced();
        let r = f.resolver().resolve(&ctx(), &req).unwrap();

        assert_eq!(r.writes[0].driver1, Some(DriverId::from("petrov")));
        assert_eq!(r.writes[1].driver1, None);
        assert!(r.writes[1].description.contains("moved to departure D1"));
        assert_eq!(
            r.cleanup,
            vec![CleanupStep::ParkDriver {
                driver: DriverId::from("ivanov"),
                reason: "removed from route".into(),
            }]
        );
    }

    #[test]
    fn test_route_relation_enforced() {
        let f = Fixture::new();
        let perm = ReplaceRequest::new(
            "D1",
            Replacement::Permutation {
                donor: DepartureId::from("D3"),
                part: ReplacedPart::Bus,
                transfer: Transfer::Swap,
            },
        );
        assert!(f.resolver().resolve(&ctx(), &perm).unwrap_err().is_validation());

        let rearr = ReplaceRequest::new(
            "D1",
            Replacement::RearrangingRoute {
                donor: DepartureId::from("D2"),
                part: ReplacedPart::Bus,
                transfer: Transfer::Swap,
            },
        );
        assert!(f.resolver().resolve(&ctx(), &rearr).unwrap_err().is_validation());
    }

    #[test]
    fn test_move_from_empty_donor_rejected() {
        let f = Fixture::new();
        let req = ReplaceRequest::new(
            "D1",
            Replacement::RearrangingRoute {
                donor: DepartureId::from("D3"),
                part: ReplacedPart::Bus,
                transfer: Transfer::Move,
            },
        );
        assert!(f.resolver().resolve(&ctx(), &req).unwrap_err().is_validation());
    }

    #[test]
    fn test_repair_and_order_lists() {
        let f = Fixture::new();
        let repair = ReplaceRequest::new(
            "D2",
            Replacement::FromRepair {
                entry: DonorEntryId::from("rr-1"),
                part: ReplacedPart::Bus,
            },
        );
        let r = f.resolver().resolve(&ctx(), &repair).unwrap();
        assert_eq!(r.status, AssignmentStatus::RearrangedFromRepair);
        assert_eq!(r.writes[0].bus, Some(BusId::from("B-909")));
        assert!(r.description.ends_with("from repair return list"));

        let order = ReplaceRequest::new(
            "D2",
            Replacement::FromOrder {
                entry: DonorEntryId::from("o-1"),
                part: ReplacedPart::Driver(Shift::Second),
            },
        );
        let r = f.resolver().resolve(&ctx(), &order).unwrap();
        assert_eq!(r.status, AssignmentStatus::FromOrder);
        assert_eq!(r.writes[0].driver2, Some(DriverId::from("sidorov")));

        let wrong = ReplaceRequest::new(
            "D2",
            Replacement::FromOrder {
                entry: DonorEntryId::from("o-1"),
                part: ReplacedPart::Bus,
            },
        );
        assert!(f.resolver().resolve(&ctx(), &wrong).unwrap_err().is_validation());
    }

    #[test]
    fn test_ineligible_donor_is_conflict() {
        let f = Fixture::new();
        let catalog = f
            .catalog
            .clone()
            .with_order_entry(date(), "C1", DonorEntry::new("o-2").with_driver("sick"));
        let resolver =
            ReplacementResolver::new(&f.ledger, &f.plan, &catalog, &f.reserve, &f.config);
        let req = ReplaceRequest::new(
            "D2",
            Replacement::FromOrder {
                entry: DonorEntryId::from("o-2"),
                part: ReplacedPart::Driver(Shift::First),
            },
        );
        assert!(resolver.resolve(&ctx(), &req).unwrap_err().is_conflict());
    }

    #[test]
    fn test_target_outside_convoy() {
        let f = Fixture::new();
        let other = DispatchContext::new(date(), "C2", "op");
        let req = ReplaceRequest::new(
            "D1",
            Replacement::FromOrder {
                entry: DonorEntryId::from("o-1"),
                part: ReplacedPart::Driver(Shift::First),
            },
        );
        assert!(f.resolver().resolve(&other, &req).unwrap_err().is_validation());
    }

    #[test]
    fn test_donor_outside_convoy_rejected() {
        let mut f = Fixture::new();
        f.plan = f
            .plan
            .clone()
            .with_route(Route::new("R99", "C2", "99").with_departure("X1", times()));
        f.ledger
            .commit(
                date(),
                &DepartureId::from("X1"),
                Some(BusId::from("B-909")),
                Some(DriverId::from("sidorov")),
                None,
                AssignmentStatus::Normal,
                "",
                None,
            )
            .unwrap();

        for transfer in [Transfer::Move, Transfer::Swap] {
            let req = ReplaceRequest::new(
                "D1",
                Replacement::RearrangingRoute {
                    donor: DepartureId::from("X1"),
                    part: ReplacedPart::BusAndDriver(Shift::First),
                    transfer,
                },
            );
            let err = f.resolver().resolve(&ctx(), &req).unwrap_err();
            assert!(err.is_validation());
            assert_eq!(err.departure(), &DepartureId::from("D1"));
        }

        let foreign = DispatchContext::new(date(), "C2", "op");
        let req = ReplaceRequest::new(
            "X1",
            Replacement::RearrangingRoute {
                donor: DepartureId::from("D2"),
                part: ReplacedPart::Bus,
                transfer: Transfer::Swap,
            },
        );
        assert!(f.resolver().resolve(&foreign, &req).unwrap_err().is_validation());
    }

    #[test]
    fn test_reserve_paired_bus_not_installed_from_list() {
        let mut f = Fixture::new();
        let entry = f
            .reserve
            .add(
                date(),
                &ctx().convoy,
                DriverId::from("petrov"),
                Some(BusId::from("B-909")),
                "spare".into(),
            )
            .unwrap();

        let repair = ReplaceRequest::new(
            "D2",
            Replacement::FromRepair {
                entry: DonorEntryId::from("rr-1"),
                part: ReplacedPart::Bus,
            },
        );
        let err = f.resolver().resolve(&ctx(), &repair).unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains(&entry.id.to_string()));

        let own = ReplaceRequest::new(
            "D2",
            Replacement::FromReserve {
                entry: entry.id,
                part: ReplacedPart::BusAndDriver(Shift::First),
            },
        );
        let r = f.resolver().resolve(&ctx(), &own).unwrap();
        assert_eq!(r.writes[0].bus, Some(BusId::from("B-909")));
        assert_eq!(r.reserve_entries, vec![entry.id]);
    }

    #[test]
    fn test_replacement_serde_tagged() {
        let r = Replacement::Permutation {
            donor: DepartureId::from("D2"),
            part: ReplacedPart::Driver(Shift::First),
            transfer: Transfer::Move,
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["category"], "permutation");
        assert_eq!(json["transfer"], "move");
        let back: Replacement = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
