//! Dispatch engine.
//!
//! Orchestrates one convoy's daily dispatch: direct assignments, clears,
//! replacements, reserve operations and schedule edits. Every mutation
//! follows the same two phases:
//!
//! 1. **Target commit.** The ledger write (single slot, or target plus donor
//!    departure) is validated and applied as one unit. A failure here leaves
//!    the dispatch untouched.
//! 2. **Donor cleanup.** Reserve-pool follow-ups (consumed entries, parked
//!    drivers) run against the [`ReserveStore`]. Failures do not undo the
//!    commit; they come back as [`DispatchError::DonorCleanup`] notices with
//!    the steps still pending, for [`DispatchEngine::retry_cleanup`].
//!
//! Each mutation appends one record to the [`ActionLog`].
//!
//! # Example
//! ```
//! use bus_dispatch::{
//!     Bus, CommitRequest, DeparturePlan, DispatchContext, DispatchEngine, Driver,
//!     InMemoryCatalog, Route, ScheduleTimes,
//! };
//! use chrono::{NaiveDate, NaiveTime};
//!
//! let times = ScheduleTimes::new(
//!     NaiveTime::from_hms_opt(5, 30, 0).unwrap(),
//!     NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
//! );
//! let plan = DeparturePlan::new()
//!     .with_route(Route::new("R12", "C1", "12").with_departure("12/1", times));
//! let catalog = InMemoryCatalog::new()
//!     .with_bus(Bus::new("B-101", "C1"))
//!     .with_driver(Driver::new("ivanov", "C1", "Ivanov", "Ivan"));
//!
//! let mut engine = DispatchEngine::new(catalog, plan);
//! let ctx = DispatchContext::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), "C1", "op");
//! let outcome = engine
//!     .assign(
//!         &ctx,
//!         CommitRequest::new("12/1")
//!             .with_bus("B-101")
//!             .with_driver(bus_dispatch::Shift::First, "ivanov"),
//!     )
//!     .unwrap();
//! assert!(outcome.is_clean());
//! assert_eq!(engine.audit_log().len(), 1);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::audit::{ActionDraft, ActionLog, ActionRecord, ActionStatus};
use crate::catalog::ResourceCatalog;
use crate::error::{DispatchError, DispatchResult};
use crate::guard::{BusyMap, ConflictGuard};
use crate::ledger::{AssignmentLedger, SlotWrite};
use crate::models::{
    Assignment, AssignmentStatus, Bus, BusId, Departure, DepartureId, DispatchContext, DonorEntry,
    Driver, DriverId, ReserveEntry, ReserveEntryId, Role, RouteId, ScheduleTimes, Shift,
};
use crate::plan::{DeparturePlan, ScheduleEdit};
use crate::policy::EngineConfig;
use crate::reserve::{ReservePool, ReserveStore};
use crate::resolver::{ChangeNote, CleanupStep, ReplaceRequest, ReplacementResolver};

/// Line name used in errors raised by reserve operations.
pub const RESERVE_LINE: &str = "reserve";

/// A direct write of one departure's bus and drivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Target departure.
    pub departure: DepartureId,
    /// Bus to put on the line.
    pub bus: Option<BusId>,
    /// First-shift driver.
    pub driver1: Option<DriverId>,
    /// Second-shift driver.
    pub driver2: Option<DriverId>,
    /// Status tag to record.
    pub status: AssignmentStatus,
    /// Description; generated from the change when absent.
    pub description: Option<String>,
}

impl CommitRequest {
    /// An empty request with status `Normal`.
    pub fn new(departure: impl Into<DepartureId>) -> Self {
        Self {
            departure: departure.into(),
            bus: None,
            driver1: None,
            driver2: None,
            status: AssignmentStatus::Normal,
            description: None,
        }
    }

    /// Sets the bus.
    pub fn with_bus(mut self, bus: impl Into<BusId>) -> Self {
        self.bus = Some(bus.into());
        self
    }

    /// Sets the driver of a shift.
    pub fn with_driver(mut self, shift: Shift, driver: impl Into<DriverId>) -> Self {
        match shift {
            Shift::First => self.driver1 = Some(driver.into()),
            Shift::Second => self.driver2 = Some(driver.into()),
        }
        self
    }

    /// Sets the status tag.
    pub fn with_status(mut self, status: AssignmentStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn driver(&self, shift: Shift) -> Option<&DriverId> {
        match shift {
            Shift::First => self.driver1.as_ref(),
            Shift::Second => self.driver2.as_ref(),
        }
    }
}

/// Result of a committed mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Committed assignments, target first.
    pub assignments: Vec<Assignment>,
    /// Donor cleanup failures; the commit stands regardless.
    pub notices: Vec<DispatchError>,
    /// Cleanup steps that did not complete.
    pub pending_cleanup: Vec<CleanupStep>,
}

impl DispatchOutcome {
    /// The target's new assignment.
    pub fn target(&self) -> Option<&Assignment> {
        self.assignments.first()
    }

    /// Whether every cleanup step completed.
    pub fn is_clean(&self) -> bool {
        self.notices.is_empty()
    }
}

/// One line of a dispatch table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRow {
    /// Route id.
    pub route: RouteId,
    /// Public route number.
    pub route_number: String,
    /// The departure.
    pub departure: Departure,
    /// Times for the date, edits applied.
    pub times: ScheduleTimes,
    /// Binding for the date.
    pub assignment: Assignment,
}

/// Daily dispatch over a catalog, a departure plan and a reserve store.
pub struct DispatchEngine<C: ResourceCatalog, R: ReserveStore = ReservePool> {
    catalog: C,
    plan: DeparturePlan,
    ledger: AssignmentLedger,
    reserve: R,
    log: ActionLog,
    config: EngineConfig,
}

impl<C: ResourceCatalog> DispatchEngine<C, ReservePool> {
    /// Creates an engine with an in-memory reserve pool and default config.
    pub fn new(catalog: C, plan: DeparturePlan) -> Self {
        let config = EngineConfig::default();
        Self {
            catalog,
            plan,
            ledger: AssignmentLedger::new()
                .with_second_shift_exclusive(config.policy.second_shift_exclusive),
            reserve: ReservePool::new(),
            log: ActionLog::new(),
            config,
        }
    }
}

impl<C: ResourceCatalog, R: ReserveStore> DispatchEngine<C, R> {
    /// Replaces the reserve store.
    pub fn with_reserve_store<R2: ReserveStore>(self, reserve: R2) -> DispatchEngine<C, R2> {
        DispatchEngine {
            catalog: self.catalog,
            plan: self.plan,
            ledger: self.ledger,
            reserve,
            log: self.log,
            config: self.config,
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.ledger = self
            .ledger
            .with_second_shift_exclusive(config.policy.second_shift_exclusive);
        self.config = config;
        self
    }

    /// Restores previously persisted ledger state.
    pub fn with_ledger(mut self, ledger: AssignmentLedger) -> Self {
        self.ledger = ledger.with_second_shift_exclusive(self.config.policy.second_shift_exclusive);
        self
    }

    /// Configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resource catalog.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Mutable resource catalog, for status updates.
    pub fn catalog_mut(&mut self) -> &mut C {
        &mut self.catalog
    }

    /// Departure plan.
    pub fn plan(&self) -> &DeparturePlan {
        &self.plan
    }

    /// Assignment ledger.
    pub fn ledger(&self) -> &AssignmentLedger {
        &self.ledger
    }

    /// Reserve store.
    pub fn reserve(&self) -> &R {
        &self.reserve
    }

    /// Mutable reserve store.
    pub fn reserve_mut(&mut self) -> &mut R {
        &mut self.reserve
    }

    /// Action log.
    pub fn audit_log(&self) -> &ActionLog {
        &self.log
    }

    /// Removes and returns the log records of service dates before `date`.
    pub fn drain_audit_before(&mut self, date: NaiveDate) -> Vec<ActionRecord> {
        let drained = self.log.drain_before(date);
        debug!(%date, drained = drained.len(), "action log trimmed");
        drained
    }

    fn guard(&self) -> ConflictGuard<'_, C> {
        ConflictGuard::new(&self.ledger, &self.catalog, &self.config.policy)
    }

    fn resolver(&self) -> ReplacementResolver<'_, C, R> {
        ReplacementResolver::new(
            &self.ledger,
            &self.plan,
            &self.catalog,
            &self.reserve,
            &self.config,
        )
    }

    // ======================== Queries ========================

    /// Binding of a departure on a date.
    pub fn get(&self, date: NaiveDate, departure: &DepartureId) -> Assignment {
        self.ledger.get(date, departure)
    }

    /// Whether a resource may take a role on a date.
    ///
    /// Reserve membership does not make a driver unavailable here; the
    /// engine consumes the entry when the driver is installed.
    pub fn check_available(
        &self,
        date: NaiveDate,
        role: Role,
        resource: &str,
        exclude: Option<&DepartureId>,
    ) -> bool {
        self.guard().check_available(date, role, resource, exclude)
    }

    /// Where every bus and driver is bound on a date, with routes and
    /// reserve membership.
    pub fn busy_map(&self, date: NaiveDate) -> BusyMap {
        let mut map = self
            .guard()
            .busy_map(date)
            .with_reserve(self.reserve.list_all(date));
        for occ in map.buses.values_mut().chain(map.drivers.values_mut()).flatten() {
            occ.route = self.plan.route_of(&occ.departure).map(|r| r.id.clone());
        }
        map
    }

    /// Buses of the convoy that are eligible and not committed on the date.
    ///
    /// Buses pre-paired in a reserve entry are left out.
    pub fn free_buses(&self, ctx: &DispatchContext) -> Vec<Bus> {
        let guard = self.guard();
        let line = DepartureId::from(RESERVE_LINE);
        self.catalog
            .buses(&ctx.convoy)
            .into_iter()
            .filter(|b| {
                guard.verify_bus(ctx.date, &line, &b.id, None, true).is_ok()
                    && self.reserve.find_bus(ctx.date, &b.id).is_none()
            })
            .collect()
    }

    /// Drivers of the convoy that are eligible for a shift and not committed
    /// on the date. Reserved drivers are offered through the reserve list.
    pub fn free_drivers(&self, ctx: &DispatchContext, shift: Shift) -> Vec<Driver> {
        let guard = self.guard();
        let line = DepartureId::from(RESERVE_LINE);
        self.catalog
            .drivers(&ctx.convoy)
            .into_iter()
            .filter(|d| {
                guard
                    .verify_driver(ctx.date, &line, &d.id, shift, None, true)
                    .is_ok()
                    && self.ledger.driver_holders(ctx.date, &d.id).is_empty()
                    && self.reserve.find_driver(ctx.date, &d.id).is_none()
            })
            .collect()
    }

    /// Reserve entries of the context's date and convoy.
    pub fn reserve_list(&self, ctx: &DispatchContext) -> Vec<ReserveEntry> {
        self.reserve.list_by_date(ctx.date, &ctx.convoy)
    }

    /// Repair-return list of the context's date and convoy.
    pub fn repair_returns(&self, ctx: &DispatchContext) -> Vec<DonorEntry> {
        self.catalog.repair_returns(ctx.date, &ctx.convoy)
    }

    /// Order list of the context's date and convoy.
    pub fn order_list(&self, ctx: &DispatchContext) -> Vec<DonorEntry> {
        self.catalog.order_list(ctx.date, &ctx.convoy)
    }

    /// Dispatch table of one route, in sequence order.
    pub fn route_table(&self, date: NaiveDate, route: &RouteId) -> Vec<DispatchRow> {
        let Some(r) = self.plan.route(route) else {
            return Vec::new();
        };
        r.departures
            .iter()
            .map(|d| DispatchRow {
                route: r.id.clone(),
                route_number: r.number.clone(),
                departure: d.clone(),
                times: self.plan.times_on(date, d),
                assignment: self.ledger.get(date, &d.id),
            })
            .collect()
    }

    /// Dispatch table of the convoy, by route then sequence.
    pub fn convoy_table(&self, ctx: &DispatchContext) -> Vec<DispatchRow> {
        self.plan
            .routes_of(&ctx.convoy)
            .flat_map(|r| self.route_table(ctx.date, &r.id))
            .collect()
    }

    // ======================== Mutations ========================

    /// Writes a departure's bus and drivers.
    ///
    /// Every given resource is checked for status and exclusivity. A driver
    /// installed from the reserve pool loses their reserve entry. A bus
    /// pre-paired in a reserve entry is only accepted together with that
    /// entry's driver.
    ///
    /// # Errors
    /// `Validation` for an unknown departure or resource, `Conflict` when a
    /// resource is ineligible or bound elsewhere on the date.
    #[instrument(skip(self))]
    pub fn assign(
        &mut self,
        ctx: &DispatchContext,
        request: CommitRequest,
    ) -> DispatchResult<DispatchOutcome> {
        let date = ctx.date;
        let dep = request.departure.clone();
        let current = self.ledger.get(date, &dep);

        let (description, buses, drivers, reserve_entries) = {
            let resolver = self.resolver();
            let guard = self.guard();
            resolver.target_departure(ctx, &dep)?;
            if let Some(bus) = &request.bus {
                guard.verify_bus(date, &dep, bus, Some(&dep), true)?;
            }
            for shift in [Shift::First, Shift::Second] {
                if let Some(driver) = request.driver(shift) {
                    guard.verify_driver(date, &dep, driver, shift, Some(&dep), true)?;
                }
            }

            let mut note = ChangeNote::default();
            if current.bus != request.bus {
                if let Some(old) = &current.bus {
                    note.removed.push(resolver.bus_label(old));
                }
                if let Some(new) = &request.bus {
                    note.installed.push(resolver.bus_label(new));
                }
            }
            let mut installed = Vec::new();
            for shift in [Shift::First, Shift::Second] {
                if current.driver(shift) == request.driver(shift) {
                    continue;
                }
                if let Some(old) = current.driver(shift) {
                    note.removed.push(resolver.driver_label(old, shift));
                }
                if let Some(new) = request.driver(shift) {
                    note.installed.push(resolver.driver_label(new, shift));
                    installed.push(new.clone());
                }
            }

            let description = match &request.description {
                Some(d) => d.clone(),
                None => {
                    let text = note.render("", None);
                    if text.is_empty() {
                        "no change".to_string()
                    } else {
                        text
                    }
                }
            };
            let buses: Vec<BusId> = current.bus.iter().chain(request.bus.iter()).cloned().collect();
            let drivers: Vec<DriverId> = current
                .drivers()
                .map(|(_, d)| d.clone())
                .chain(installed.iter().cloned())
                .collect();
            let reserve_entries = resolver.reserve_consumption(ctx, installed.iter(), &[]);
            if let Some(bus) = &request.bus {
                resolver.verify_bus_unreserved(ctx, &dep, bus, &reserve_entries)?;
            }
            (description, buses, drivers, reserve_entries)
        };

        let write = SlotWrite {
            departure: dep.clone(),
            bus: request.bus,
            driver1: request.driver1,
            driver2: request.driver2,
            status: request.status,
            description: description.clone(),
        };
        let assignments = self.ledger.apply(date, vec![write], Some(&ctx.actor))?;

        let mut steps = Vec::new();
        if !reserve_entries.is_empty() {
            steps.push(CleanupStep::RemoveReserve {
                entries: reserve_entries.clone(),
            });
        }
        let (notices, pending_cleanup) = self.run_cleanup(ctx, &dep, steps);

        let mut draft = ActionDraft::new(
            ctx.actor.clone(),
            date,
            ActionStatus::for_status(request.status),
        )
        .departure(dep.clone())
        .buses(&buses)
        .drivers(&drivers)
        .description(description);
        for id in &reserve_entries {
            draft = draft.reserve_entry(*id);
        }
        self.log.append(draft);

        info!(%date, departure = %dep, status = %request.status, "assignment committed");
        Ok(DispatchOutcome {
            assignments,
            notices,
            pending_cleanup,
        })
    }

    /// Resets a departure to unassigned.
    ///
    /// With `park_displaced`, the removed drivers are parked in reserve.
    #[instrument(skip(self))]
    pub fn clear(
        &mut self,
        ctx: &DispatchContext,
        departure: &DepartureId,
        park_displaced: bool,
    ) -> DispatchResult<DispatchOutcome> {
        let date = ctx.date;
        let current = self.ledger.get(date, departure);

        let description = {
            let resolver = self.resolver();
            resolver.target_departure(ctx, departure)?;
            let mut note = ChangeNote::default();
            if let Some(bus) = &current.bus {
                note.removed.push(resolver.bus_label(bus));
            }
            for (shift, driver) in current.drivers() {
                note.removed.push(resolver.driver_label(driver, shift));
            }
            if note.removed.is_empty() {
                "nothing to clear".to_string()
            } else {
                note.render("", None)
            }
        };

        let cleared = self.ledger.clear(date, departure, Some(&ctx.actor))?;

        let steps: Vec<CleanupStep> = if park_displaced {
            current
                .drivers()
                .map(|(_, driver)| CleanupStep::ParkDriver {
                    driver: driver.clone(),
                    reason: self.config.park_displaced_reason.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };
        let (notices, pending_cleanup) = self.run_cleanup(ctx, departure, steps);

        self.log.append(
            ActionDraft::new(ctx.actor.clone(), date, ActionStatus::Cleared)
                .departure(departure.clone())
                .buses(current.bus.iter())
                .drivers(current.drivers().map(|(_, d)| d))
                .description(description),
        );

        info!(%date, %departure, "departure cleared");
        Ok(DispatchOutcome {
            assignments: vec![cleared],
            notices,
            pending_cleanup,
        })
    }

    /// Applies a replacement.
    ///
    /// The target (and donor departure, if any) are committed first as one
    /// unit. Reserve follow-ups run after; their failures are returned as
    /// notices and never undo the commit.
    ///
    /// # Errors
    /// `Validation` or `Conflict` from resolution or from the ledger write.
    #[instrument(skip(self))]
    pub fn replace(
        &mut self,
        ctx: &DispatchContext,
        request: ReplaceRequest,
    ) -> DispatchResult<DispatchOutcome> {
        let resolved = self.resolver().resolve(ctx, &request)?;
        let departures: Vec<DepartureId> =
            resolved.writes.iter().map(|w| w.departure.clone()).collect();

        let assignments = self
            .ledger
            .apply(ctx.date, resolved.writes, Some(&ctx.actor))?;
        let (notices, pending_cleanup) = self.run_cleanup(ctx, &request.target, resolved.cleanup);

        let mut draft = ActionDraft::new(
            ctx.actor.clone(),
            ctx.date,
            ActionStatus::for_status(resolved.status),
        )
        .buses(&resolved.buses)
        .drivers(&resolved.drivers)
        .description(resolved.description);
        for d in departures {
            draft = draft.departure(d);
        }
        for id in &resolved.reserve_entries {
            draft = draft.reserve_entry(*id);
        }
        self.log.append(draft);

        info!(
            date = %ctx.date,
            target = %request.target,
            status = %resolved.status,
            notices = notices.len(),
            "replacement committed"
        );
        Ok(DispatchOutcome {
            assignments,
            notices,
            pending_cleanup,
        })
    }

    /// Re-runs cleanup steps that failed earlier.
    ///
    /// Steps are idempotent; the outcome carries no assignments.
    #[instrument(skip(self))]
    pub fn retry_cleanup(
        &mut self,
        ctx: &DispatchContext,
        departure: &DepartureId,
        steps: Vec<CleanupStep>,
    ) -> DispatchOutcome {
        let (notices, pending_cleanup) = self.run_cleanup(ctx, departure, steps);
        DispatchOutcome {
            assignments: Vec::new(),
            notices,
            pending_cleanup,
        }
    }

    /// Changes a departure's times for the context's date.
    #[instrument(skip(self))]
    pub fn edit_schedule(
        &mut self,
        ctx: &DispatchContext,
        departure: &DepartureId,
        edit: &ScheduleEdit,
    ) -> DispatchResult<ScheduleTimes> {
        self.resolver().target_departure(ctx, departure)?;
        let times = self.plan.edit_schedule(ctx.date, departure, edit)?;

        let mut description = format!("schedule: exit {}", times.exit.format("%H:%M"));
        if let Some(change) = times.shift_change {
            description.push_str(&format!(", shift change {}", change.format("%H:%M")));
        }
        description.push_str(&format!(", end {}", times.end.format("%H:%M")));
        self.log.append(
            ActionDraft::new(ctx.actor.clone(), ctx.date, ActionStatus::ScheduleEdit)
                .departure(departure.clone())
                .description(description),
        );
        info!(date = %ctx.date, %departure, "schedule edited");
        Ok(times)
    }

    /// Parks a driver (optionally with a bus) in the reserve pool.
    ///
    /// # Errors
    /// `Validation` for unknown resources, `Conflict` when the driver or the
    /// bus is committed to a departure on the date, or the bus is pre-paired
    /// with another reserved driver.
    #[instrument(skip(self))]
    pub fn add_to_reserve(
        &mut self,
        ctx: &DispatchContext,
        driver: DriverId,
        bus: Option<BusId>,
        reason: &str,
    ) -> DispatchResult<ReserveEntry> {
        let date = ctx.date;
        let line = DepartureId::from(RESERVE_LINE);
        if self.catalog.driver(&driver).is_none() {
            return Err(DispatchError::validation(date, &line, format!("unknown driver {driver}")));
        }
        if let Some((holder, shift)) = self.ledger.driver_holders(date, &driver).first() {
            return Err(DispatchError::conflict(
                date,
                &line,
                format!("driver {driver}"),
                format!("assigned to {} (shift {})", holder.departure, shift.number()),
            ));
        }
        if let Some(other) = self.reserve.find_driver(date, &driver) {
            if other.convoy != ctx.convoy {
                return Err(DispatchError::conflict(
                    date,
                    &line,
                    format!("driver {driver}"),
                    format!("already reserved by convoy {} in entry {}", other.convoy, other.id),
                ));
            }
        }
        if let Some(bus) = &bus {
            if self.catalog.bus(bus).is_none() {
                return Err(DispatchError::validation(date, &line, format!("unknown bus {bus}")));
            }
            if let Some(holder) = self.ledger.bus_holder(date, bus) {
                return Err(DispatchError::conflict(
                    date,
                    &line,
                    format!("bus {bus}"),
                    format!("assigned to {}", holder.departure),
                ));
            }
            // An entry of the same driver is replaced by this add.
            if let Some(other) = self.reserve.find_bus(date, bus) {
                if !(other.driver == driver && other.convoy == ctx.convoy) {
                    let held =
                        format!("pre-paired with driver {} in reserve entry {}", other.driver, other.id);
                    return Err(DispatchError::conflict(date, &line, format!("bus {bus}"), held));
                }
            }
        }

        let entry = self
            .reserve
            .add(date, &ctx.convoy, driver, bus, reason.to_string())
            .map_err(|e| DispatchError::DonorCleanup {
                date,
                departure: line.clone(),
                step: "reserve_add".to_string(),
                message: e.to_string(),
            })?;
        self.log.append(
            ActionDraft::new(ctx.actor.clone(), date, ActionStatus::ReserveAdded)
                .departure(line)
                .drivers([&entry.driver])
                .buses(entry.bus.iter())
                .reserve_entry(entry.id)
                .description(format!("added to reserve: {reason}")),
        );
        info!(%date, entry = %entry.id, driver = %entry.driver, "reserve entry added");
        Ok(entry)
    }

    /// Removes reserve entries. Unknown ids are ignored.
    #[instrument(skip(self))]
    pub fn remove_from_reserve(
        &mut self,
        ctx: &DispatchContext,
        ids: &[ReserveEntryId],
    ) -> DispatchResult<usize> {
        let line = DepartureId::from(RESERVE_LINE);
        let drivers: Vec<DriverId> = ids
            .iter()
            .filter_map(|id| self.reserve.get(*id))
            .map(|e| e.driver)
            .collect();
        let removed = self
            .reserve
            .remove(ids)
            .map_err(|e| DispatchError::DonorCleanup {
                date: ctx.date,
                departure: line.clone(),
                step: "reserve_remove".to_string(),
                message: e.to_string(),
            })?;

        let mut draft = ActionDraft::new(ctx.actor.clone(), ctx.date, ActionStatus::ReserveRemoved)
            .departure(line)
            .drivers(&drivers)
            .description(format!("removed {removed} reserve entries"));
        for id in ids {
            draft = draft.reserve_entry(*id);
        }
        self.log.append(draft);
        Ok(removed)
    }

    fn run_cleanup(
        &mut self,
        ctx: &DispatchContext,
        departure: &DepartureId,
        steps: Vec<CleanupStep>,
    ) -> (Vec<DispatchError>, Vec<CleanupStep>) {
        let mut notices = Vec::new();
        let mut pending = Vec::new();
        for step in steps {
            if let Err(message) = self.run_step(ctx, &step) {
                warn!(
                    date = %ctx.date,
                    %departure,
                    step = step.name(),
                    %message,
                    "donor cleanup failed"
                );
                notices.push(DispatchError::DonorCleanup {
                    date: ctx.date,
                    departure: departure.clone(),
                    step: step.name().to_string(),
                    message,
                });
                pending.push(step);
            }
        }
        (notices, pending)
    }

    fn run_step(&mut self, ctx: &DispatchContext, step: &CleanupStep) -> Result<(), String> {
        match step {
            CleanupStep::RemoveReserve { entries } => {
                let removed = self.reserve.remove(entries).map_err(|e| e.to_string())?;
                debug!(date = %ctx.date, removed, "reserve entries consumed");
                Ok(())
            }
            CleanupStep::ParkDriver { driver, reason } => {
                if !self.ledger.driver_holders(ctx.date, driver).is_empty() {
                    return Err(format!("driver {driver} is assigned again"));
                }
                let entry = self
                    .reserve
                    .add(ctx.date, &ctx.convoy, driver.clone(), None, reason.clone())
                    .map_err(|e| e.to_string())?;
                self.log.append(
                    ActionDraft::new(ctx.actor.clone(), ctx.date, ActionStatus::ReserveAdded)
                        .departure(DepartureId::from(RESERVE_LINE))
                        .drivers([driver])
                        .reserve_entry(entry.id)
                        .description(format!("added to reserve: {reason}")),
                );
                debug!(date = %ctx.date, %driver, entry = %entry.id, "displaced driver parked");
                Ok(())
            }
        }
    }
}

/// Engine handle shared between operator sessions.
///
/// Every call runs under one lock, so two operators racing for the same
/// resource are serialised and the second sees the first's commit.
pub struct SharedDispatch<C: ResourceCatalog, R: ReserveStore = ReservePool> {
    inner: Arc<Mutex<DispatchEngine<C, R>>>,
}

impl<C: ResourceCatalog, R: ReserveStore> Clone for SharedDispatch<C, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: ResourceCatalog, R: ReserveStore> SharedDispatch<C, R> {
    /// Wraps an engine.
    pub fn new(engine: DispatchEngine<C, R>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Locks the engine.
    ///
    /// A panic in another session does not leave the ledger half-written
    /// (writes are validated before they land), so a poisoned lock is
    /// recovered.
    pub fn lock(&self) -> MutexGuard<'_, DispatchEngine<C, R>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs a closure against the locked engine.
    pub fn with<T>(&self, f: impl FnOnce(&mut DispatchEngine<C, R>) -> T) -> T {
        f(&mut self.lock())
    }

    /// See [`DispatchEngine::assign`].
    pub fn assign(
        &self,
        ctx: &DispatchContext,
        request: CommitRequest,
    ) -> DispatchResult<DispatchOutcome> {
        self.lock().assign(ctx, request)
    }

    /// See [`DispatchEngine::replace`].
    pub fn replace(
        &self,
        ctx: &DispatchContext,
        request: ReplaceRequest,
    ) -> DispatchResult<DispatchOutcome> {
        self.lock().replace(ctx, request)
    }

    /// See [`DispatchEngine::clear`].
    pub fn clear(
        &self,
        ctx: &DispatchContext,
        departure: &DepartureId,
        park_displaced: bool,
    ) -> DispatchResult<DispatchOutcome> {
        self.lock().clear(ctx, departure, park_displaced)
    }
}
