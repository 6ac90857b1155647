//! Departure plan.
//!
//! Route configuration projected onto service dates. The plan knows which
//! departures exist, their order, and their scheduled times, including
//! per-date time edits made by dispatchers. It never holds resources; the
//! engine joins ledger entries onto it to build dispatch tables.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{DispatchError, DispatchResult};
use crate::models::{ConvoyId, Departure, DepartureId, Route, RouteId, ScheduleTimes};

/// A change to a departure's times for one date.
///
/// `None` fields keep the current value. Times are `HH:MM` or `HH:MM:SS`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEdit {
    /// New exit time.
    pub exit: Option<String>,
    /// New shift change time; an empty string removes it.
    pub shift_change: Option<String>,
    /// New end time.
    pub end: Option<String>,
}

impl ScheduleEdit {
    /// Creates an empty edit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the exit time.
    pub fn with_exit(mut self, time: impl Into<String>) -> Self {
        self.exit = Some(time.into());
        self
    }

    /// Sets the shift change time.
    pub fn with_shift_change(mut self, time: impl Into<String>) -> Self {
        self.shift_change = Some(time.into());
        self
    }

    /// Sets the end time.
    pub fn with_end(mut self, time: impl Into<String>) -> Self {
        self.end = Some(time.into());
        self
    }

    /// Whether the edit changes nothing.
    pub fn is_empty(&self) -> bool {
        self.exit.is_none() && self.shift_change.is_none() && self.end.is_none()
    }
}

/// Parses a dispatch-sheet time (`HH:MM` or `HH:MM:SS`).
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// Routes and departures with per-date time overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeparturePlan {
    routes: BTreeMap<RouteId, Route>,
    index: HashMap<DepartureId, RouteId>,
    overrides: BTreeMap<NaiveDate, HashMap<DepartureId, ScheduleTimes>>,
}

impl DeparturePlan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a route.
    pub fn with_route(mut self, route: Route) -> Self {
        self.upsert_route(route);
        self
    }

    /// Adds or replaces a route in place.
    pub fn upsert_route(&mut self, mut route: Route) {
        if let Some(old) = self.routes.remove(&route.id) {
            for d in &old.departures {
                self.index.remove(&d.id);
            }
        }
        route.departures.sort_by_key(|d| d.sequence);
        for d in &route.departures {
            self.index.insert(d.id.clone(), route.id.clone());
        }
        self.routes.insert(route.id.clone(), route);
    }

    /// Looks up a route.
    pub fn route(&self, id: &RouteId) -> Option<&Route> {
        self.routes.get(id)
    }

    /// Routes of a convoy, ordered by id.
    pub fn routes_of<'a>(&'a self, convoy: &'a ConvoyId) -> impl Iterator<Item = &'a Route> + 'a {
        self.routes.values().filter(move |r| &r.convoy == convoy)
    }

    /// Looks up a departure.
    pub fn departure(&self, id: &DepartureId) -> Option<&Departure> {
        let route = self.index.get(id)?;
        self.routes.get(route)?.departures.iter().find(|d| &d.id == id)
    }

    /// Route of a departure.
    pub fn route_of(&self, id: &DepartureId) -> Option<&Route> {
        self.index.get(id).and_then(|r| self.routes.get(r))
    }

    /// Departures of a route in sequence order.
    pub fn departures(&self, route: &RouteId) -> &[Departure] {
        self.routes
            .get(route)
            .map(|r| r.departures.as_slice())
            .unwrap_or(&[])
    }

    /// Times of a departure on a date, with edits applied.
    pub fn times_on(&self, date: NaiveDate, departure: &Departure) -> ScheduleTimes {
        self.overrides
            .get(&date)
            .and_then(|day| day.get(&departure.id))
            .copied()
            .unwrap_or(departure.times)
    }

    /// Changes a departure's times for one date.
    ///
    /// # Errors
    /// `Validation` for an unknown departure, an empty edit, or a
    /// malformed time value. Nothing changes on error.
    pub fn edit_schedule(
        &mut self,
        date: NaiveDate,
        departure: &DepartureId,
        edit: &ScheduleEdit,
    ) -> DispatchResult<ScheduleTimes> {
        let Some(dep) = self.departure(departure) else {
            return Err(DispatchError::validation(date, departure, "unknown departure"));
        };
        if edit.is_empty() {
            return Err(DispatchError::validation(date, departure, "schedule edit changes nothing"));
        }

        let mut times = self.times_on(date, dep);
        let parse = |field: &str, value: &str| {
            parse_time(value).ok_or_else(|| {
                DispatchError::validation(
                    date,
                    departure,
                    format!("malformed {field} time `{value}`"),
                )
            })
        };
        if let Some(v) = &edit.exit {
            times.exit = parse("exit", v)?;
        }
        if let Some(v) = &edit.shift_change {
            times.shift_change = if v.trim().is_empty() {
                None
            } else {
                Some(parse("shift change", v)?)
            };
        }
        if let Some(v) = &edit.end {
            times.end = parse("end", v)?;
        }

        self.overrides
            .entry(date)
            .or_default()
            .insert(departure.clone(), times);
        Ok(times)
    }
}
