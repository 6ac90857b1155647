//! Route and departure models.
//!
//! A route owns an ordered list of departures ("bus lines"). Each departure
//! is one trip slot that is driven every service day; the per-date resource
//! binding lives in the ledger, not here.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::{ConvoyId, DepartureId, RouteId};

/// Scheduled times of a departure.
///
/// Night services may end after midnight, so `end` is not required to be
/// later than `exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTimes {
    /// Leaves the depot.
    pub exit: NaiveTime,
    /// Driver change between first and second shift, if the line has two.
    pub shift_change: Option<NaiveTime>,
    /// Returns to the depot.
    pub end: NaiveTime,
}

impl ScheduleTimes {
    /// Creates single-shift times.
    pub fn new(exit: NaiveTime, end: NaiveTime) -> Self {
        Self {
            exit,
            shift_change: None,
            end,
        }
    }

    /// Sets the shift change time.
    pub fn with_shift_change(mut self, at: NaiveTime) -> Self {
        self.shift_change = Some(at);
        self
    }

    /// Whether the line is driven in two shifts.
    pub fn is_two_shift(&self) -> bool {
        self.shift_change.is_some()
    }
}

/// One scheduled trip slot of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Departure {
    /// Unique departure identifier.
    pub id: DepartureId,
    /// Owning route.
    pub route: RouteId,
    /// Position within the route (1-based on dispatch sheets).
    pub sequence: u32,
    /// Default scheduled times.
    pub times: ScheduleTimes,
}

impl Departure {
    /// Creates a departure.
    pub fn new(
        id: impl Into<DepartureId>,
        route: impl Into<RouteId>,
        sequence: u32,
        times: ScheduleTimes,
    ) -> Self {
        Self {
            id: id.into(),
            route: route.into(),
            sequence,
            times,
        }
    }
}

/// A route of a convoy with its departures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Unique route identifier.
    pub id: RouteId,
    /// Convoy that operates the route.
    pub convoy: ConvoyId,
    /// Public route number.
    pub number: String,
    /// Departures, kept ordered by sequence.
    pub departures: Vec<Departure>,
}

impl Route {
    /// Creates a route without departures.
    pub fn new(
        id: impl Into<RouteId>,
        convoy: impl Into<ConvoyId>,
        number: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            convoy: convoy.into(),
            number: number.into(),
            departures: Vec::new(),
        }
    }

    /// Adds a departure at the next sequence number.
    pub fn with_departure(mut self, id: impl Into<DepartureId>, times: ScheduleTimes) -> Self {
        let sequence = self.departures.len() as u32 + 1;
        self.departures
            .push(Departure::new(id, self.id.clone(), sequence, times));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_route_builder_sequences() {
        let r = Route::new("R12", "C1", "12")
            .with_departure("12/1", ScheduleTimes::new(t(5, 30), t(14, 0)))
            .with_departure(
                "12/2",
                ScheduleTimes::new(t(6, 0), t(23, 10)).with_shift_change(t(14, 30)),
            );

        assert_eq!(r.departures.len(), 2);
        assert_eq!(r.departures[0].sequence, 1);
        assert_eq!(r.departures[1].sequence, 2);
        assert_eq!(r.departures[1].route, RouteId::from("R12"));
        assert!(!r.departures[0].times.is_two_shift());
        assert!(r.departures[1].times.is_two_shift());
    }
}
