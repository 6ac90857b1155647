//! Action log.
//!
//! Every committed change to the dispatch leaves one entry: who did what to
//! which departure, with which resources, and the human-readable
//! description shown in the day's history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{ActorId, AssignmentStatus, BusId, DepartureId, DriverId, ReserveEntryId};

/// Short action label recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Assigned,
    Replaced,
    Permutation,
    RearrangingRoute,
    RearrangementRenovation,
    FromOrder,
    Cleared,
    ScheduleEdit,
    ReserveAdded,
    ReserveRemoved,
}

impl ActionStatus {
    /// Label for a committed assignment status.
    pub fn for_status(status: AssignmentStatus) -> Self {
        match status {
            AssignmentStatus::Unassigned => ActionStatus::Cleared,
            AssignmentStatus::Normal => ActionStatus::Assigned,
            AssignmentStatus::ReplacedFromReserve => ActionStatus::Replaced,
            AssignmentStatus::Permutation => ActionStatus::Permutation,
            AssignmentStatus::RearrangedRoute => ActionStatus::RearrangingRoute,
            AssignmentStatus::RearrangedFromRepair => ActionStatus::RearrangementRenovation,
            AssignmentStatus::FromOrder => ActionStatus::FromOrder,
        }
    }

    /// Label as stored.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Assigned => "assigned",
            ActionStatus::Replaced => "replaced",
            ActionStatus::Permutation => "permutation",
            ActionStatus::RearrangingRoute => "rearranging_route",
            ActionStatus::RearrangementRenovation => "rearrangement_renovation",
            ActionStatus::FromOrder => "from_order",
            ActionStatus::Cleared => "cleared",
            ActionStatus::ScheduleEdit => "schedule_edit",
            ActionStatus::ReserveAdded => "reserve_added",
            ActionStatus::ReserveRemoved => "reserve_removed",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Sequence number, starting at 1.
    pub seq: u64,
    /// Wall-clock time of the action.
    pub at: DateTime<Utc>,
    /// Operator.
    pub actor: ActorId,
    /// Service date acted on.
    pub date: NaiveDate,
    /// Departures touched (target first).
    pub departures: Vec<DepartureId>,
    /// Buses involved.
    pub buses: Vec<BusId>,
    /// Drivers involved.
    pub drivers: Vec<DriverId>,
    /// Reserve entries involved.
    pub reserve_entries: Vec<ReserveEntryId>,
    /// Action label.
    pub action: ActionStatus,
    /// Description.
    pub description: String,
}

/// Builder for an entry before it gets its sequence number.
#[derive(Debug, Clone)]
pub struct ActionDraft {
    actor: ActorId,
    date: NaiveDate,
    action: ActionStatus,
    departures: Vec<DepartureId>,
    buses: Vec<BusId>,
    drivers: Vec<DriverId>,
    reserve_entries: Vec<ReserveEntryId>,
    description: String,
}

impl ActionDraft {
    /// Starts a draft.
    pub fn new(actor: ActorId, date: NaiveDate, action: ActionStatus) -> Self {
        Self {
            actor,
            date,
            action,
            departures: Vec::new(),
            buses: Vec::new(),
            drivers: Vec::new(),
            reserve_entries: Vec::new(),
            description: String::new(),
        }
    }

    /// Adds a departure.
    pub fn departure(mut self, id: DepartureId) -> Self {
        if !self.departures.contains(&id) {
            self.departures.push(id);
        }
        self
    }

    /// Adds buses, skipping duplicates.
    pub fn buses<'a>(mut self, ids: impl IntoIterator<Item = &'a BusId>) -> Self {
        for id in ids {
            if !self.buses.contains(id) {
                self.buses.push(id.clone());
            }
        }
        self
    }

    /// Adds drivers, skipping duplicates.
    pub fn drivers<'a>(mut self, ids: impl IntoIterator<Item = &'a DriverId>) -> Self {
        for id in ids {
            if !self.drivers.contains(id) {
                self.drivers.push(id.clone());
            }
        }
        self
    }

    /// Adds a reserve entry.
    pub fn reserve_entry(mut self, id: ReserveEntryId) -> Self {
        self.reserve_entries.push(id);
        self
    }

    /// Sets the description.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }
}

/// Action log, appended by every mutation.
///
/// Records are only removed in whole dates through [`ActionLog::drain_before`].
/// Sequence numbers keep counting across drains.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionLog {
    records: Vec<ActionRecord>,
    #[serde(default)]
    last_seq: u64,
}

impl ActionLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a draft, stamping it with the current time.
    pub fn append(&mut self, draft: ActionDraft) -> &ActionRecord {
        self.last_seq = self.last_seq.max(self.records.last().map_or(0, |r| r.seq)) + 1;
        let record = ActionRecord {
            seq: self.last_seq,
            at: Utc::now(),
            actor: draft.actor,
            date: draft.date,
            departures: draft.departures,
            buses: draft.buses,
            drivers: draft.drivers,
            reserve_entries: draft.reserve_entries,
            action: draft.action,
            description: draft.description,
        };
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// All records in append order.
    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    /// Records of a date.
    pub fn for_date(&self, date: NaiveDate) -> impl Iterator<Item = &ActionRecord> {
        self.records.iter().filter(move |r| r.date == date)
    }

    /// Records touching a departure.
    pub fn for_departure<'a>(
        &'a self,
        departure: &'a DepartureId,
    ) -> impl Iterator<Item = &'a ActionRecord> {
        self.records
            .iter()
            .filter(move |r| r.departures.contains(departure))
    }

    /// Removes and returns the records of service dates before `date`.
    pub fn drain_before(&mut self, date: NaiveDate) -> Vec<ActionRecord> {
        let (old, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|r| r.date < date);
        self.records = kept;
        old
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        assert_eq!(
            ActionStatus::for_status(AssignmentStatus::ReplacedFromReserve).as_str(),
            "replaced"
        );
        assert_eq!(
            ActionStatus::for_status(AssignmentStatus::RearrangedFromRepair).to_string(),
            "rearrangement_renovation"
        );
        assert_eq!(
            serde_json::to_string(&ActionStatus::RearrangingRoute).unwrap(),
            "\"rearranging_route\""
        );
    }

    #[test]
    fn test_append_sequence_and_queries() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut log = ActionLog::new();
        let bus = BusId::from("B-101");
        log.append(
            ActionDraft::new(ActorId::from("op"), date, ActionStatus::Assigned)
                .departure(DepartureId::from("D1"))
                .buses([&bus, &bus])
                .description("assigned"),
        );
        let second = log
            .append(
                ActionDraft::new(ActorId::from("op"), date, ActionStatus::Cleared)
                    .departure(DepartureId::from("D2")),
            )
            .seq;

        assert_eq!(second, 2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.records()[0].buses, vec![bus]);
        let d1 = DepartureId::from("D1");
        assert_eq!(log.for_departure(&d1).count(), 1);
        assert_eq!(log.for_date(date).count(), 2);
        assert_eq!(log.for_date(date.succ_opt().unwrap()).count(), 0);
    }

    #[test]
    fn test_drain_before_keeps_sequence() {
        let day1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let day2 = day1.succ_opt().unwrap();
        let mut log = ActionLog::new();
        for date in [day1, day2, day1] {
            log.append(ActionDraft::new(ActorId::from("op"), date, ActionStatus::Assigned));
        }

        let old = log.drain_before(day2);
        assert_eq!(old.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(log.len(), 1);
        assert_eq!(log.for_date(day1).count(), 0);

        let next = log
            .append(ActionDraft::new(ActorId::from("op"), day2, ActionStatus::Cleared))
            .seq;
        assert_eq!(next, 4);
        assert!(log.drain_before(day1).is_empty());
    }

    #[test]
    fn test_sequence_resumes_after_deserialize() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut log = ActionLog::new();
        log.append(ActionDraft::new(ActorId::from("op"), date, ActionStatus::Assigned));
        log.append(ActionDraft::new(ActorId::from("op"), date, ActionStatus::Cleared));

        let mut json = serde_json::to_value(&log).unwrap();
        json.as_object_mut().unwrap().remove("last_seq");
        let mut restored: ActionLog = serde_json::from_value(json).unwrap();
        let seq = restored
            .append(ActionDraft::new(ActorId::from("op"), date, ActionStatus::Cleared))
            .seq;
        assert_eq!(seq, 3);
    }
}
