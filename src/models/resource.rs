//! Fleet resource models.
//!
//! Buses and drivers are owned by the back office catalog. The engine only
//! reads them: their convoy, their display names, and their lifecycle
//! status, which decides whether they may be put on a departure at all.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{BusId, ConvoyId, DriverId};

/// Lifecycle status of a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusStatus {
    /// In service.
    OnDuty,
    /// Scheduled day off.
    DayOff,
    /// Short repair.
    UnderRepair,
    /// Long-term repair.
    LongRepair,
    /// Written off.
    Decommissioned,
}

/// Lifecycle status of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    /// Working.
    OnDuty,
    /// Scheduled day off.
    DayOff,
    /// On vacation.
    Vacation,
    /// On sick leave.
    SickLeave,
    /// Trainee, not yet cleared to drive alone.
    Intern,
    /// Dismissed.
    Fired,
}

/// Which kind of resource an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Bus,
    Driver,
}

/// Driver shift on a departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    First,
    Second,
}

impl Shift {
    /// Shift number as printed on dispatch sheets.
    pub fn number(self) -> u8 {
        match self {
            Shift::First => 1,
            Shift::Second => 2,
        }
    }
}

/// A slot on a departure that a resource can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Bus,
    Driver(Shift),
}

impl Role {
    /// Resource kind that fits this slot.
    pub fn kind(self) -> ResourceKind {
        match self {
            Role::Bus => ResourceKind::Bus,
            Role::Driver(_) => ResourceKind::Driver,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Bus => f.write_str("bus"),
            Role::Driver(shift) => write!(f, "driver (shift {})", shift.number()),
        }
    }
}

/// A bus of a convoy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    /// Unique bus identifier.
    pub id: BusId,
    /// Owning convoy.
    pub convoy: ConvoyId,
    /// State registration plate.
    pub state_number: String,
    /// Depot garage number.
    pub garage_number: String,
    /// Current lifecycle status.
    pub status: BusStatus,
}

impl Bus {
    /// Creates an on-duty bus with no plate or garage number.
    pub fn new(id: impl Into<BusId>, convoy: impl Into<ConvoyId>) -> Self {
        Self {
            id: id.into(),
            convoy: convoy.into(),
            state_number: String::new(),
            garage_number: String::new(),
            status: BusStatus::OnDuty,
        }
    }

    /// Sets the registration plate.
    pub fn with_state_number(mut self, number: impl Into<String>) -> Self {
        self.state_number = number.into();
        self
    }

    /// Sets the garage number.
    pub fn with_garage_number(mut self, number: impl Into<String>) -> Self {
        self.garage_number = number.into();
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: BusStatus) -> Self {
        self.status = status;
        self
    }

    /// Label used in audit descriptions: garage number, plate, or the id.
    pub fn label(&self) -> String {
        match (self.garage_number.is_empty(), self.state_number.is_empty()) {
            (false, false) => format!("{} ({})", self.garage_number, self.state_number),
            (false, true) => self.garage_number.clone(),
            (true, false) => self.state_number.clone(),
            (true, true) => self.id.to_string(),
        }
    }
}

/// A driver of a convoy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    /// Unique driver identifier.
    pub id: DriverId,
    /// Owning convoy.
    pub convoy: ConvoyId,
    /// Family name.
    pub surname: String,
    /// Given name.
    pub first_name: String,
    /// Patronymic, if any.
    pub patronymic: Option<String>,
    /// Personnel number.
    pub personnel_number: String,
    /// Current lifecycle status.
    pub status: DriverStatus,
}

impl Driver {
    /// Creates an on-duty driver.
    pub fn new(
        id: impl Into<DriverId>,
        convoy: impl Into<ConvoyId>,
        surname: impl Into<String>,
        first_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            convoy: convoy.into(),
            surname: surname.into(),
            first_name: first_name.into(),
            patronymic: None,
            personnel_number: String::new(),
            status: DriverStatus::OnDuty,
        }
    }

    /// Sets the patronymic.
    pub fn with_patronymic(mut self, patronymic: impl Into<String>) -> Self {
        self.patronymic = Some(patronymic.into());
        self
    }

    /// Sets the personnel number.
    pub fn with_personnel_number(mut self, number: impl Into<String>) -> Self {
        self.personnel_number = number.into();
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: DriverStatus) -> Self {
        self.status = status;
        self
    }

    /// Surname followed by initials, e.g. `Ivanov I.P.`.
    ///
    /// Falls back to the id when no surname is recorded.
    pub fn short_name(&self) -> String {
        if self.surname.trim().is_empty() {
            return self.id.to_string();
        }
        let mut out = self.surname.trim().to_string();
        let initials: String = [Some(self.first_name.as_str()), self.patronymic.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(|part| part.trim().chars().next())
            .map(|c| format!("{c}."))
            .collect();
        if !initials.is_empty() {
            out.push(' ');
            out.push_str(&initials);
        }
        out
    }
}
