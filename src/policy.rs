//! Eligibility policy and engine configuration.
//!
//! Which lifecycle statuses block a resource from a slot is a business
//! rule that differs between depots, so it is kept as a data table rather
//! than hard-coded in the guard. All fields have defaults and the whole
//! structure deserializes from partial documents.
//!
//! # Defaults
//!
//! | Role | Ineligible statuses |
//! |------|---------------------|
//! | Bus | under repair, long repair, decommissioned |
//! | Driver, shift 1 | vacation, sick leave, fired, intern |
//! | Driver, shift 2 | vacation, sick leave, fired |

use serde::{Deserialize, Serialize};

use crate::models::{Bus, BusStatus, Driver, DriverStatus, Role, Shift};

/// Status policy applied by the conflict guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityPolicy {
    /// Bus statuses that block assignment.
    pub ineligible_bus: Vec<BusStatus>,
    /// Driver statuses that block a first-shift assignment.
    pub ineligible_first_shift: Vec<DriverStatus>,
    /// Driver statuses that block a second-shift assignment.
    pub ineligible_second_shift: Vec<DriverStatus>,
    /// Whether second-shift drivers take part in the exclusivity check.
    pub second_shift_exclusive: bool,
    /// Whether resources that only change slots between two active
    /// departures (swap / move) are re-checked for status.
    pub check_status_on_swap: bool,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            ineligible_bus: vec![
                BusStatus::UnderRepair,
                BusStatus::LongRepair,
                BusStatus::Decommissioned,
            ],
            ineligible_first_shift: vec![
                DriverStatus::Vacation,
                DriverStatus::SickLeave,
                DriverStatus::Fired,
                DriverStatus::Intern,
            ],
            ineligible_second_shift: vec![
                DriverStatus::Vacation,
                DriverStatus::SickLeave,
                DriverStatus::Fired,
            ],
            second_shift_exclusive: true,
            check_status_on_swap: false,
        }
    }
}

impl EligibilityPolicy {
    /// Policy that blocks nothing by status.
    pub fn permissive() -> Self {
        Self {
            ineligible_bus: Vec::new(),
            ineligible_first_shift: Vec::new(),
            ineligible_second_shift: Vec::new(),
            ..Self::default()
        }
    }

    /// Sets whether second-shift drivers are exclusive.
    pub fn with_second_shift_exclusive(mut self, exclusive: bool) -> Self {
        self.second_shift_exclusive = exclusive;
        self
    }

    /// Sets whether swapped resources are re-checked for status.
    pub fn with_status_check_on_swap(mut self, check: bool) -> Self {
        self.check_status_on_swap = check;
        self
    }

    /// Whether a bus may be put on a departure.
    pub fn bus_eligible(&self, bus: &Bus) -> bool {
        !self.ineligible_bus.contains(&bus.status)
    }

    /// Whether a driver may take the given shift.
    pub fn driver_eligible(&self, driver: &Driver, shift: Shift) -> bool {
        let blocked = match shift {
            Shift::First => &self.ineligible_first_shift,
            Shift::Second => &self.ineligible_second_shift,
        };
        !blocked.contains(&driver.status)
    }

    /// Whether a role takes part in the exclusivity check.
    pub fn is_exclusive(&self, role: Role) -> bool {
        match role {
            Role::Bus | Role::Driver(Shift::First) => true,
            Role::Driver(Shift::Second) => self.second_shift_exclusive,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Status policy for the conflict guard.
    pub policy: EligibilityPolicy,
    /// Reason recorded when a displaced driver is parked in reserve.
    pub park_displaced_reason: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: EligibilityPolicy::default(),
            park_displaced_reason: "removed from route".to_string(),
        }
    }
}

impl EngineConfig {
    /// Sets the eligibility policy.
    pub fn with_policy(mut self, policy: EligibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the reason used for parked drivers.
    pub fn with_park_reason(mut self, reason: impl Into<String>) -> Self {
        self.park_displaced_reason = reason.into();
        self
    }
}
