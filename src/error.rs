//! Engine errors.
//!
//! Every error names the service date and the departure it concerns so a
//! caller can re-render the current state of that line.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::DepartureId;

/// Result alias for engine operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors raised by dispatch operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The resource is already committed elsewhere on the date, or its
    /// status makes it ineligible. Never resolved automatically.
    #[error("{resource} cannot be put on {departure} for {date}: {reason}")]
    Conflict {
        date: NaiveDate,
        departure: DepartureId,
        /// Display form of the resource (`bus B-101`, `driver D7`).
        resource: String,
        /// Holder or status explanation.
        reason: String,
    },
    /// Missing or malformed input.
    #[error("invalid request for {departure} on {date}: {message}")]
    Validation {
        date: NaiveDate,
        departure: DepartureId,
        message: String,
    },
    /// The target commit stood but a dependent donor-side step failed.
    ///
    /// Direct reserve operations report store failures with this variant
    /// against the `reserve` line.
    #[error("donor cleanup `{step}` after {departure} on {date} failed: {message}")]
    DonorCleanup {
        date: NaiveDate,
        departure: DepartureId,
        step: String,
        message: String,
    },
}

impl DispatchError {
    pub(crate) fn validation(
        date: NaiveDate,
        departure: &DepartureId,
        message: impl Into<String>,
    ) -> Self {
        DispatchError::Validation {
            date,
            departure: departure.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn conflict(
        date: NaiveDate,
        departure: &DepartureId,
        resource: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DispatchError::Conflict {
            date,
            departure: departure.clone(),
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DispatchError::Conflict { .. })
    }

    /// Whether this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, DispatchError::Validation { .. })
    }

    /// Service date the error concerns.
    pub fn date(&self) -> NaiveDate {
        match self {
            DispatchError::Conflict { date, .. }
            | DispatchError::Validation { date, .. }
            | DispatchError::DonorCleanup { date, .. } => *date,
        }
    }

    /// Departure the error concerns.
    pub fn departure(&self) -> &DepartureId {
        match self {
            DispatchError::Conflict { departure, .. }
            | DispatchError::Validation { departure, .. }
            | DispatchError::DonorCleanup { departure, .. } => departure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_context() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let e = DispatchError::conflict(date, &DepartureId::from("D2"), "bus B-101", "on D1");
        assert!(e.is_conflict());
        assert_eq!(e.date(), date);
        assert_eq!(e.departure().as_str(), "D2");
        assert_eq!(
            e.to_string(),
            "bus B-101 cannot be put on D2 for 2024-03-01: on D1"
        );

        let v = DispatchError::validation(date, &DepartureId::from("D9"), "unknown departure");
        assert!(v.is_validation());
        assert!(v.to_string().contains("unknown departure"));
    }
}
