//! Typed identifiers.
//!
//! Every entity the engine touches is referenced by a string identifier
//! owned by the back office. Wrapping them in distinct newtypes keeps a
//! bus id from ever being passed where a driver id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The raw identifier.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Bus identifier.
    BusId
);
string_id!(
    /// Driver identifier.
    DriverId
);
string_id!(
    /// Departure (bus line) identifier.
    DepartureId
);
string_id!(
    /// Route identifier.
    RouteId
);
string_id!(
    /// Convoy identifier.
    ConvoyId
);
string_id!(
    /// Operator performing an action.
    ActorId
);
string_id!(
    /// Entry of an external donor list (repair returns, order list).
    DonorEntryId
);

/// Reserve pool entry identifier, allocated by the reserve store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReserveEntryId(pub u64);

impl fmt::Display for ReserveEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_and_conversion() {
        let bus = BusId::from("B-101");
        assert_eq!(bus.as_str(), "B-101");
        assert_eq!(bus.to_string(), "B-101");
        assert_eq!(DriverId::new(String::from("D1")), DriverId::from("D1"));
        assert_eq!(ReserveEntryId(7).to_string(), "R7");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let json = serde_json::to_string(&DepartureId::from("L-1")).unwrap();
        assert_eq!(json, "\"L-1\"");
        let back: DepartureId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_str(), "L-1");
    }
}
