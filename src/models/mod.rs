//! Dispatch domain models.
//!
//! Plain data types shared by every engine component: typed identifiers,
//! fleet resources, routes and departures, per-date assignments, donor
//! entries, and the explicit call context.
//!
//! # Domain Mapping
//!
//! | Model | Dispatch sheet |
//! |-------|----------------|
//! | Route | Route column |
//! | Departure | Bus line (exit number) |
//! | Assignment | Bus + driver cells of one line for the day |
//! | ReserveEntry | Reserve table row |
//! | DonorEntry | Repair-return / order list row |

mod assignment;
mod context;
mod departure;
mod donor;
mod ids;
mod resource;

pub use assignment::{Assignment, AssignmentStatus};
pub use context::DispatchContext;
pub use departure::{Departure, Route, ScheduleTimes};
pub use donor::{DonorEntry, ReserveEntry};
pub use ids::{ActorId, BusId, ConvoyId, DepartureId, DonorEntryId, DriverId, ReserveEntryId, RouteId};
pub use resource::{Bus, BusStatus, Driver, DriverStatus, ResourceKind, Role, Shift};
