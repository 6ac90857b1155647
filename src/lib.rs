//! Daily dispatch engine for bus fleets.
//!
//! Binds buses and drivers to scheduled departures for a service date,
//! keeps every resource on at most one departure per date, and carries out
//! same-day replacements from five donor sources with a full action log.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Bus`, `Driver`, `Route`, `Departure`,
//!   `Assignment`, `ReserveEntry`, `DonorEntry`, `DispatchContext`
//! - **`catalog`**: Read-only fleet catalog and external donor lists
//! - **`plan`**: Routes, departures, and per-date schedule edits
//! - **`ledger`**: Per-date assignments with exclusivity enforcement
//! - **`guard`**: Availability checks, busy maps
//! - **`policy`**: Status eligibility table and engine configuration
//! - **`reserve`**: Reserve pool storage
//! - **`resolver`**: Replacement categories and the mutations they imply
//! - **`audit`**: Action log
//! - **`engine`**: The caller-facing engine and its shared handle
//!
//! # Architecture
//!
//! Request-driven. Every call carries an explicit [`DispatchContext`]
//! (date, convoy, actor). A replacement commits the target first; donor-side
//! reserve updates follow and report failures as notices instead of rolling
//! the commit back.
//!
//! # Logging
//!
//! Emits `tracing` events and spans. Install a subscriber in the embedding
//! application to see them.

pub mod audit;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod models;
pub mod plan;
pub mod policy;
pub mod reserve;
pub mod resolver;

pub use audit::{ActionLog, ActionRecord, ActionStatus};
pub use catalog::{InMemoryCatalog, ResourceCatalog};
pub use engine::{CommitRequest, DispatchEngine, DispatchOutcome, DispatchRow, SharedDispatch};
pub use error::{DispatchError, DispatchResult};
pub use guard::{BusyMap, ConflictGuard, Occupancy};
pub use ledger::{AssignmentLedger, SlotWrite};
pub use models::{
    ActorId, Assignment, AssignmentStatus, Bus, BusId, BusStatus, ConvoyId, Departure,
    DepartureId, DispatchContext, DonorEntry, DonorEntryId, Driver, DriverId, DriverStatus,
    ReserveEntry, ReserveEntryId, ResourceKind, Role, Route, RouteId, ScheduleTimes, Shift,
};
pub use plan::{DeparturePlan, ScheduleEdit};
pub use policy::{EligibilityPolicy, EngineConfig};
pub use reserve::{ReservePool, ReserveStore, ReserveStoreError};
pub use resolver::{CleanupStep, ReplaceRequest, ReplacedPart, Replacement, Transfer};
