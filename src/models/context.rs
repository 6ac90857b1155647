//! Per-call dispatch context.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ActorId, ConvoyId};

/// Who acts on which convoy's dispatch for which date.
///
/// Passed explicitly into every engine call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchContext {
    /// Service date.
    pub date: NaiveDate,
    /// Convoy being dispatched.
    pub convoy: ConvoyId,
    /// Operator performing the action.
    pub actor: ActorId,
}

impl DispatchContext {
    /// Creates a context.
    pub fn new(date: NaiveDate, convoy: impl Into<ConvoyId>, actor: impl Into<ActorId>) -> Self {
        Self {
            date,
            convoy: convoy.into(),
            actor: actor.into(),
        }
    }

    /// Same operator and convoy on another date.
    pub fn on(&self, date: NaiveDate) -> Self {
        Self {
            date,
            ..self.clone()
        }
    }
}
