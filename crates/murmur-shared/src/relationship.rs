//! Friend request lifecycle.
//!
//! A request starts `Pending` and ends in exactly one terminal state.  The
//! same status type tags both the notification row and the directed
//! friendship edges, so every status change goes through
//! [`RequestStatus::transition`].

use serde::{Deserialize, Serialize};

use crate::error::InvalidTransition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Result of a legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The status changed to the contained value; side effects must run.
    Applied(RequestStatus),
    /// Repeat of an outcome that already happened; nothing to do.
    Unchanged,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Guarded move to `to`.
    ///
    /// `Pending` may become either terminal state.  Asking a terminal
    /// request for the outcome it already has is `Unchanged`; every other
    /// move is illegal.
    pub fn transition(self, to: RequestStatus) -> Result<Transition, InvalidTransition> {
        match (self, to) {
            (Self::Pending, Self::Accepted | Self::Rejected) => Ok(Transition::Applied(to)),
            (Self::Accepted, Self::Accepted) | (Self::Rejected, Self::Rejected) => {
                Ok(Transition::Unchanged)
            }
            (from, to) => Err(InvalidTransition { from, to }),
        }
    }

    pub fn accept(self) -> Result<Transition, InvalidTransition> {
        self.transition(Self::Accepted)
    }

    pub fn reject(self) -> Result<Transition, InvalidTransition> {
        self.transition(Self::Rejected)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
