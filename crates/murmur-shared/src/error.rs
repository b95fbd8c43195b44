use thiserror::Error;

use crate::relationship::RequestStatus;

/// Failure to turn an inbound chat frame into a [`crate::protocol::ChatEvent`].
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Frame too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("{message_type} message is missing its {field}")]
    MissingTarget {
        message_type: &'static str,
        field: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Token encoding is invalid")]
    Encoding,

    #[error("Token signature is invalid")]
    BadSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Issuer key is invalid")]
    InvalidKey,
}

/// An illegal move of the friend request state machine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot move request from {from} to {to}")]
pub struct InvalidTransition {
    pub from: RequestStatus,
    pub to: RequestStatus,
}
