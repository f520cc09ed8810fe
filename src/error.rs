//! Per-component error enums. Library code never uses `anyhow`; each
//! component boundary gets a typed `thiserror` enum so callers can match on
//! the structured outcome (spec §7 "Request/response surfaces... surface a
//! structured outcome with a machine-readable code").

use crate::core_types::{AuId, ClientId, LocateId, SecurityId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("identifier (source={source_name}, id_type={id_type}, value={value}) is ambiguous")]
    Ambiguous {
        source_name: String,
        id_type: String,
        value: String,
    },
    #[error("identifier (source={source_name}, id_type={id_type}, value={value}) is unmapped")]
    Unmapped {
        source_name: String,
        id_type: String,
        value: String,
    },
    #[error("upsert rejected: provider version {incoming} is not newer than current {current}")]
    StaleVersion { incoming: u64, current: u64 },
    #[error("conflicting internal ids for incoming record: {0:?}")]
    Conflict(Vec<u64>),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("stale SOD load: business date {incoming} does not match current {current}")]
    StaleSod {
        incoming: chrono::NaiveDate,
        current: chrono::NaiveDate,
    },
    #[error("settlement date is beyond the ladder horizon, routed to long-dated bucket")]
    LongDated,
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("no rule matched for security {0:?} in market; defaults applied")]
    NoRuleMatched(SecurityId),
    #[error("rule evaluation error: {0}")]
    RuleEvaluation(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimitError {
    #[error("unknown reservation {0:?}")]
    UnknownReservation(crate::core_types::ReservationId),
    #[error("reservation would exceed limit: reserved={reserved} + qty={qty} > limit={limit}")]
    InsufficientLimit {
        reserved: u64,
        qty: u64,
        limit: u64,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("locate request failed schema or reference validation: {0}")]
    Invalid(String),
    #[error("insufficient locate availability for security {0:?}")]
    InsufficientInventory(SecurityId),
    #[error("locate {0:?} is not in a state that allows this transition")]
    InvalidTransition(LocateId),
    #[error("auto-rule evaluation exceeded its deadline, routed to review")]
    DeadlineExceeded,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShortSellError {
    #[error("book is not mapped to an aggregation unit")]
    UnmappedBook,
    #[error("insufficient client limit for client {0:?}")]
    InsufficientClientLimit(ClientId),
    #[error("insufficient aggregation-unit limit for AU {0:?}")]
    InsufficientAuLimit(AuId),
    #[error("validation exceeded its SLA deadline")]
    Timeout,
    #[error("order side does not require short-sell validation")]
    NotASellOrder,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule {0} has no active version")]
    NoActiveVersion(String),
    #[error("conflicting non-composable actions from rules {0} and {1} at equal priority")]
    Conflict(String, String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventLogError {
    #[error("CRC32 checksum mismatch at seq_id={seq_id}: expected={expected}, got={got}")]
    ChecksumMismatch {
        seq_id: u64,
        expected: u32,
        got: u32,
    },
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("unknown stream id {0}")]
    UnknownStream(u8),
}

impl From<std::io::Error> for EventLogError {
    fn from(e: std::io::Error) -> Self {
        EventLogError::Io(e.to_string())
    }
}
