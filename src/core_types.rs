//! Core identifier types shared across every component.
//!
//! Internal identifiers are newtypes over `u64` (never re-bound, see the
//! Security invariant in the data model) so a book id and a security id can
//! never be mixed up at a call site by accident.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! newtype_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                $name(v)
            }
        }
    };
}

newtype_id!(SecurityId);
newtype_id!(CounterpartyId);
newtype_id!(BookId);
newtype_id!(AuId);
newtype_id!(ClientId);
newtype_id!(ContractId);
newtype_id!(LocateId);
newtype_id!(RuleId);
newtype_id!(ReservationId);

/// Monotonic per-stream sequence number assigned by the event log.
pub type SeqNum = u64;

/// A market code, e.g. "US", "JP", "TW". Kept as a small interned string
/// rather than an enum: new markets are reference data, not code changes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarketId(pub String);

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MarketId {
    fn from(s: &str) -> Self {
        MarketId(s.to_string())
    }
}

/// Calendar business date. Positions, limits, and locates are all keyed by
/// one of these; ladder buckets are offsets from it.
pub type BusinessDate = chrono::NaiveDate;

/// Number of settlement-ladder days held (SD0..SD{N-1}); see
/// `ladder.days` in configuration.
pub const DEFAULT_LADDER_DAYS: usize = 5;
