//! Limit and reservation data types (data model §3, component C5).
//!
//! Reservations are the unit of check-and-reserve atomicity: a reservation
//! is taken against a limit before an order is allowed to proceed, and
//! released or committed once the downstream outcome is known.

use crate::core_types::{AuId, ClientId, ReservationId, SecurityId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Held,
    Committed,
    Released,
}

/// A limit is scoped to one side of the book (spec §4.5): long-sell limits
/// and short-sell limits are fed by disjoint inputs and must never share a
/// reservation pool for the same (client/AU, security).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitSide {
    LongSell,
    ShortSell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub security: SecurityId,
    pub side: LimitSide,
    pub qty: u64,
    pub status: ReservationStatus,
}

/// A limit for one key (client or aggregation unit), side, and security.
/// `reserved` never exceeds `limit` (invariant, spec §4.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientLimit {
    pub client: ClientId,
    pub security: SecurityId,
    pub side: LimitSide,
    pub limit: u64,
    pub reserved: u64,
}

impl ClientLimit {
    pub fn available(&self) -> u64 {
        self.limit.saturating_sub(self.reserved)
    }

    /// Pure check: would reserving `qty` fit? Does not mutate state — the
    /// actual compare-and-swap reservation lives in the limit engine, which
    /// must re-check this same condition atomically against live state.
    pub fn can_reserve(&self, qty: u64) -> bool {
        self.reserved + qty <= self.limit
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuLimit {
    pub au: AuId,
    pub security: SecurityId,
    pub side: LimitSide,
    pub limit: u64,
    pub reserved: u64,
}

impl AuLimit {
    pub fn available(&self) -> u64 {
        self.limit.saturating_sub(self.reserved)
    }

    pub fn can_reserve(&self, qty: u64) -> bool {
        self.reserved + qty <= self.limit
    }
}

/// Aggregated inputs feeding the §4.5 limit formulas. One instance per
/// (key, security); `rebuild` computes a fresh `ClientLimit`/`AuLimit` pair
/// from one of these per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitInputs {
    pub long_positions: u64,
    pub approved_long_sell_locates: u64,
    pub reserved_long_sell_orders: u64,
    pub approved_short_sell_locates: u64,
    pub approved_short_sell_pay_to_holds: u64,
    pub reserved_short_sell_orders: u64,
}

impl LimitInputs {
    /// Long-sell limit = long positions + approved long-sell locates -
    /// reserved long-sell orders (spec §4.5).
    pub fn long_sell_limit(&self) -> u64 {
        (self.long_positions + self.approved_long_sell_locates)
            .saturating_sub(self.reserved_long_sell_orders)
    }

    /// Short-sell limit = approved short-sell locates + approved
    /// pay-to-holds - reserved short-sell orders (spec §4.5).
    pub fn short_sell_limit(&self) -> u64 {
        (self.approved_short_sell_locates + self.approved_short_sell_pay_to_holds)
            .saturating_sub(self.reserved_short_sell_orders)
    }
}
