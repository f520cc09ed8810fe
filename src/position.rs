//! Position and settlement-ladder data types (data model §3, §4.3).
//!
//! `Deliver[k]`/`Receipt[k]` are bucketed by business days from trade date;
//! bucket `N-1` (the tail) absorbs anything beyond the ladder horizon and is
//! flagged *long-dated* rather than included in the SD0..SD{N-1} projection
//! (spec §8 Boundaries).

use crate::core_types::{BookId, BusinessDate, SecurityId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
    ShortSell,
}

impl Side {
    /// Maps an order side to the limit side it reserves against (spec
    /// §4.5). A buy order never consumes a sell-side limit.
    pub fn limit_side(self) -> Option<crate::limit::LimitSide> {
        match self {
            Side::Sell => Some(crate::limit::LimitSide::LongSell),
            Side::ShortSell => Some(crate::limit::LimitSide::ShortSell),
            Side::Buy => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionFlags {
    pub hypothecatable: bool,
    pub segregated: bool,
    pub pledged_repo: bool,
    pub pledged_swap: bool,
    pub tri_party: bool,
    pub pay_to_hold: bool,
    pub corporate_action_pending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub book: BookId,
    pub security: SecurityId,
    pub business_date: BusinessDate,
    /// Contractual (trade-date) quantity. May be negative (net short).
    pub td: i64,
    /// Settled quantity as of today.
    pub sd: i64,
    /// Deliver[k]: quantity to deliver on SD_k, for k in 0..ladder_days.
    /// The last slot is the long-dated tail bucket.
    pub deliver: Vec<u64>,
    /// Receipt[k]: quantity to receive on SD_k.
    pub receipt: Vec<u64>,
    pub intraday_buy: u64,
    pub intraday_sell: u64,
    pub intraday_short_sell: u64,
    pub flags: PositionFlags,
}

impl Position {
    pub fn new(
        book: BookId,
        security: SecurityId,
        business_date: BusinessDate,
        ladder_days: usize,
    ) -> Self {
        Self {
            book,
            security,
            business_date,
            td: 0,
            sd: 0,
            deliver: vec![0; ladder_days],
            receipt: vec![0; ladder_days],
            intraday_buy: 0,
            intraday_sell: 0,
            intraday_short_sell: 0,
            flags: PositionFlags::default(),
        }
    }

    pub fn ladder_days(&self) -> usize {
        self.deliver.len()
    }

    /// Maps a settlement date to a ladder bucket index, given today's
    /// business date. Returns the tail bucket (`ladder_days - 1`, flagged
    /// long-dated) if `settlement_date` falls beyond the ladder horizon.
    pub fn bucket_for(&self, settlement_date: BusinessDate) -> (usize, bool) {
        let days = (settlement_date - self.business_date).num_days();
        let last = self.ladder_days() - 1;
        if days < 0 {
            return (0, false);
        }
        let days = days as usize;
        if days >= last {
            (last, days > last)
        } else {
            (days, false)
        }
    }

    /// Reset intraday counters at SOD (invariant 2, §4.3).
    pub fn reset_intraday(&mut self) {
        self.intraday_buy = 0;
        self.intraday_sell = 0;
        self.intraday_short_sell = 0;
    }

    /// Apply a trade to the settlement ladder and intraday counters.
    /// Buy -> Receipt bucket; Sell/ShortSell -> Deliver bucket (Open
    /// Question #1: treat the source formulas' intent as symmetric across
    /// SD0..SD{N-1}, no special-casing of SD0).
    pub fn apply_trade(&mut self, side: Side, qty: u64, settlement_date: BusinessDate) {
        if qty == 0 {
            return;
        }
        let (bucket, _long_dated) = self.bucket_for(settlement_date);
        match side {
            Side::Buy => {
                self.receipt[bucket] += qty;
                self.td += qty as i64;
                self.intraday_buy += qty;
            }
            Side::Sell => {
                self.deliver[bucket] += qty;
                self.td -= qty as i64;
                self.intraday_sell += qty;
            }
            Side::ShortSell => {
                self.deliver[bucket] += qty;
                self.td -= qty as i64;
                self.intraday_short_sell += qty;
            }
        }
    }

    /// Projected SD_k position: `SD + sum_{i<=k}(Receipt_i - Deliver_i)`.
    /// Excludes the long-dated tail bucket from the projection horizon.
    pub fn projected(&self, k: usize) -> i64 {
        let last = self.ladder_days() - 1;
        let k = k.min(last.saturating_sub(1));
        let mut acc = self.sd;
        for i in 0..=k {
            acc += self.receipt[i] as i64 - self.deliver[i] as i64;
        }
        acc
    }

    /// Invariant: settled <= contractual + incoming unsettled receipts.
    pub fn settled_within_contractual(&self) -> bool {
        let incoming_unsettled: u64 = self.receipt.iter().sum();
        self.sd <= self.td + incoming_unsettled as i64
    }
}
