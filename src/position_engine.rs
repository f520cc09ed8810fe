//! C3 — Position engine: sharded book x security positions, settlement
//! ladder maintenance, and delta publication (spec §4.3).

use crate::core_types::{BookId, BusinessDate, SecurityId};
use crate::error::PositionError;
use crate::messages::{EgressPayload, TradeExecution};
use crate::position::Position;
use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub book: BookId,
    pub security: SecurityId,
}

/// Sharded by `DashMap`'s internal shard count, the same concurrency shape
/// as the teacher's balance map: one writer per key at a time, many keys
/// in flight concurrently (spec §5.3 single-writer-per-key).
pub struct PositionEngine {
    positions: DashMap<PositionKey, Position>,
    ladder_days: usize,
}

impl PositionEngine {
    pub fn new(ladder_days: usize) -> Self {
        Self {
            positions: DashMap::new(),
            ladder_days,
        }
    }

    pub fn get(&self, book: BookId, security: SecurityId) -> Option<Position> {
        self.positions
            .get(&PositionKey { book, security })
            .map(|r| r.clone())
    }

    /// Loads the start-of-day snapshot for a book/security/date. Rejects a
    /// load for a date that doesn't match an already-loaded position's
    /// date (spec §4.3 invariant: one SOD load per business date).
    pub fn load_sod(
        &self,
        book: BookId,
        security: SecurityId,
        business_date: BusinessDate,
        td: i64,
        sd: i64,
    ) -> Result<(), PositionError> {
        let key = PositionKey { book, security };
        if let Some(existing) = self.positions.get(&key) {
            if existing.business_date != business_date {
                return Err(PositionError::StaleSod {
                    incoming: business_date,
                    current: existing.business_date,
                });
            }
        }
        let mut pos = Position::new(book, security, business_date, self.ladder_days);
        pos.td = td;
        pos.sd = sd;
        self.positions.insert(key, pos);
        Ok(())
    }

    /// Applies a trade execution, updating TD and the settlement ladder,
    /// and returns the egress delta to publish.
    pub fn apply_execution(
        &self,
        exec: &TradeExecution,
    ) -> Result<EgressPayload, PositionError> {
        let key = PositionKey {
            book: exec.book,
            security: exec.security,
        };
        let mut entry = self.positions.entry(key).or_insert_with(|| {
            Position::new(exec.book, exec.security, exec.settlement_date, self.ladder_days)
        });

        let td_before = entry.td;
        let sd_before = entry.sd;
        entry.apply_trade(exec.side, exec.qty, exec.settlement_date);

        if !entry.settled_within_contractual() {
            return Err(PositionError::InvariantViolation(format!(
                "settled {} exceeds contractual {} + incoming receipts for book={:?} security={:?}",
                entry.sd, entry.td, exec.book, exec.security
            )));
        }

        Ok(EgressPayload::PositionDelta {
            book: exec.book,
            security: exec.security,
            td_delta: entry.td - td_before,
            sd_delta: entry.sd - sd_before,
        })
    }

    /// Resets all intraday counters; called once at start-of-day before
    /// any SOD loads for the new business date (spec §4.3).
    pub fn reset_all_intraday(&self) {
        for mut entry in self.positions.iter_mut() {
            entry.reset_intraday();
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Side;
    use chrono::NaiveDate;

    fn bd(offset: i64) -> BusinessDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    /// Scenario A from spec §8: SOD load followed by a buy and a sell.
    #[test]
    fn scenario_a_sod_then_buy_and_sell() {
        let engine = PositionEngine::new(5);
        engine
            .load_sod(BookId(1), SecurityId(1), bd(0), 100, 100)
            .unwrap();

        engine
            .apply_execution(&TradeExecution {
                book: BookId(1),
                security: SecurityId(1),
                side: Side::Buy,
                qty: 10,
                settlement_date: bd(1),
                order_id: None,
            })
            .unwrap();
        engine
            .apply_execution(&TradeExecution {
                book: BookId(1),
                security: SecurityId(1),
                side: Side::Sell,
                qty: 5,
                settlement_date: bd(2),
                order_id: None,
            })
            .unwrap();

        let pos = engine.get(BookId(1), SecurityId(1)).unwrap();
        assert_eq!(pos.td, 105);
        assert_eq!(pos.sd, 100);
        assert_eq!(pos.projected(2), 105);
    }

    #[test]
    fn sod_load_for_mismatched_date_is_rejected() {
        let engine = PositionEngine::new(5);
        engine
            .load_sod(BookId(1), SecurityId(1), bd(0), 100, 100)
            .unwrap();
        let err = engine
            .load_sod(BookId(1), SecurityId(1), bd(1), 100, 100)
            .unwrap_err();
        assert!(matches!(err, PositionError::StaleSod { .. }));
    }

    #[test]
    fn reset_all_intraday_clears_counters_across_positions() {
        let engine = PositionEngine::new(5);
        engine
            .apply_execution(&TradeExecution {
                book: BookId(1),
                security: SecurityId(1),
                side: Side::Buy,
                qty: 10,
                settlement_date: bd(1),
                order_id: None,
            })
            .unwrap();
        engine.reset_all_intraday();
        let pos = engine.get(BookId(1), SecurityId(1)).unwrap();
        assert_eq!(pos.intraday_buy, 0);
    }
}
