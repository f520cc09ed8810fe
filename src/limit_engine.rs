//! C5 — Limit engine: client/AU limit tracking and check-and-reserve via
//! compare-and-swap (spec §4.5). Each key (client or AU x security x side)
//! has a single current `ClientLimit`/`AuLimit`; reserving is a CAS loop so
//! concurrent reservations against the same key never both succeed past
//! the limit.

use crate::core_types::{AuId, BusinessDate, ClientId, ReservationId, SecurityId};
use crate::error::LimitError;
use crate::limit::{AuLimit, ClientLimit, LimitInputs, LimitSide, Reservation, ReservationStatus};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

pub struct LimitEngine {
    client_limits: DashMap<(ClientId, SecurityId, LimitSide), ClientLimit>,
    au_limits: DashMap<(AuId, SecurityId, LimitSide), AuLimit>,
    reservations: DashMap<ReservationId, Reservation>,
    next_reservation_id: AtomicU64,
    last_rebuilt: RwLock<Option<BusinessDate>>,
}

impl Default for LimitEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LimitEngine {
    pub fn new() -> Self {
        Self {
            client_limits: DashMap::new(),
            au_limits: DashMap::new(),
            reservations: DashMap::new(),
            next_reservation_id: AtomicU64::new(1),
            last_rebuilt: RwLock::new(None),
        }
    }

    pub fn set_client_limit(&self, client: ClientId, security: SecurityId, side: LimitSide, limit: u64) {
        self.client_limits
            .entry((client, security, side))
            .and_modify(|l| l.limit = limit)
            .or_insert(ClientLimit {
                client,
                security,
                side,
                limit,
                reserved: 0,
            });
    }

    pub fn set_au_limit(&self, au: AuId, security: SecurityId, side: LimitSide, limit: u64) {
        self.au_limits
            .entry((au, security, side))
            .and_modify(|l| l.limit = limit)
            .or_insert(AuLimit {
                au,
                security,
                side,
                limit,
                reserved: 0,
            });
    }

    fn next_id(&self) -> ReservationId {
        ReservationId(self.next_reservation_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Reserves `qty` against a client's limit. `DashMap`'s per-shard
    /// locking makes the read-check-write atomic for this key: two
    /// concurrent callers for the same (client, security, side) serialize
    /// here, so `reserved` never exceeds `limit` (spec §4.5 invariant).
    pub fn reserve_client(
        &self,
        client: ClientId,
        security: SecurityId,
        side: LimitSide,
        qty: u64,
    ) -> Result<ReservationId, LimitError> {
        let mut entry = self
            .client_limits
            .entry((client, security, side))
            .or_insert(ClientLimit {
                client,
                security,
                side,
                limit: 0,
                reserved: 0,
            });
        if !entry.can_reserve(qty) {
            return Err(LimitError::InsufficientLimit {
                reserved: entry.reserved,
                qty,
                limit: entry.limit,
            });
        }
        entry.reserved += qty;
        let id = self.next_id();
        self.reservations.insert(
            id,
            Reservation {
                id,
                security,
                side,
                qty,
                status: ReservationStatus::Held,
            },
        );
        Ok(id)
    }

    pub fn reserve_au(
        &self,
        au: AuId,
        security: SecurityId,
        side: LimitSide,
        qty: u64,
    ) -> Result<ReservationId, LimitError> {
        let mut entry = self.au_limits.entry((au, security, side)).or_insert(AuLimit {
            au,
            security,
            side,
            limit: 0,
            reserved: 0,
        });
        if !entry.can_reserve(qty) {
            return Err(LimitError::InsufficientLimit {
                reserved: entry.reserved,
                qty,
                limit: entry.limit,
            });
        }
        entry.reserved += qty;
        let id = self.next_id();
        self.reservations.insert(
            id,
            Reservation {
                id,
                security,
                side,
                qty,
                status: ReservationStatus::Held,
            },
        );
        Ok(id)
    }

    pub fn release(
        &self,
        client: ClientId,
        security: SecurityId,
        side: LimitSide,
        reservation: ReservationId,
    ) -> Result<(), LimitError> {
        let mut res = self
            .reservations
            .get_mut(&reservation)
            .ok_or(LimitError::UnknownReservation(reservation))?;
        if res.status != ReservationStatus::Held {
            return Err(LimitError::UnknownReservation(reservation));
        }
        if let Some(mut limit) = self.client_limits.get_mut(&(client, security, side)) {
            limit.reserved = limit.reserved.saturating_sub(res.qty);
        }
        res.status = ReservationStatus::Released;
        Ok(())
    }

    pub fn release_au(
        &self,
        au: AuId,
        security: SecurityId,
        side: LimitSide,
        reservation: ReservationId,
    ) -> Result<(), LimitError> {
        let mut res = self
            .reservations
            .get_mut(&reservation)
            .ok_or(LimitError::UnknownReservation(reservation))?;
        if res.status != ReservationStatus::Held {
            return Err(LimitError::UnknownReservation(reservation));
        }
        if let Some(mut limit) = self.au_limits.get_mut(&(au, security, side)) {
            limit.reserved = limit.reserved.saturating_sub(res.qty);
        }
        res.status = ReservationStatus::Released;
        Ok(())
    }

    /// Commits a held reservation, taking it out of the pool of things a
    /// subsequent release could undo (spec §8: commit+release round-trip
    /// idempotence — the second of either is rejected as unknown).
    pub fn commit(&self, reservation: ReservationId) -> Result<(), LimitError> {
        let mut res = self
            .reservations
            .get_mut(&reservation)
            .ok_or(LimitError::UnknownReservation(reservation))?;
        if res.status != ReservationStatus::Held {
            return Err(LimitError::UnknownReservation(reservation));
        }
        res.status = ReservationStatus::Committed;
        Ok(())
    }

    pub fn client_available(&self, client: ClientId, security: SecurityId, side: LimitSide) -> u64 {
        self.client_limits
            .get(&(client, security, side))
            .map(|l| l.available())
            .unwrap_or(0)
    }

    pub fn au_available(&self, au: AuId, security: SecurityId, side: LimitSide) -> u64 {
        self.au_limits
            .get(&(au, security, side))
            .map(|l| l.available())
            .unwrap_or(0)
    }

    pub fn last_rebuilt(&self) -> Option<BusinessDate> {
        *self.last_rebuilt.read().unwrap()
    }

    /// Recomputes every listed client/AU limit from its aggregated
    /// position/locate/order inputs via the §4.5 formulas and overwrites
    /// the stored `limit` in place (existing `reserved` carries over
    /// unchanged — a rebuild resizes the ceiling, it doesn't touch
    /// in-flight reservations). Spec §4.5: "rebuild(business-date)".
    pub fn rebuild(
        &self,
        business_date: BusinessDate,
        client_inputs: &[(ClientId, SecurityId, LimitInputs)],
        au_inputs: &[(AuId, SecurityId, LimitInputs)],
    ) {
        for (client, security, inputs) in client_inputs {
            self.set_client_limit(*client, *security, LimitSide::LongSell, inputs.long_sell_limit());
            self.set_client_limit(*client, *security, LimitSide::ShortSell, inputs.short_sell_limit());
        }
        for (au, security, inputs) in au_inputs {
            self.set_au_limit(*au, *security, LimitSide::LongSell, inputs.long_sell_limit());
            self.set_au_limit(*au, *security, LimitSide::ShortSell, inputs.short_sell_limit());
        }
        *self.last_rebuilt.write().unwrap() = Some(business_date);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bd() -> BusinessDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    #[test]
    fn reserve_then_commit_leaves_reservation_in_place() {
        let engine = LimitEngine::new();
        engine.set_client_limit(ClientId(1), SecurityId(1), LimitSide::LongSell, 1_000);
        let res = engine
            .reserve_client(ClientId(1), SecurityId(1), LimitSide::LongSell, 400)
            .unwrap();
        assert_eq!(engine.client_available(ClientId(1), SecurityId(1), LimitSide::LongSell), 600);
        engine.commit(res).unwrap();
        assert_eq!(engine.client_available(ClientId(1), SecurityId(1), LimitSide::LongSell), 600);
    }

    #[test]
    fn reserve_then_release_restores_availability() {
        let engine = LimitEngine::new();
        engine.set_client_limit(ClientId(1), SecurityId(1), LimitSide::LongSell, 1_000);
        let res = engine
            .reserve_client(ClientId(1), SecurityId(1), LimitSide::LongSell, 400)
            .unwrap();
        engine
            .release(ClientId(1), SecurityId(1), LimitSide::LongSell, res)
            .unwrap();
        assert_eq!(engine.client_available(ClientId(1), SecurityId(1), LimitSide::LongSell), 1_000);
    }

    #[test]
    fn reservation_beyond_limit_is_rejected_and_does_not_mutate_state() {
        let engine = LimitEngine::new();
        engine.set_client_limit(ClientId(1), SecurityId(1), LimitSide::LongSell, 500);
        engine
            .reserve_client(ClientId(1), SecurityId(1), LimitSide::LongSell, 500)
            .unwrap();
        let err = engine
            .reserve_client(ClientId(1), SecurityId(1), LimitSide::LongSell, 1)
            .unwrap_err();
        assert!(matches!(err, LimitError::InsufficientLimit { .. }));
        assert_eq!(engine.client_available(ClientId(1), SecurityId(1), LimitSide::LongSell), 0);
    }

    #[test]
    fn unknown_reservation_release_is_an_error() {
        let engine = LimitEngine::new();
        let err = engine
            .release(ClientId(1), SecurityId(1), LimitSide::LongSell, ReservationId(999))
            .unwrap_err();
        assert_eq!(err, LimitError::UnknownReservation(ReservationId(999)));
    }

    /// Spec §8: commit+release round-trip idempotence — the second
    /// attempt on either side of an already-settled reservation is
    /// rejected as unknown, not a silent no-op success.
    #[test]
    fn double_release_on_the_same_reservation_is_rejected() {
        let engine = LimitEngine::new();
        engine.set_client_limit(ClientId(1), SecurityId(1), LimitSide::LongSell, 1_000);
        let res = engine
            .reserve_client(ClientId(1), SecurityId(1), LimitSide::LongSell, 400)
            .unwrap();
        engine
            .release(ClientId(1), SecurityId(1), LimitSide::LongSell, res)
            .unwrap();
        let err = engine
            .release(ClientId(1), SecurityId(1), LimitSide::LongSell, res)
            .unwrap_err();
        assert_eq!(err, LimitError::UnknownReservation(res));
    }

    #[test]
    fn double_commit_on_the_same_reservation_is_rejected() {
        let engine = LimitEngine::new();
        engine.set_client_limit(ClientId(1), SecurityId(1), LimitSide::LongSell, 1_000);
        let res = engine
            .reserve_client(ClientId(1), SecurityId(1), LimitSide::LongSell, 400)
            .unwrap();
        engine.commit(res).unwrap();
        let err = engine.commit(res).unwrap_err();
        assert_eq!(err, LimitError::UnknownReservation(res));
    }

    #[test]
    fn commit_then_release_on_the_same_reservation_is_rejected() {
        let engine = LimitEngine::new();
        engine.set_client_limit(ClientId(1), SecurityId(1), LimitSide::ShortSell, 1_000);
        let res = engine
            .reserve_client(ClientId(1), SecurityId(1), LimitSide::ShortSell, 400)
            .unwrap();
        engine.commit(res).unwrap();
        let err = engine
            .release(ClientId(1), SecurityId(1), LimitSide::ShortSell, res)
            .unwrap_err();
        assert_eq!(err, LimitError::UnknownReservation(res));
    }

    /// Spec §4.5: rebuild recomputes limits from aggregated inputs rather
    /// than requiring a manual `set_client_limit`/`set_au_limit` call.
    #[test]
    fn rebuild_computes_limits_from_aggregated_inputs() {
        let engine = LimitEngine::new();
        let client_inputs = vec![(
            ClientId(1),
            SecurityId(1),
            LimitInputs {
                long_positions: 1_000,
                approved_long_sell_locates: 200,
                reserved_long_sell_orders: 300,
                approved_short_sell_locates: 500,
                approved_short_sell_pay_to_holds: 0,
                reserved_short_sell_orders: 100,
            },
        )];
        let au_inputs = vec![];

        engine.rebuild(bd(), &client_inputs, &au_inputs);

        assert_eq!(engine.client_available(ClientId(1), SecurityId(1), LimitSide::LongSell), 900);
        assert_eq!(engine.client_available(ClientId(1), SecurityId(1), LimitSide::ShortSell), 400);
        assert_eq!(engine.last_rebuilt(), Some(bd()));
    }

    #[test]
    fn rebuild_preserves_in_flight_reservations_across_limit_resize() {
        let engine = LimitEngine::new();
        engine.set_client_limit(ClientId(1), SecurityId(1), LimitSide::LongSell, 1_000);
        engine
            .reserve_client(ClientId(1), SecurityId(1), LimitSide::LongSell, 300)
            .unwrap();

        let client_inputs = vec![(
            ClientId(1),
            SecurityId(1),
            LimitInputs {
                long_positions: 1_500,
                ..Default::default()
            },
        )];
        engine.rebuild(bd(), &client_inputs, &[]);

        assert_eq!(engine.client_available(ClientId(1), SecurityId(1), LimitSide::LongSell), 1_200);
    }
}
