//! C7 — Short-sell validator: two-stage reservation (client, then
//! aggregation unit) under a hard SLA deadline (spec §4.7).

use crate::core_types::{AuId, BookId, ClientId, SecurityId};
use crate::error::ShortSellError;
use crate::limit_engine::LimitEngine;
use crate::messages::EgressPayload;
use crate::position::Side;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Static book -> (client, aggregation unit) mapping. Reference data, not
/// derived; an unmapped book is a hard rejection (spec §4.7).
#[derive(Default)]
pub struct BookMap {
    map: DashMap<BookId, (ClientId, AuId)>,
}

impl BookMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, book: BookId, client: ClientId, au: AuId) {
        self.map.insert(book, (client, au));
    }

    pub fn lookup(&self, book: BookId) -> Option<(ClientId, AuId)> {
        self.map.get(&book).map(|r| *r)
    }
}

pub struct ShortSellValidator<'a> {
    limits: &'a LimitEngine,
    books: &'a BookMap,
    deadline: Duration,
}

impl<'a> ShortSellValidator<'a> {
    pub fn new(limits: &'a LimitEngine, books: &'a BookMap, deadline: Duration) -> Self {
        Self {
            limits,
            books,
            deadline,
        }
    }

    /// Validates a sell or short-sell order: reserves against the client
    /// limit, then the AU limit, releasing the client reservation if the
    /// AU stage fails (spec §4.7 "two-stage check-and-reserve"). `side`
    /// selects which limit pool (long-sell or short-sell, spec §4.5) the
    /// reservation is taken against; ties among concurrent orders for the
    /// same key resolve first-come-first-served by the underlying limit
    /// engine's per-key serialization.
    pub fn validate(
        &self,
        book: BookId,
        security: SecurityId,
        side: Side,
        qty: u64,
    ) -> Result<EgressPayload, ShortSellError> {
        let limit_side = side.limit_side().ok_or(ShortSellError::NotASellOrder)?;
        let started = Instant::now();
        let (client, au) = self.books.lookup(book).ok_or(ShortSellError::UnmappedBook)?;

        let client_res = self
            .limits
            .reserve_client(client, security, limit_side, qty)
            .map_err(|_| ShortSellError::InsufficientClientLimit(client))?;

        if started.elapsed() > self.deadline {
            let _ = self.limits.release(client, security, limit_side, client_res);
            return Err(ShortSellError::Timeout);
        }

        match self.limits.reserve_au(au, security, limit_side, qty) {
            Ok(_au_res) => {
                if started.elapsed() > self.deadline {
                    let _ = self.limits.release(client, security, limit_side, client_res);
                    return Err(ShortSellError::Timeout);
                }
                Ok(EgressPayload::OrderValidated {
                    book,
                    security,
                    qty,
                })
            }
            Err(_) => {
                let _ = self.limits.release(client, security, limit_side, client_res);
                Err(ShortSellError::InsufficientAuLimit(au))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limit::LimitSide;

    fn setup() -> (LimitEngine, BookMap) {
        let limits = LimitEngine::new();
        let books = BookMap::new();
        books.register(BookId(1), ClientId(1), AuId(1));
        limits.set_client_limit(ClientId(1), SecurityId(1), LimitSide::ShortSell, 1_000);
        limits.set_au_limit(AuId(1), SecurityId(1), LimitSide::ShortSell, 1_000);
        (limits, books)
    }

    /// Scenario B from spec §8: short-sell validation within SLA.
    #[test]
    fn scenario_b_short_sell_validates_within_sla() {
        let (limits, books) = setup();
        let validator = ShortSellValidator::new(&limits, &books, Duration::from_millis(150));
        let result = validator
            .validate(BookId(1), SecurityId(1), Side::ShortSell, 500)
            .unwrap();
        assert!(matches!(result, EgressPayload::OrderValidated { qty: 500, .. }));
        assert_eq!(
            limits.client_available(ClientId(1), SecurityId(1), LimitSide::ShortSell),
            500
        );
        assert_eq!(limits.au_available(AuId(1), SecurityId(1), LimitSide::ShortSell), 500);
    }

    #[test]
    fn unmapped_book_is_rejected() {
        let (limits, books) = setup();
        let validator = ShortSellValidator::new(&limits, &books, Duration::from_millis(150));
        let err = validator
            .validate(BookId(99), SecurityId(1), Side::ShortSell, 10)
            .unwrap_err();
        assert_eq!(err, ShortSellError::UnmappedBook);
    }

    #[test]
    fn buy_side_is_rejected_before_any_reservation() {
        let (limits, books) = setup();
        let validator = ShortSellValidator::new(&limits, &books, Duration::from_millis(150));
        let err = validator
            .validate(BookId(1), SecurityId(1), Side::Buy, 10)
            .unwrap_err();
        assert_eq!(err, ShortSellError::NotASellOrder);
    }

    #[test]
    fn au_limit_exhaustion_releases_the_client_reservation() {
        let (limits, books) = setup();
        limits.set_au_limit(AuId(1), SecurityId(1), LimitSide::ShortSell, 100);
        let validator = ShortSellValidator::new(&limits, &books, Duration::from_millis(150));
        let err = validator
            .validate(BookId(1), SecurityId(1), Side::ShortSell, 500)
            .unwrap_err();
        assert_eq!(err, ShortSellError::InsufficientAuLimit(AuId(1)));
        assert_eq!(
            limits.client_available(ClientId(1), SecurityId(1), LimitSide::ShortSell),
            1_000
        );
    }

    #[test]
    fn insufficient_client_limit_never_touches_au_limit() {
        let (limits, books) = setup();
        limits.set_client_limit(ClientId(1), SecurityId(1), LimitSide::ShortSell, 10);
        let validator = ShortSellValidator::new(&limits, &books, Duration::from_millis(150));
        let err = validator
            .validate(BookId(1), SecurityId(1), Side::ShortSell, 500)
            .unwrap_err();
        assert_eq!(err, ShortSellError::InsufficientClientLimit(ClientId(1)));
        assert_eq!(limits.au_available(AuId(1), SecurityId(1), LimitSide::ShortSell), 1_000);
    }

    /// Long-sell and short-sell limits for the same client/security track
    /// independently (spec §4.5) — exhausting one never touches the other.
    #[test]
    fn long_sell_and_short_sell_limits_track_independently() {
        let (limits, books) = setup();
        limits.set_client_limit(ClientId(1), SecurityId(1), LimitSide::LongSell, 1_000);
        limits.set_au_limit(AuId(1), SecurityId(1), LimitSide::LongSell, 1_000);
        let validator = ShortSellValidator::new(&limits, &books, Duration::from_millis(150));

        validator
            .validate(BookId(1), SecurityId(1), Side::ShortSell, 900)
            .unwrap();
        let result = validator
            .validate(BookId(1), SecurityId(1), Side::Sell, 900)
            .unwrap();
        assert!(matches!(result, EgressPayload::OrderValidated { qty: 900, .. }));
        assert_eq!(
            limits.client_available(ClientId(1), SecurityId(1), LimitSide::ShortSell),
            100
        );
        assert_eq!(
            limits.client_available(ClientId(1), SecurityId(1), LimitSide::LongSell),
            100
        );
    }
}
