//! Event envelope and payload types carried on the event fabric.
//!
//! # Event Flow
//!
//! ```text
//! Ingress adapters → Event{payload: Ingress} → dispatch (partition by key)
//!     → C2/C3/C4/C5/C6/C7 → Event{payload: Egress} → downstream consumers
//! ```

use crate::contract::ExternalAvailability;
use crate::core_types::{AuId, BookId, BusinessDate, ClientId, ContractId, LocateId, SecurityId};
use crate::counterparty::{AggregationUnit, Counterparty};
use crate::limit::Reservation;
use crate::position::Side;
use crate::security::Security;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ingress record, keyed by (source, event-id) for dedup (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceUpsert {
    pub security: Option<Security>,
    pub counterparty: Option<Counterparty>,
    pub aggregation_unit: Option<AggregationUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataTick {
    pub security: SecurityId,
    pub price: rust_decimal::Decimal,
    pub nav: Option<rust_decimal::Decimal>,
    pub volatility: Option<rust_decimal::Decimal>,
    pub fx_rate: Option<rust_decimal::Decimal>,
    pub as_of: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SodPositionLoad {
    pub book: BookId,
    pub security: SecurityId,
    pub business_date: BusinessDate,
    pub td: i64,
    pub sd: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeExecution {
    pub book: BookId,
    pub security: SecurityId,
    pub side: Side,
    pub qty: u64,
    pub settlement_date: BusinessDate,
    pub order_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepotPositionUpdate {
    pub book: BookId,
    pub security: SecurityId,
    pub business_date: BusinessDate,
    pub sd_delta: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractEvent {
    pub contract_id: ContractId,
    pub contract: crate::contract::Contract,
}

/// A pre-trade order awaiting short-sell validation (spec §4.7). Only
/// `Sell`/`ShortSell` orders need the two-stage reservation; a `Buy` passes
/// straight through to execution without visiting C7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub book: BookId,
    pub security: SecurityId,
    pub side: Side,
    pub qty: u64,
}

/// Ingress payload union. One variant per event type named in spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IngressPayload {
    Reference(ReferenceUpsert),
    MarketData(MarketDataTick),
    SodPosition(SodPositionLoad),
    Execution(TradeExecution),
    DepotPosition(DepotPositionUpdate),
    Contract(ContractEvent),
    OrderRequest(OrderRequest),
    ExternalAvailability(ExternalAvailability),
    LocateRequested {
        client: ClientId,
        security: SecurityId,
        qty: u64,
    },
    RuleChanged {
        rule: crate::rule::Rule,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExceptionKind {
    IdentifierConflict,
    DriftDetected,
    InvariantViolation,
    PoisonMessage,
    RuleConflict,
}

/// Egress payload union published by C2-C8 once a change is committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EgressPayload {
    PositionDelta {
        book: BookId,
        security: SecurityId,
        td_delta: i64,
        sd_delta: i64,
    },
    InventoryDelta {
        security: SecurityId,
        for_loan_delta: i64,
        for_pledge_delta: i64,
    },
    LimitDelta {
        reservation: Reservation,
    },
    LocateApproved {
        locate_id: LocateId,
        approved_qty: u64,
    },
    LocateRejected {
        locate_id: LocateId,
        reason: String,
    },
    OrderValidated {
        book: BookId,
        security: SecurityId,
        qty: u64,
    },
    OrderRejected {
        book: BookId,
        security: SecurityId,
        reason: String,
    },
    Exception {
        kind: ExceptionKind,
        detail: String,
    },
}

/// One envelope on the event fabric: ingress on the way in, egress on the
/// way out. `partition_key` drives single-writer routing in the dispatcher;
/// `(source, event_id)` is the dedup fingerprint (spec §5.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<P> {
    pub event_id: Uuid,
    pub source: String,
    pub logical_timestamp: chrono::DateTime<chrono::Utc>,
    pub correlation_id: Uuid,
    pub partition_key: u64,
    pub schema_version: u8,
    pub payload: P,
}

pub type IngressEvent = Event<IngressPayload>;
pub type EgressEvent = Event<EgressPayload>;

impl<P> Event<P> {
    pub fn new(source: impl Into<String>, partition_key: u64, payload: P) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            source: source.into(),
            logical_timestamp: chrono::Utc::now(),
            correlation_id: Uuid::new_v4(),
            partition_key,
            schema_version: 1,
            payload,
        }
    }

    /// Dedup fingerprint: (source, event_id). Two envelopes with the same
    /// fingerprint within the dedup window are the same logical delivery.
    pub fn fingerprint(&self) -> (String, Uuid) {
        (self.source.clone(), self.event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_across_clones() {
        let ev = Event::new(
            "oms",
            42,
            IngressPayload::LocateRequested {
                client: ClientId(1),
                security: SecurityId(1),
                qty: 100,
            },
        );
        let cloned = ev.clone();
        assert_eq!(ev.fingerprint(), cloned.fingerprint());
    }

    #[test]
    fn distinct_events_have_distinct_fingerprints() {
        let a = Event::new(
            "oms",
            1,
            IngressPayload::LocateRequested {
                client: ClientId(1),
                security: SecurityId(1),
                qty: 1,
            },
        );
        let b = Event::new(
            "oms",
            1,
            IngressPayload::LocateRequested {
                client: ClientId(1),
                security: SecurityId(1),
                qty: 1,
            },
        );
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
