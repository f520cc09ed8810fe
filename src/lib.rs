//! Real-time inventory aggregation and distribution core for a prime
//! broker: positions, settlement ladders, availability, limits, locates,
//! and short-sell validation.
//!
//! # Modules
//!
//! - [`core_types`] - newtype ids shared across every component
//! - [`config`] - system and logging configuration
//! - [`error`] - per-component typed errors
//! - [`security`], [`counterparty`], [`contract`], [`position`], [`limit`],
//!   [`locate`], [`rule`] - domain data model
//! - [`messages`] - event envelope and ingress/egress payloads
//! - [`event_log`] - binary event-log framing, writer/reader, replay
//! - [`dispatch`] - dedup, backpressure, poison handling, partition routing
//! - [`reference_store`] - C2 identifier resolution and reconciliation
//! - [`position_engine`] - C3 positions and settlement ladders
//! - [`inventory_engine`] - C4 for-loan/for-pledge/overborrow aggregation
//! - [`limit_engine`] - C5 client/AU limits and reservation CAS
//! - [`locate_workflow`] - C6 locate lifecycle
//! - [`short_sell_validator`] - C7 two-stage order validation
//! - [`rule_engine`] - C8 versioned rule evaluation
//! - [`persistence`] - pluggable projection store traits
//! - [`logging`] - tracing setup

pub mod core_types;

pub mod config;
pub mod error;

pub mod contract;
pub mod counterparty;
pub mod limit;
pub mod locate;
pub mod position;
pub mod rule;
pub mod security;

pub mod messages;

pub mod event_log;

pub mod dispatch;
pub mod inventory_engine;
pub mod limit_engine;
pub mod locate_workflow;
pub mod position_engine;
pub mod reference_store;
pub mod rule_engine;
pub mod short_sell_validator;

pub mod persistence;

pub mod logging;

pub use config::SystemConfig;
pub use core_types::{
    AuId, BookId, BusinessDate, ClientId, ContractId, CounterpartyId, LocateId, MarketId,
    ReservationId, RuleId, SecurityId, SeqNum,
};
pub use messages::{EgressEvent, EgressPayload, Event, IngressEvent, IngressPayload};
