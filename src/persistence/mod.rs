//! Pluggable projection store traits (spec §6 "External interfaces —
//! projection store"), plus an in-memory implementation used by tests and
//! the demo binary. Mirrors the teacher's repository-trait split: business
//! logic depends on the trait, never on a specific backing store.

mod memory;

pub use memory::InMemoryProjectionStore;

use crate::contract::Contract;
use crate::inventory_engine::AvailabilityTotals;
use crate::limit::{AuLimit, ClientLimit, LimitSide};
use crate::locate::LocateRequest;
use crate::position::Position;
use crate::security::Security;
use anyhow::Result;
use async_trait::async_trait;

/// Read-side projection of current positions, keyed by (book, security).
#[async_trait]
pub trait PositionProjection: Send + Sync {
    async fn get_position(
        &self,
        book: crate::core_types::BookId,
        security: crate::core_types::SecurityId,
    ) -> Result<Option<Position>>;

    async fn put_position(&self, position: Position) -> Result<()>;
}

#[async_trait]
pub trait InventoryProjection: Send + Sync {
    async fn get_totals(
        &self,
        security: crate::core_types::SecurityId,
    ) -> Result<AvailabilityTotals>;

    async fn put_totals(
        &self,
        security: crate::core_types::SecurityId,
        totals: AvailabilityTotals,
    ) -> Result<()>;
}

#[async_trait]
pub trait LimitProjection: Send + Sync {
    async fn get_client_limit(
        &self,
        client: crate::core_types::ClientId,
        security: crate::core_types::SecurityId,
        side: LimitSide,
    ) -> Result<Option<ClientLimit>>;

    async fn get_au_limit(
        &self,
        au: crate::core_types::AuId,
        security: crate::core_types::SecurityId,
        side: LimitSide,
    ) -> Result<Option<AuLimit>>;
}

#[async_trait]
pub trait LocateProjection: Send + Sync {
    async fn get_locate(
        &self,
        id: crate::core_types::LocateId,
    ) -> Result<Option<LocateRequest>>;

    async fn put_locate(&self, request: LocateRequest) -> Result<()>;
}

#[async_trait]
pub trait ReferenceProjection: Send + Sync {
    async fn get_security(
        &self,
        id: crate::core_types::SecurityId,
    ) -> Result<Option<Security>>;

    async fn put_security(&self, security: Security) -> Result<()>;
}

#[async_trait]
pub trait ContractProjection: Send + Sync {
    async fn get_contract(
        &self,
        id: crate::core_types::ContractId,
    ) -> Result<Option<Contract>>;

    async fn put_contract(&self, contract: Contract) -> Result<()>;
}
