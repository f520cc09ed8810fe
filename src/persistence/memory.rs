//! In-memory projection store. Backs integration tests and the demo
//! binary; a production deployment swaps in a durable implementation of
//! the same traits without touching component code.

use super::{
    ContractProjection, InventoryProjection, LimitProjection, LocateProjection,
    PositionProjection, ReferenceProjection,
};
use crate::contract::Contract;
use crate::core_types::{AuId, BookId, ClientId, ContractId, LocateId, SecurityId};
use crate::inventory_engine::AvailabilityTotals;
use crate::limit::{AuLimit, ClientLimit, LimitSide};
use crate::locate::LocateRequest;
use crate::position::Position;
use crate::security::Security;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Default)]
pub struct InMemoryProjectionStore {
    positions: DashMap<(BookId, SecurityId), Position>,
    totals: DashMap<SecurityId, AvailabilityTotals>,
    client_limits: DashMap<(ClientId, SecurityId, LimitSide), ClientLimit>,
    au_limits: DashMap<(AuId, SecurityId, LimitSide), AuLimit>,
    locates: DashMap<LocateId, LocateRequest>,
    securities: DashMap<SecurityId, Security>,
    contracts: DashMap<ContractId, Contract>,
}

impl InMemoryProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_client_limit(&self, limit: ClientLimit) {
        self.client_limits
            .insert((limit.client, limit.security, limit.side), limit);
    }

    pub fn set_au_limit(&self, limit: AuLimit) {
        self.au_limits.insert((limit.au, limit.security, limit.side), limit);
    }
}

#[async_trait]
impl PositionProjection for InMemoryProjectionStore {
    async fn get_position(&self, book: BookId, security: SecurityId) -> Result<Option<Position>> {
        Ok(self.positions.get(&(book, security)).map(|r| r.clone()))
    }

    async fn put_position(&self, position: Position) -> Result<()> {
        self.positions
            .insert((position.book, position.security), position);
        Ok(())
    }
}

#[async_trait]
impl InventoryProjection for InMemoryProjectionStore {
    async fn get_totals(&self, security: SecurityId) -> Result<AvailabilityTotals> {
        Ok(self.totals.get(&security).map(|r| *r).unwrap_or_default())
    }

    async fn put_totals(&self, security: SecurityId, totals: AvailabilityTotals) -> Result<()> {
        self.totals.insert(security, totals);
        Ok(())
    }
}

#[async_trait]
impl LimitProjection for InMemoryProjectionStore {
    async fn get_client_limit(
        &self,
        client: ClientId,
        security: SecurityId,
        side: LimitSide,
    ) -> Result<Option<ClientLimit>> {
        Ok(self
            .client_limits
            .get(&(client, security, side))
            .map(|r| r.clone()))
    }

    async fn get_au_limit(
        &self,
        au: AuId,
        security: SecurityId,
        side: LimitSide,
    ) -> Result<Option<AuLimit>> {
        Ok(self.au_limits.get(&(au, security, side)).map(|r| r.clone()))
    }
}

#[async_trait]
impl LocateProjection for InMemoryProjectionStore {
    async fn get_locate(&self, id: LocateId) -> Result<Option<LocateRequest>> {
        Ok(self.locates.get(&id).map(|r| r.clone()))
    }

    async fn put_locate(&self, request: LocateRequest) -> Result<()> {
        self.locates.insert(request.id, request);
        Ok(())
    }
}

#[async_trait]
impl ReferenceProjection for InMemoryProjectionStore {
    async fn get_security(&self, id: SecurityId) -> Result<Option<Security>> {
        Ok(self.securities.get(&id).map(|r| r.clone()))
    }

    async fn put_security(&self, security: Security) -> Result<()> {
        self.securities.insert(security.internal_id, security);
        Ok(())
    }
}

#[async_trait]
impl ContractProjection for InMemoryProjectionStore {
    async fn get_contract(&self, id: ContractId) -> Result<Option<Contract>> {
        Ok(self.contracts.get(&id).map(|r| r.clone()))
    }

    async fn put_contract(&self, contract: Contract) -> Result<()> {
        self.contracts.insert(contract.id, contract);
        Ok(())
    }
}
