//! Counterparty and Aggregation Unit reference data (data model §3).

use crate::core_types::{AuId, CounterpartyId, MarketId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterpartyType {
    Internal,
    Client,
    Broker,
    Custodian,
    Advisor,
    Agent,
    Operations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KycStatus {
    Verified,
    Pending,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleStatus {
    Active,
    Suspended,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    pub id: CounterpartyId,
    pub counterparty_type: CounterpartyType,
    pub kyc_status: KycStatus,
    pub lifecycle_status: LifecycleStatus,
    pub parent: Option<CounterpartyId>,
    pub version: u64,
}

impl Counterparty {
    /// The designated *self* internal counterparty must exist exactly once;
    /// this constructs it with the fixed, well-known id 0.
    pub fn new_self() -> Self {
        Self {
            id: CounterpartyId(0),
            counterparty_type: CounterpartyType::Internal,
            kyc_status: KycStatus::Verified,
            lifecycle_status: LifecycleStatus::Active,
            parent: None,
            version: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationUnitType {
    Long,
    Short,
    Net,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationUnit {
    pub id: AuId,
    pub market: MarketId,
    pub name: String,
    pub au_type: AggregationUnitType,
}
