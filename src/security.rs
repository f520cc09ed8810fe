//! Security reference data (data model §3 "Security").

use crate::core_types::{MarketId, SecurityId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityType {
    Equity,
    CorporateBond,
    SovereignBond,
    MunicipalBond,
    Convertible,
    Etf,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityStatus {
    Active,
    Suspended,
    Delisted,
}

/// One external identifier claim, e.g. (Bloomberg, Ticker, "AAPL US Equity").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentifier {
    pub source: String,
    pub id_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    pub internal_id: SecurityId,
    pub external_ids: Vec<ExternalIdentifier>,
    pub security_type: SecurityType,
    pub issuer: String,
    pub market: MarketId,
    pub currency: String,
    pub status: SecurityStatus,
    /// Provider version; upserts must be monotonically non-decreasing.
    pub version: u64,
}

impl Security {
    pub fn matches_identifier(&self, source: &str, id_type: &str, value: &str) -> bool {
        self.external_ids
            .iter()
            .any(|id| id.source == source && id.id_type == id_type && id.value == value)
    }
}
