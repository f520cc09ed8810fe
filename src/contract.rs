//! Financing contracts: loans, borrows, repos, pledges, and swap positions
//! (data model §3 "Contract"), plus externally-reported availability.

use crate::core_types::{BusinessDate, ContractId, CounterpartyId, SecurityId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollateralType {
    Cash,
    NonCash,
    Tripartite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralLeg {
    pub collateral_type: CollateralType,
    pub haircut_pct: Decimal,
    pub margin_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContractKind {
    /// We lend securities out to a counterparty.
    Loan { collateral: CollateralLeg },
    /// We borrow securities in from a counterparty.
    Borrow { collateral: CollateralLeg },
    /// Repo: we hold securities as collateral against cash lent.
    RepoIn { collateral: CollateralLeg },
    /// Reverse repo: we post securities as collateral against cash borrowed.
    RepoOut { collateral: CollateralLeg },
    PledgeIn,
    PledgeOut,
    /// Synthetic position carried under a swap, not a physical settlement.
    SwapPosition { notional_qty: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStatus {
    Open,
    PartiallyReturned,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub security: SecurityId,
    pub counterparty: CounterpartyId,
    pub kind: ContractKind,
    pub quantity: u64,
    pub trade_date: BusinessDate,
    pub value_date: BusinessDate,
    pub maturity_date: Option<BusinessDate>,
    pub status: ContractStatus,
    pub version: u64,
}

impl Contract {
    /// True for contracts that add to for-loan availability (we hold the
    /// security and can re-lend it).
    pub fn contributes_to_for_loan(&self) -> bool {
        matches!(
            self.kind,
            ContractKind::Borrow { .. } | ContractKind::RepoIn { .. } | ContractKind::PledgeIn
        ) && self.status != ContractStatus::Closed
    }

    /// True for contracts that remove the security from our own inventory
    /// (we've lent it, repo'd it out, or pledged it out).
    pub fn removes_from_inventory(&self) -> bool {
        matches!(
            self.kind,
            ContractKind::Loan { .. } | ContractKind::RepoOut { .. } | ContractKind::PledgeOut
        ) && self.status != ContractStatus::Closed
    }
}

/// Availability reported by an external venue/custodian (ingress only; never
/// derived locally). Spec §3 "ExternalAvailability".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalAvailability {
    pub security: SecurityId,
    pub source: String,
    pub quantity: u64,
    pub as_of: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(kind: ContractKind) -> Contract {
        Contract {
            id: ContractId(1),
            security: SecurityId(1),
            counterparty: CounterpartyId(2),
            kind,
            quantity: 1_000,
            trade_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            value_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            maturity_date: None,
            status: ContractStatus::Open,
            version: 1,
        }
    }

    #[test]
    fn borrow_contributes_to_for_loan() {
        let c = sample(ContractKind::Borrow {
            collateral: CollateralLeg {
                collateral_type: CollateralType::Cash,
                haircut_pct: Decimal::new(2, 2),
                margin_pct: Decimal::new(102, 2),
            },
        });
        assert!(c.contributes_to_for_loan());
        assert!(!c.removes_from_inventory());
    }

    #[test]
    fn loan_removes_from_inventory() {
        let c = sample(ContractKind::Loan {
            collateral: CollateralLeg {
                collateral_type: CollateralType::NonCash,
                haircut_pct: Decimal::new(5, 2),
                margin_pct: Decimal::new(105, 2),
            },
        });
        assert!(c.removes_from_inventory());
        assert!(!c.contributes_to_for_loan());
    }

    #[test]
    fn closed_contract_no_longer_contributes() {
        let mut c = sample(ContractKind::PledgeIn);
        c.status = ContractStatus::Closed;
        assert!(!c.contributes_to_for_loan());
    }
}
