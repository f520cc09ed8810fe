//! Rule engine data types (data model §3 "Rule", component C8).
//!
//! Rules are versioned and market-scoped; at most one version of a given
//! `RuleId` is active at a time (invariant, spec §4.8). Evaluation handles
//! are copy-on-write snapshots so a rule change never mutates state an
//! in-flight evaluation is reading.

use crate::core_types::{MarketId, RuleId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleType {
    InventoryInclusion,
    LocateAuto,
    ShortSellValidation,
    SettlementTreatment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleStatus {
    Active,
    Inactive,
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleCondition {
    SecurityType(crate::security::SecurityType),
    MarketEquals(MarketId),
    QuantityBelow(u64),
    QuantityAtOrAbove(u64),
    ClientTier(String),
    All(Vec<RuleCondition>),
    Any(Vec<RuleCondition>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleAction {
    IncludeInForLoan,
    ExcludeFromForLoan,
    AutoApprove,
    AutoReject,
    RouteToReview,
    CapQuantity(u64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub rule_type: RuleType,
    pub market: Option<MarketId>,
    pub version: u64,
    pub status: RuleStatus,
    /// Lower evaluates first; on a tie, conflicting non-composable actions
    /// are an error rather than a silent pick (spec §4.8).
    pub priority: u32,
    pub effective_from: chrono::DateTime<chrono::Utc>,
    pub effective_to: Option<chrono::DateTime<chrono::Utc>>,
    pub condition: RuleCondition,
    pub action: RuleAction,
}

impl Rule {
    pub fn is_effective_at(&self, at: chrono::DateTime<chrono::Utc>) -> bool {
        self.status == RuleStatus::Active
            && self.effective_from <= at
            && self.effective_to.map(|to| at < to).unwrap_or(true)
    }

    pub fn applies_to_market(&self, market: &MarketId) -> bool {
        match &self.market {
            Some(m) => m == market,
            None => true,
        }
    }
}

/// An immutable, version-tagged set of rules handed to evaluators. Cloning
/// an `Arc<RuleSnapshot>` is the copy-on-write mechanism: a rule change
/// publishes a new snapshot rather than mutating an old one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    pub snapshot_version: u64,
    pub rules: Vec<Rule>,
}

impl RuleSnapshot {
    /// Candidate rules for a market and type, in priority-ascending order.
    pub fn candidates(
        &self,
        rule_type: RuleType,
        market: &MarketId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Vec<&Rule> {
        let mut v: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.rule_type == rule_type)
            .filter(|r| r.applies_to_market(market))
            .filter(|r| r.is_effective_at(at))
            .collect();
        v.sort_by_key(|r| r.priority);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(id: u64, priority: u32, market: Option<&str>) -> Rule {
        Rule {
            id: RuleId(id),
            rule_type: RuleType::InventoryInclusion,
            market: market.map(Into::into),
            version: 1,
            status: RuleStatus::Active,
            priority,
            effective_from: Utc::now() - chrono::Duration::days(1),
            effective_to: None,
            condition: RuleCondition::All(vec![]),
            action: RuleAction::IncludeInForLoan,
        }
    }

    #[test]
    fn candidates_are_priority_ascending_and_market_scoped() {
        let snap = RuleSnapshot {
            snapshot_version: 1,
            rules: vec![rule(1, 10, Some("TW")), rule(2, 5, None), rule(3, 1, Some("US"))],
        };
        let tw: MarketId = "TW".into();
        let cands = snap.candidates(RuleType::InventoryInclusion, &tw, Utc::now());
        let ids: Vec<u64> = cands.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn expired_rule_is_not_a_candidate() {
        let mut r = rule(1, 1, None);
        r.effective_to = Some(Utc::now() - chrono::Duration::days(1));
        let snap = RuleSnapshot {
            snapshot_version: 1,
            rules: vec![r],
        };
        let us: MarketId = "US".into();
        assert!(snap
            .candidates(RuleType::InventoryInclusion, &us, Utc::now())
            .is_empty());
    }
}
