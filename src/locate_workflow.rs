//! C6 — Locate request workflow: lifecycle orchestration, auto-rule
//! evaluation, and intraday decrement (spec §4.6).

use crate::core_types::{ClientId, LocateId, SecurityId};
use crate::error::LocateError;
use crate::inventory_engine::InventoryEngine;
use crate::locate::{LocateRequest, LocateState};
use crate::rule::{RuleAction, RuleSnapshot, RuleType};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub struct LocateWorkflow {
    requests: DashMap<LocateId, LocateRequest>,
    next_id: AtomicU64,
    rule_deadline: std::time::Duration,
}

pub enum AutoRuleVerdict {
    Approved,
    Rejected(String),
    RouteToReview,
}

impl LocateWorkflow {
    pub fn new(rule_deadline: std::time::Duration) -> Self {
        Self {
            requests: DashMap::new(),
            next_id: AtomicU64::new(1),
            rule_deadline,
        }
    }

    pub fn get(&self, id: LocateId) -> Option<LocateRequest> {
        self.requests.get(&id).map(|r| r.clone())
    }

    /// Submits a new locate request at `Received`, immediately advancing
    /// it to `Validating` (spec §4.6 step 1).
    pub fn submit(
        &self,
        client: ClientId,
        security: SecurityId,
        requested_qty: u64,
        now: chrono::DateTime<chrono::Utc>,
        ttl: Option<std::time::Duration>,
    ) -> LocateId {
        let id = LocateId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let expires_at = match ttl {
            Some(ttl) => now + chrono::Duration::from_std(ttl).unwrap_or_default(),
            None => now
                .date_naive()
                .and_hms_opt(23, 59, 59)
                .unwrap()
                .and_utc(),
        };
        let mut req = LocateRequest {
            id,
            client,
            security,
            requested_qty,
            approved_qty: 0,
            decrement_qty: 0,
            state: LocateState::Received,
            created_at: now,
            expires_at,
            rule_id: None,
        };
        req.transition(LocateState::Validating).unwrap();
        self.requests.insert(id, req);
        id
    }

    /// Evaluates the C8 auto-approval rules against a locate request,
    /// enforcing a hard deadline (spec §4.6: "auto-rule evaluation must
    /// complete within its configured deadline or route to manual
    /// review"). Reserves against the locate-availability pool (category
    /// 5, §4.4) up front and releases the reservation on any outcome other
    /// than approval.
    pub fn evaluate_auto_rules(
        &self,
        id: LocateId,
        market: &crate::core_types::MarketId,
        snapshot: &RuleSnapshot,
        inventory: &InventoryEngine,
    ) -> Result<AutoRuleVerdict, LocateError> {
        let started = Instant::now();
        let mut req = self
            .requests
            .get_mut(&id)
            .ok_or(LocateError::InvalidTransition(id))?;

        let candidates = snapshot.candidates(RuleType::LocateAuto, market, chrono::Utc::now());
        let reserved = inventory.reserve_locate(req.security, req.requested_qty);

        let verdict = if started.elapsed() > self.rule_deadline {
            AutoRuleVerdict::RouteToReview
        } else if !reserved {
            AutoRuleVerdict::Rejected("insufficient locate availability".to_string())
        } else if candidates
            .iter()
            .any(|r| matches!(r.action, RuleAction::AutoReject))
        {
            AutoRuleVerdict::Rejected("auto-reject rule matched".to_string())
        } else if candidates
            .iter()
            .any(|r| matches!(r.action, RuleAction::AutoApprove))
        {
            AutoRuleVerdict::Approved
        } else {
            AutoRuleVerdict::RouteToReview
        };

        match &verdict {
            AutoRuleVerdict::Approved => {
                req.transition(LocateState::AutoApproved).ok();
                req.approved_qty = req.requested_qty;
                req.decrement_qty = req.requested_qty;
                req.transition(LocateState::Approved).ok();
            }
            AutoRuleVerdict::Rejected(_) => {
                if reserved {
                    inventory.release_locate(req.security, req.requested_qty);
                }
                req.transition(LocateState::AutoRejected).ok();
            }
            AutoRuleVerdict::RouteToReview => {
                if reserved {
                    inventory.release_locate(req.security, req.requested_qty);
                }
                req.transition(LocateState::PendingReview).ok();
            }
        }
        Ok(verdict)
    }

    /// Manual approval path: reserves `approved_qty` against the locate
    /// pool before the state transition so a reviewer can never approve
    /// past what's actually available.
    pub fn manual_approve(
        &self,
        id: LocateId,
        approved_qty: u64,
        inventory: &InventoryEngine,
    ) -> Result<(), LocateError> {
        let mut req = self
            .requests
            .get_mut(&id)
            .ok_or(LocateError::InvalidTransition(id))?;
        let qty = approved_qty.min(req.requested_qty);
        if !inventory.reserve_locate(req.security, qty) {
            return Err(LocateError::InsufficientInventory(req.security));
        }
        req.transition(LocateState::UnderReview).ok();
        if let Err(e) = req.transition(LocateState::Approved) {
            inventory.release_locate(req.security, qty);
            return Err(e);
        }
        req.approved_qty = qty;
        req.decrement_qty = qty;
        Ok(())
    }

    pub fn manual_reject(&self, id: LocateId) -> Result<(), LocateError> {
        let mut req = self
            .requests
            .get_mut(&id)
            .ok_or(LocateError::InvalidTransition(id))?;
        req.transition(LocateState::UnderReview).ok();
        req.transition(LocateState::Rejected)
    }

    /// Intraday adjustment (spec §4.6): as executions against an approved
    /// locate accumulate, raise the approved quantity toward the execution
    /// quantity (never above the original request), and shrink it toward
    /// executions as the book nears close, never below what has already
    /// executed. The live pool reservation (`decrement_qty`) tracks
    /// `approved_qty - executed_qty` and is re-adjusted by the delta, so it
    /// can sit below `approved_qty` once executions have eaten into the
    /// hold (Testable Property #3, Scenario C).
    pub fn adjust_intraday(
        &self,
        id: LocateId,
        executed_qty: u64,
        inventory: &InventoryEngine,
    ) -> Result<(), LocateError> {
        let mut req = self
            .requests
            .get_mut(&id)
            .ok_or(LocateError::InvalidTransition(id))?;
        let new_approved_qty = executed_qty.max(req.approved_qty);
        req.adjust_approved_qty(new_approved_qty, executed_qty);

        let remaining_hold = req.approved_qty.saturating_sub(executed_qty);
        match remaining_hold.cmp(&req.decrement_qty) {
            std::cmp::Ordering::Less => {
                inventory.release_locate(req.security, req.decrement_qty - remaining_hold);
            }
            std::cmp::Ordering::Greater => {
                inventory.reserve_locate(req.security, remaining_hold - req.decrement_qty);
            }
            std::cmp::Ordering::Equal => {}
        }
        req.decrement_qty = remaining_hold;
        Ok(())
    }

    pub fn confirm(&self, id: LocateId) -> Result<(), LocateError> {
        let mut req = self
            .requests
            .get_mut(&id)
            .ok_or(LocateError::InvalidTransition(id))?;
        req.transition(LocateState::Confirmed)
    }

    /// Expires any non-terminal request past its expiry time, crediting
    /// any outstanding pool reservation back before marking it terminal.
    pub fn expire_stale(&self, now: chrono::DateTime<chrono::Utc>, inventory: &InventoryEngine) -> Vec<LocateId> {
        let mut expired = Vec::new();
        for mut entry in self.requests.iter_mut() {
            if !entry.state.is_terminal() && entry.is_expired(now) {
                if entry.decrement_qty > 0 {
                    inventory.release_locate(entry.security, entry.decrement_qty);
                    entry.decrement_qty = 0;
                }
                entry.state = LocateState::Expired;
                expired.push(entry.id);
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Rule, RuleCondition, RuleStatus};
    use std::time::Duration;

    fn workflow() -> LocateWorkflow {
        LocateWorkflow::new(Duration::from_millis(50))
    }

    fn auto_approve_rule() -> RuleSnapshot {
        RuleSnapshot {
            snapshot_version: 1,
            rules: vec![Rule {
                id: crate::core_types::RuleId(1),
                rule_type: RuleType::LocateAuto,
                market: None,
                version: 1,
                status: RuleStatus::Active,
                priority: 1,
                effective_from: chrono::Utc::now() - chrono::Duration::days(1),
                effective_to: None,
                condition: RuleCondition::All(vec![]),
                action: RuleAction::AutoApprove,
            }],
        }
    }

    /// Scenario C from spec §8: locate auto-approve with decrement and
    /// intraday adjustment — executions partially eat into the approved
    /// hold, leaving the pool reservation below the approved ceiling.
    #[test]
    fn scenario_c_auto_approve_then_intraday_adjustment() {
        let wf = workflow();
        let inventory = InventoryEngine::new();
        inventory.seed_locate_pool(SecurityId(1), 5_000);
        let us: crate::core_types::MarketId = "US".into();
        let id = wf.submit(ClientId(1), SecurityId(1), 1_000, chrono::Utc::now(), None);

        let verdict = wf
            .evaluate_auto_rules(id, &us, &auto_approve_rule(), &inventory)
            .unwrap();
        assert!(matches!(verdict, AutoRuleVerdict::Approved));

        let req = wf.get(id).unwrap();
        assert_eq!(req.state, LocateState::Approved);
        assert_eq!(req.approved_qty, 1_000);
        assert_eq!(req.decrement_qty, 1_000);
        assert_eq!(inventory.locate_available(SecurityId(1)), 4_000);

        wf.adjust_intraday(id, 200, &inventory).unwrap();
        let req = wf.get(id).unwrap();
        assert_eq!(req.approved_qty, 1_000);
        assert_eq!(req.decrement_qty, 800);
        assert_eq!(inventory.locate_available(SecurityId(1)), 4_200);

        wf.confirm(id).unwrap();
        assert_eq!(wf.get(id).unwrap().state, LocateState::Confirmed);
    }

    #[test]
    fn insufficient_availability_auto_rejects() {
        let wf = workflow();
        let inventory = InventoryEngine::new();
        inventory.seed_locate_pool(SecurityId(1), 10);
        let us: crate::core_types::MarketId = "US".into();
        let id = wf.submit(ClientId(1), SecurityId(1), 1_000, chrono::Utc::now(), None);
        let verdict = wf
            .evaluate_auto_rules(id, &us, &auto_approve_rule(), &inventory)
            .unwrap();
        assert!(matches!(verdict, AutoRuleVerdict::Rejected(_)));
        assert_eq!(wf.get(id).unwrap().state, LocateState::AutoRejected);
        assert_eq!(inventory.locate_available(SecurityId(1)), 10);
    }

    #[test]
    fn no_matching_rule_routes_to_review_and_releases_reservation() {
        let wf = workflow();
        let inventory = InventoryEngine::new();
        inventory.seed_locate_pool(SecurityId(1), 1_000);
        let us: crate::core_types::MarketId = "US".into();
        let empty = RuleSnapshot {
            snapshot_version: 1,
            rules: vec![],
        };
        let id = wf.submit(ClientId(1), SecurityId(1), 100, chrono::Utc::now(), None);
        let verdict = wf.evaluate_auto_rules(id, &us, &empty, &inventory).unwrap();
        assert!(matches!(verdict, AutoRuleVerdict::RouteToReview));
        let req = wf.get(id).unwrap();
        assert_eq!(req.state, LocateState::PendingReview);
        assert_eq!(inventory.locate_available(SecurityId(1)), 1_000);

        wf.manual_approve(id, 80, &inventory).unwrap();
        let req = wf.get(id).unwrap();
        assert_eq!(req.state, LocateState::Approved);
        assert_eq!(req.approved_qty, 80);
        assert_eq!(req.decrement_qty, 80);
        assert_eq!(inventory.locate_available(SecurityId(1)), 920);
    }

    #[test]
    fn manual_approve_rejects_when_pool_is_exhausted() {
        let wf = workflow();
        let inventory = InventoryEngine::new();
        inventory.seed_locate_pool(SecurityId(1), 50);
        let us: crate::core_types::MarketId = "US".into();
        let empty = RuleSnapshot {
            snapshot_version: 1,
            rules: vec![],
        };
        let id = wf.submit(ClientId(1), SecurityId(1), 100, chrono::Utc::now(), None);
        wf.evaluate_auto_rules(id, &us, &empty, &inventory).unwrap();

        let err = wf.manual_approve(id, 80, &inventory).unwrap_err();
        assert_eq!(err, LocateError::InsufficientInventory(SecurityId(1)));
    }

    #[test]
    fn expiry_sweep_moves_past_deadline_requests_to_expired_and_releases_hold() {
        let wf = workflow();
        let inventory = InventoryEngine::new();
        inventory.seed_locate_pool(SecurityId(1), 1_000);
        let us: crate::core_types::MarketId = "US".into();
        let past = chrono::Utc::now() - chrono::Duration::hours(1);
        let id = wf.submit(
            ClientId(1),
            SecurityId(1),
            100,
            past,
            Some(Duration::from_secs(1)),
        );
        wf.evaluate_auto_rules(id, &us, &auto_approve_rule(), &inventory)
            .unwrap();
        assert_eq!(inventory.locate_available(SecurityId(1)), 900);

        let expired = wf.expire_stale(chrono::Utc::now(), &inventory);
        assert_eq!(expired, vec![id]);
        assert_eq!(inventory.locate_available(SecurityId(1)), 1_000);
    }
}
