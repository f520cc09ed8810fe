//! C4 — Inventory engine: for-loan, for-pledge, overborrow, and locate
//! availability aggregates, rule-scoped inclusion/exclusion, and drift
//! verification (spec §4.4).
//!
//! Incremental recompute keeps per-security running totals up to date on
//! every position/contract delta; a full recompute (triggered on rule
//! change or the periodic drift check) walks every position from scratch
//! and must land on byte-identical totals — any gap is a drift exception.

use crate::contract::{Contract, ContractKind, ContractStatus};
use crate::core_types::{BookId, MarketId, SecurityId};
use crate::messages::EgressPayload;
use crate::position::Position;
use crate::rule::{RuleSnapshot, RuleType};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// Positions between cancellation checks during a full recompute. Checking
/// every row would make cancellation latency dominate; checking only once
/// would make large recomputes unresponsive to a shutdown request.
const CANCEL_CHECK_STRIDE: usize = 512;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvailabilityTotals {
    pub for_loan: i64,
    /// `for_loan - already_pledged - ca_flagged` (spec §4.4, category 2).
    pub for_pledge: i64,
    /// `borrow_contracts - required_cover`, floored at zero (category 3).
    pub overborrow: i64,
    already_pledged: i64,
    ca_flagged: i64,
    borrow_contracts: i64,
    required_cover: i64,
}

impl AvailabilityTotals {
    fn recompute_derived(&mut self) {
        self.for_pledge = self.for_loan - self.already_pledged - self.ca_flagged;
        self.overborrow = (self.borrow_contracts - self.required_cover).max(0);
    }
}

pub struct InventoryEngine {
    totals: DashMap<SecurityId, AvailabilityTotals>,
    /// Category 5: quantity currently available to back a locate approval,
    /// separate from `for_loan` since locate approvals decrement it
    /// directly and releases/expirations credit it back (spec §4.4 item 5,
    /// §4.6 decrement mechanic).
    locate_pool: DashMap<SecurityId, i64>,
}

impl Default for InventoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryEngine {
    pub fn new() -> Self {
        Self {
            totals: DashMap::new(),
            locate_pool: DashMap::new(),
        }
    }

    pub fn totals(&self, security: SecurityId) -> AvailabilityTotals {
        self.totals.get(&security).map(|r| *r).unwrap_or_default()
    }

    pub fn locate_available(&self, security: SecurityId) -> i64 {
        self.locate_pool.get(&security).map(|r| *r).unwrap_or(0)
    }

    /// Seeds the locate-availability pool directly, for an EOD/nightly job
    /// that establishes tomorrow's locate inventory ahead of any intraday
    /// position or contract deltas.
    pub fn seed_locate_pool(&self, security: SecurityId, qty: i64) {
        self.locate_pool.insert(security, qty);
    }

    /// Atomically checks and decrements the locate pool. `DashMap::entry`
    /// makes the check-and-decrement a single critical section per key, the
    /// same CAS shape the limit engine uses for reservations.
    pub fn reserve_locate(&self, security: SecurityId, qty: u64) -> bool {
        let mut entry = self.locate_pool.entry(security).or_insert(0);
        if *entry >= qty as i64 {
            *entry -= qty as i64;
            true
        } else {
            false
        }
    }

    pub fn release_locate(&self, security: SecurityId, qty: u64) {
        *self.locate_pool.entry(security).or_insert(0) += qty as i64;
    }

    /// Whether a position's long balance is includable in for-loan
    /// availability in `market`, per the rule-scoped inclusion categories
    /// (hypothecatable, not segregated, not pledged, pay-to-hold per the
    /// per-market flag — Open Question #2).
    pub fn position_is_includable(
        &self,
        pos: &Position,
        market: &MarketId,
        snapshot: &RuleSnapshot,
        include_pay_to_hold: bool,
        corporate_action_include_pending: bool,
    ) -> bool {
        if pos.flags.segregated || pos.flags.pledged_repo || pos.flags.pledged_swap {
            return false;
        }
        if pos.flags.corporate_action_pending && !corporate_action_include_pending {
            return false;
        }
        if pos.flags.pay_to_hold && !include_pay_to_hold {
            return false;
        }
        if !pos.flags.hypothecatable {
            return false;
        }
        // A market-scoped `ExcludeFromForLoan` rule overrides inclusion.
        let at = chrono::Utc::now();
        !snapshot
            .candidates(RuleType::InventoryInclusion, market, at)
            .iter()
            .any(|r| matches!(r.action, crate::rule::RuleAction::ExcludeFromForLoan))
    }

    /// Incremental update: folds one position's contribution into the
    /// running for-loan/for-pledge totals and the locate pool, applying
    /// market exclusion rules (e.g. Taiwan excludes borrowed shares from
    /// for-loan, spec §4.4 example).
    pub fn incorporate_position(
        &self,
        pos: &Position,
        market: &MarketId,
        snapshot: &RuleSnapshot,
        include_pay_to_hold: bool,
        corporate_action_include_pending: bool,
        exclude_borrowed: bool,
        is_borrowed: bool,
    ) -> EgressPayload {
        let includable = self.position_is_includable(
            pos,
            market,
            snapshot,
            include_pay_to_hold,
            corporate_action_include_pending,
        ) && !(exclude_borrowed && is_borrowed);

        let delta = if includable && pos.sd > 0 { pos.sd } else { 0 };
        let mut entry = self.totals.entry(pos.security).or_default();
        let for_loan_before = entry.for_loan;
        let for_pledge_before = entry.for_pledge;
        entry.for_loan += delta;
        if (pos.flags.pledged_repo || pos.flags.pledged_swap) && pos.sd > 0 {
            entry.already_pledged += pos.sd;
        }
        if pos.flags.corporate_action_pending && pos.sd > 0 {
            entry.ca_flagged += pos.sd;
        }
        entry.recompute_derived();
        let for_loan_delta = entry.for_loan - for_loan_before;
        let for_pledge_delta = entry.for_pledge - for_pledge_before;
        drop(entry);

        *self.locate_pool.entry(pos.security).or_insert(0) += delta;

        EgressPayload::InventoryDelta {
            security: pos.security,
            for_loan_delta,
            for_pledge_delta,
        }
    }

    pub fn incorporate_contract(&self, contract: &Contract) -> EgressPayload {
        let mut entry = self.totals.entry(contract.security).or_default();
        let qty = contract.quantity as i64;
        let for_loan_before = entry.for_loan;
        let for_pledge_before = entry.for_pledge;
        if contract.contributes_to_for_loan() {
            entry.for_loan += qty;
        } else if contract.removes_from_inventory() {
            entry.for_loan -= qty;
        }
        if matches!(contract.kind, ContractKind::Borrow { .. }) && contract.status != ContractStatus::Closed {
            entry.borrow_contracts += qty;
        }
        if contract.removes_from_inventory() {
            entry.required_cover += qty;
        }
        entry.recompute_derived();
        let for_loan_delta = entry.for_loan - for_loan_before;
        let for_pledge_delta = entry.for_pledge - for_pledge_before;
        drop(entry);

        if contract.contributes_to_for_loan() {
            *self.locate_pool.entry(contract.security).or_insert(0) += qty;
        } else if contract.removes_from_inventory() {
            *self.locate_pool.entry(contract.security).or_insert(0) -= qty;
        }

        EgressPayload::InventoryDelta {
            security: contract.security,
            for_loan_delta,
            for_pledge_delta,
        }
    }

    /// Projected for-loan availability along the settlement ladder (spec
    /// §4.4: "ForLoan_k = baseline + Σ projected settlement deltas through
    /// SD_k"), one total per ladder bucket, under the same inclusion rule
    /// as the incremental baseline.
    pub fn projected_for_loan(
        &self,
        positions: &[(Position, MarketId, bool)],
        snapshot: &RuleSnapshot,
        include_pay_to_hold: bool,
        corporate_action_include_pending: bool,
        exclude_borrowed: bool,
    ) -> Vec<i64> {
        let ladder_days = positions.first().map(|(p, _, _)| p.ladder_days()).unwrap_or(0);
        let mut projected = vec![0i64; ladder_days];
        for (pos, market, is_borrowed) in positions {
            let includable = self.position_is_includable(
                pos,
                market,
                snapshot,
                include_pay_to_hold,
                corporate_action_include_pending,
            ) && !(exclude_borrowed && *is_borrowed);
            if !includable {
                continue;
            }
            for (k, bucket) in projected.iter_mut().enumerate() {
                *bucket += pos.projected(k);
            }
        }
        projected
    }

    /// Full recompute from a clean slate, used for rule-change replay and
    /// drift verification (spec §4.4: "must produce byte-identical
    /// output for the same inputs and rule snapshot"). Cooperatively
    /// cancellable: on cancellation the partial scratch totals are
    /// discarded and the live totals are left untouched, so the caller's
    /// replay cursor must not be advanced (spec §5 "bulk recomputation").
    pub fn recompute_all(
        &self,
        positions: &[(Position, MarketId, bool)],
        snapshot: &RuleSnapshot,
        include_pay_to_hold: bool,
        corporate_action_include_pending: bool,
        exclude_borrowed: bool,
        cancel: &CancellationToken,
    ) -> Option<DashMap<SecurityId, AvailabilityTotals>> {
        let scratch = DashMap::new();
        for (i, (pos, market, is_borrowed)) in positions.iter().enumerate() {
            if i % CANCEL_CHECK_STRIDE == 0 && cancel.is_cancelled() {
                return None;
            }
            let includable = self.position_is_includable(
                pos,
                market,
                snapshot,
                include_pay_to_hold,
                corporate_action_include_pending,
            ) && !(exclude_borrowed && *is_borrowed);
            let delta = if includable && pos.sd > 0 { pos.sd } else { 0 };
            let mut entry = scratch.entry(pos.security).or_insert_with(AvailabilityTotals::default);
            entry.for_loan += delta;
            if (pos.flags.pledged_repo || pos.flags.pledged_swap) && pos.sd > 0 {
                entry.already_pledged += pos.sd;
            }
            if pos.flags.corporate_action_pending && pos.sd > 0 {
                entry.ca_flagged += pos.sd;
            }
        }
        if cancel.is_cancelled() {
            return None;
        }
        for mut entry in scratch.iter_mut() {
            entry.recompute_derived();
        }

        self.totals.clear();
        for entry in scratch.iter() {
            self.totals.insert(*entry.key(), *entry.value());
        }
        Some(scratch)
    }

    /// Compares a freshly recomputed total set against the live
    /// incremental totals; any mismatch is a drift exception (spec §4.4).
    pub fn detect_drift(&self, recomputed: &DashMap<SecurityId, AvailabilityTotals>) -> Vec<SecurityId> {
        let mut drifted = Vec::new();
        for entry in recomputed.iter() {
            let (security, recomputed_totals) = entry.pair();
            let live = self.totals(*security);
            if live != *recomputed_totals {
                drifted.push(*security);
            }
        }
        drifted.sort_by_key(|s| s.0);
        drifted
    }
}
