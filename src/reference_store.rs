//! C2 — Reference data store: identifier resolution, upsert, and the
//! identifier reconciliation algorithm (spec §4.2).
//!
//! Conflicting claims are never guessed or merged: a resolve that would
//! require a guess is suspended and surfaced as
//! [`crate::error::ReferenceError::Conflict`].

use crate::core_types::SecurityId;
use crate::error::ReferenceError;
use crate::security::{ExternalIdentifier, Security};
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Priority order among identifier sources, highest first. Grounded in
/// spec §4.2's tie-break rule: "prefer the internal id already claimed by
/// the highest-priority source".
#[derive(Debug, Clone)]
pub struct SourcePriority(Vec<String>);

impl SourcePriority {
    pub fn new(order: Vec<String>) -> Self {
        Self(order)
    }

    fn rank(&self, source: &str) -> usize {
        self.0.iter().position(|s| s == source).unwrap_or(usize::MAX)
    }
}

#[derive(Default)]
struct IdentifierIndex {
    by_claim: FxHashMap<(String, String, String), SecurityId>,
}

pub struct ReferenceStore {
    securities: DashMap<SecurityId, Security>,
    index: std::sync::RwLock<IdentifierIndex>,
    next_internal_id: AtomicU64,
    priority: SourcePriority,
}

impl ReferenceStore {
    pub fn new(priority: SourcePriority) -> Self {
        Self {
            securities: DashMap::new(),
            index: std::sync::RwLock::new(IdentifierIndex::default()),
            next_internal_id: AtomicU64::new(1),
            priority,
        }
    }

    pub fn get(&self, id: SecurityId) -> Option<Security> {
        self.securities.get(&id).map(|r| r.clone())
    }

    /// Resolve an external identifier claim to an internal id. Returns
    /// `Unmapped` if no security has ever claimed it.
    pub fn resolve(
        &self,
        source: &str,
        id_type: &str,
        value: &str,
    ) -> Result<SecurityId, ReferenceError> {
        let key = (source.to_string(), id_type.to_string(), value.to_string());
        self.index
            .read()
            .unwrap()
            .by_claim
            .get(&key)
            .copied()
            .ok_or_else(|| ReferenceError::Unmapped {
                source_name: source.to_string(),
                id_type: id_type.to_string(),
                value: value.to_string(),
            })
    }

    /// Upsert a security record. Versions must be monotonically
    /// non-decreasing per source (spec §3 "Security.version").
    pub fn upsert(&self, mut security: Security) -> Result<SecurityId, ReferenceError> {
        let resolved = self.reconcile(&security.external_ids)?;
        let internal_id = resolved.unwrap_or_else(|| self.allocate_id());

        if let Some(existing) = self.securities.get(&internal_id) {
            if security.version <= existing.version {
                return Err(ReferenceError::StaleVersion {
                    incoming: security.version,
                    current: existing.version,
                });
            }
        }

        security.internal_id = internal_id;
        let mut index = self.index.write().unwrap();
        for ext in &security.external_ids {
            index.by_claim.insert(
                (ext.source.clone(), ext.id_type.clone(), ext.value.clone()),
                internal_id,
            );
        }
        drop(index);
        self.securities.insert(internal_id, security);
        Ok(internal_id)
    }

    fn allocate_id(&self) -> SecurityId {
        SecurityId(self.next_internal_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Reconciles a set of external-id claims against the existing index.
    /// - Zero existing claims resolve: record is new, caller mints an id.
    /// - All existing claims agree: reuse that internal id.
    /// - Claims disagree: prefer the id claimed by the highest-priority
    ///   source among the conflicting set; if priorities tie, suspend as
    ///   a conflict rather than guess (spec §4.2).
    fn reconcile(
        &self,
        claims: &[ExternalIdentifier],
    ) -> Result<Option<SecurityId>, ReferenceError> {
        let index = self.index.read().unwrap();
        let mut candidates: Vec<(String, SecurityId)> = Vec::new();
        for c in claims {
            let key = (c.source.clone(), c.id_type.clone(), c.value.clone());
            if let Some(id) = index.by_claim.get(&key) {
                candidates.push((c.source.clone(), *id));
            }
        }
        drop(index);

        if candidates.is_empty() {
            return Ok(None);
        }

        let distinct: std::collections::HashSet<SecurityId> =
            candidates.iter().map(|(_, id)| *id).collect();
        if distinct.len() == 1 {
            return Ok(Some(candidates[0].1));
        }

        // Rule (1): exact multi-identifier consensus outranks a lone
        // highest-priority source. Count distinct sources agreeing on each
        // candidate id; if exactly one id has >=2 sources behind it, that's
        // the resolution regardless of priority rank (spec §4.2).
        let mut by_id: std::collections::HashMap<SecurityId, std::collections::HashSet<&str>> =
            std::collections::HashMap::new();
        for (src, id) in &candidates {
            by_id.entry(*id).or_default().insert(src.as_str());
        }
        let consensus: Vec<SecurityId> = by_id
            .iter()
            .filter(|(_, sources)| sources.len() >= 2)
            .map(|(id, _)| *id)
            .collect();
        if consensus.len() == 1 {
            return Ok(Some(consensus[0]));
        }

        candidates.sort_by_key(|(src, _)| self.priority.rank(src));
        let best_rank = self.priority.rank(&candidates[0].0);
        let tied: Vec<SecurityId> = candidates
            .iter()
            .filter(|(src, _)| self.priority.rank(src) == best_rank)
            .map(|(_, id)| *id)
            .collect();
        let tied_distinct: std::collections::HashSet<SecurityId> = tied.into_iter().collect();
        if tied_distinct.len() == 1 {
            Ok(Some(*tied_distinct.iter().next().unwrap()))
        } else {
            Err(ReferenceError::Conflict(
                distinct.iter().map(|id| id.0).collect(),
            ))
        }
    }
}
