//! Locate request lifecycle (data model §3 "LocateRequest", component C6).
//!
//! States form a strict FSM; `transition` is the single place allowed to
//! move a locate between states so the allowed-edges table stays in one
//! spot (grounded on the teacher's order-state-machine style in
//! `messages.rs`'s `OrderStatus` transitions).

use crate::core_types::{ClientId, LocateId, SecurityId};
use crate::error::LocateError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocateState {
    Received,
    Validating,
    PendingReview,
    AutoApproved,
    AutoRejected,
    UnderReview,
    Approved,
    Rejected,
    Confirmed,
    Failed,
    Expired,
}

impl LocateState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LocateState::Confirmed
                | LocateState::Rejected
                | LocateState::Expired
                | LocateState::AutoRejected
                | LocateState::Failed
        )
    }

    fn allowed_next(self) -> &'static [LocateState] {
        use LocateState::*;
        match self {
            Received => &[Validating],
            Validating => &[PendingReview, AutoApproved, AutoRejected],
            PendingReview => &[UnderReview],
            AutoApproved => &[Approved],
            UnderReview => &[Approved, Rejected],
            Approved => &[Confirmed, Failed, Expired],
            AutoRejected | Rejected | Confirmed | Failed | Expired => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocateRequest {
    pub id: LocateId,
    pub client: ClientId,
    pub security: SecurityId,
    pub requested_qty: u64,
    /// Quantity actually approved; may be decremented intraday toward
    /// executions but never raised above the original request.
    pub approved_qty: u64,
    /// Quantity currently held against the locate-availability pool. May be
    /// below `approved_qty` (the pool reservation shrinks toward executed
    /// quantity intraday, while `approved_qty` stays the fixed grant
    /// ceiling) — spec §4.4 category 5, §4.6 decrement mechanic.
    pub decrement_qty: u64,
    pub state: LocateState,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub rule_id: Option<crate::core_types::RuleId>,
}

impl LocateRequest {
    pub fn transition(&mut self, next: LocateState) -> Result<(), LocateError> {
        if self.state.allowed_next().contains(&next) {
            self.state = next;
            Ok(())
        } else {
            Err(LocateError::InvalidTransition(self.id))
        }
    }

    /// Intraday adjustment: raise toward `executed_qty` (never above the
    /// original request), or shrink toward executions as the book nears
    /// close, subject to never going below `floor` (a rule-supplied
    /// minimum, e.g. already-executed quantity).
    pub fn adjust_approved_qty(&mut self, target: u64, floor: u64) {
        let target = target.min(self.requested_qty);
        self.approved_qty = target.max(floor);
    }

    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> LocateRequest {
        LocateRequest {
            id: LocateId(1),
            client: ClientId(1),
            security: SecurityId(1),
            requested_qty: 1_000,
            approved_qty: 0,
            decrement_qty: 0,
            state: LocateState::Received,
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(8),
            rule_id: None,
        }
    }

    #[test]
    fn valid_transition_chain_to_auto_approved() {
        let mut loc = sample();
        loc.transition(LocateState::Validating).unwrap();
        loc.transition(LocateState::AutoApproved).unwrap();
        loc.transition(LocateState::Approved).unwrap();
        loc.transition(LocateState::Confirmed).unwrap();
        assert!(loc.state.is_terminal());
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut loc = sample();
        let err = loc.transition(LocateState::Confirmed).unwrap_err();
        assert_eq!(err, LocateError::InvalidTransition(LocateId(1)));
    }

    #[test]
    fn adjust_approved_qty_never_exceeds_request_or_drops_below_floor() {
        let mut loc = sample();
        loc.approved_qty = 1_000;
        loc.adjust_approved_qty(1_500, 0);
        assert_eq!(loc.approved_qty, 1_000);
        loc.adjust_approved_qty(200, 400);
        assert_eq!(loc.approved_qty, 400);
    }

    #[test]
    fn terminal_states_reject_any_transition() {
        let mut loc = sample();
        loc.state = LocateState::Rejected;
        assert!(loc.transition(LocateState::Approved).is_err());
    }
}
