//! Action gate.
//!
//! Pure predicate over facts the services gather about the acting instance.
//! Checks run in a fixed order: chain of trust, restriction flag, then the
//! audit-log throttle.

use fediseer_common::{AppError, AppResult};
use fediseer_db::repositories::EdgeKind;

use crate::graph::ChainStatus;

/// A mutating trust-graph action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustAction {
    Guarantee,
    WithdrawGuarantee,
    AddEdge(EdgeKind),
    ModifyEdge(EdgeKind),
    RemoveEdge(EdgeKind),
    Rebut,
    RemoveRebuttal,
    Tag,
}

impl TrustAction {
    const fn requires_chain(self) -> bool {
        matches!(
            self,
            Self::Guarantee | Self::AddEdge(_) | Self::ModifyEdge(_) | Self::Rebut
        )
    }

    const fn blocked_by_restriction(self) -> bool {
        matches!(
            self,
            Self::Guarantee | Self::AddEdge(_) | Self::ModifyEdge(_) | Self::Rebut | Self::Tag
        )
    }

    const fn throttled(self) -> bool {
        !matches!(self, Self::Tag)
    }

    const fn verb(self) -> &'static str {
        match self {
            Self::Guarantee | Self::WithdrawGuarantee => "guarantee",
            Self::AddEdge(kind) | Self::ModifyEdge(kind) | Self::RemoveEdge(kind) => kind.verb(),
            Self::Rebut | Self::RemoveRebuttal => "rebut",
            Self::Tag => "tag",
        }
    }
}

/// What the gate needs to know about the actor.
#[derive(Debug, Clone)]
pub struct ActorFacts {
    pub domain: String,
    pub has_guarantor: bool,
    pub chain: ChainStatus,
    /// Domain of the chain breaker, when the chain is broken.
    pub breaker_domain: Option<String>,
    pub restricted: bool,
    /// Audit rows recorded by the actor inside the throttle window.
    pub recent_actions: u64,
}

/// Stateless gate configured with the throttle ceiling.
#[derive(Debug, Clone, Copy)]
pub struct ActionGate {
    max_actions: u64,
}

impl ActionGate {
    #[must_use]
    pub const fn new(max_actions: u64) -> Self {
        Self { max_actions }
    }

    /// Decide whether `facts.domain` may perform `action`.
    pub fn check(&self, action: TrustAction, facts: &ActorFacts) -> AppResult<()> {
        if action.requires_chain() {
            if !facts.has_guarantor {
                return Err(AppError::Forbidden(format!(
                    "Only guaranteed instances can {} others.",
                    action.verb()
                )));
            }
            if let ChainStatus::Broken { .. } = facts.chain {
                let at = facts.breaker_domain.as_deref().unwrap_or("an unknown instance");
                return Err(AppError::Forbidden(format!(
                    "The chain of trust for {} is broken at {at}. Only instances with an unbroken chain can {} others.",
                    facts.domain,
                    action.verb()
                )));
            }
        }

        if action.blocked_by_restriction() && facts.restricted {
            return Err(AppError::Forbidden(format!(
                "Restricted instances cannot {} others.",
                action.verb()
            )));
        }

        if action.throttled() {
            self.check_throttle(&facts.domain, facts.recent_actions)?;
        }

        Ok(())
    }

    /// Reject `domain` once its audit rows in the window exceed the ceiling.
    pub fn check_throttle(&self, domain: &str, recent_actions: u64) -> AppResult<()> {
        if recent_actions > self.max_actions {
            return Err(AppError::TooManyRequests(format!(
                "{domain} is performing too many actions. Please wait a minute."
            )));
        }
        Ok(())
    }

    /// Reject growth of an outgoing list past `max`.
    ///
    /// `resulting` is the size the list would have after the operation.
    pub fn check_list_size(kind: EdgeKind, resulting: u64, max: i32) -> AppResult<()> {
        let max = u64::try_from(max).unwrap_or(0);
        if resulting > max {
            return Err(AppError::BadRequest(format!(
                "You cannot have more than {max} {}s.",
                kind.noun()
            )));
        }
        Ok(())
    }

    /// Reject a new edge that contradicts an existing opposite one.
    pub fn check_mutual_exclusion(kind: EdgeKind, existing: Option<EdgeKind>) -> AppResult<()> {
        match existing {
            Some(other) => Err(AppError::BadRequest(format!(
                "You cannot {} an instance you have a {} against. Withdraw the {} first.",
                kind.verb(),
                other.noun(),
                other.noun()
            ))),
            None => Ok(()),
        }
    }
}
