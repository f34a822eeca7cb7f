//! Batch upsert planning.
//!
//! The planner decides what a batch request does without touching the
//! database. The service resolves target domains first, then applies the
//! returned [`BatchPlan`] inside one transaction.

use std::collections::{HashMap, HashSet};

use fediseer_db::repositories::TrustEdge;
use serde::{Deserialize, Serialize};

/// One requested edge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchEntry {
    pub domain: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub evidence: Option<String>,
}

/// Why an entry was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Duplicate,
    SelfTarget,
    Unregistered,
    Conflicting,
    Unguaranteed,
    Unchanged,
    Exists,
}

/// Everything the planner needs about the source's current state.
#[derive(Debug)]
pub struct BatchContext<'a> {
    pub source_id: i32,
    pub source_domain: &'a str,
    /// Current edges of this kind given by the source.
    pub existing: &'a [TrustEdge],
    /// Resolved target ids, keyed by normalized domain.
    pub targets: &'a HashMap<String, i32>,
    /// Targets the source holds an opposite-polarity edge on.
    pub conflicting: &'a HashSet<i32>,
    /// Targets that may not receive this kind of edge (endorsement of an
    /// unguaranteed instance).
    pub ineligible: &'a HashSet<i32>,
    pub delete: bool,
    pub overwrite: bool,
}

/// A planned insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEdge {
    pub target_id: i32,
    pub reason: Option<String>,
    pub evidence: Option<String>,
}

/// A planned payload change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    pub edge_id: i32,
    pub reason: Option<String>,
    pub evidence: Option<String>,
}

/// The outcome of planning a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    pub create: Vec<PlannedEdge>,
    pub modify: Vec<PlannedUpdate>,
    pub delete: Vec<i32>,
    pub skipped: Vec<(String, SkipReason)>,
    existing_count: usize,
}

impl BatchPlan {
    /// Edge count after the plan is applied.
    #[must_use]
    pub fn resulting_count(&self) -> u64 {
        (self.existing_count + self.create.len()).saturating_sub(self.delete.len()) as u64
    }

    /// Whether applying the plan changes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.create.is_empty() && self.modify.is_empty() && self.delete.is_empty()
    }
}

/// Counts returned to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
}

impl From<&BatchPlan> for BatchOutcome {
    fn from(plan: &BatchPlan) -> Self {
        Self {
            added: plan.create.len(),
            modified: plan.modify.len(),
            deleted: plan.delete.len(),
        }
    }
}

/// Plan a batch. Entry domains must already be normalized.
#[must_use]
pub fn plan(ctx: &BatchContext<'_>, entries: Vec<BatchEntry>) -> BatchPlan {
    let by_target: HashMap<i32, &TrustEdge> =
        ctx.existing.iter().map(|e| (e.target_id, e)).collect();
    let mut seen = HashSet::new();
    let mut listed = HashSet::new();
    let mut plan = BatchPlan {
        existing_count: ctx.existing.len(),
        ..BatchPlan::default()
    };

    for entry in entries {
        if !seen.insert(entry.domain.clone()) {
            plan.skipped.push((entry.domain, SkipReason::Duplicate));
            continue;
        }
        if entry.domain == ctx.source_domain {
            plan.skipped.push((entry.domain, SkipReason::SelfTarget));
            continue;
        }
        let Some(&target_id) = ctx.targets.get(&entry.domain) else {
            plan.skipped.push((entry.domain, SkipReason::Unregistered));
            continue;
        };
        listed.insert(target_id);

        let skip = if target_id == ctx.source_id {
            Some(SkipReason::SelfTarget)
        } else if ctx.conflicting.contains(&target_id) {
            Some(SkipReason::Conflicting)
        } else if ctx.ineligible.contains(&target_id) {
            Some(SkipReason::Unguaranteed)
        } else {
            None
        };
        if let Some(reason) = skip {
            plan.skipped.push((entry.domain, reason));
            continue;
        }

        match by_target.get(&target_id) {
            Some(edge) if edge.same_payload(entry.reason.as_deref(), entry.evidence.as_deref()) => {
                plan.skipped.push((entry.domain, SkipReason::Unchanged));
            }
            Some(_) if !ctx.overwrite => {
                plan.skipped.push((entry.domain, SkipReason::Exists));
            }
            Some(edge) => plan.modify.push(PlannedUpdate {
                edge_id: edge.id,
                reason: entry.reason,
                evidence: entry.evidence,
            }),
            None => plan.create.push(PlannedEdge {
                target_id,
                reason: entry.reason,
                evidence: entry.evidence,
            }),
        }
    }

    if ctx.delete {
        plan.delete = ctx
            .existing
            .iter()
            .filter(|e| !listed.contains(&e.target_id))
            .map(|e| e.id)
            .collect();
    }

    plan
}
