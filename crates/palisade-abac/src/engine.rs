//! The decision engine.
//!
//! Orchestrates attribute resolution, policy matching, and condition
//! combination over every active policy in a snapshot, then resolves
//! conflicts across the applicable set with deny-overrides.
//!
//! Evaluation is a pure, synchronous, single-pass computation: it performs
//! no I/O, holds no locks, and keeps no state between calls. Callers may
//! run any number of evaluations in parallel against a shared snapshot.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use palisade_types::{PolicyId, Scope};

use crate::attributes::{
    AttributeEnvironment, AttributeProvider, EntityRole, NoStoredAttributes, ResolutionNote,
    resolve,
};
use crate::evaluator::{Obligation, TraceEntry, TraceNote, evaluate_rules};
use crate::matcher::is_candidate;
use crate::policy::{Effect, PolicySnapshot};
use crate::request::EvaluationRequest;
use crate::store::{PolicyStore, Result as StoreResult};

// ============================================================================
// Decision
// ============================================================================

/// The final decision for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Access granted.
    Allow,
    /// Access denied by an applicable policy.
    Deny,
    /// No applicable policy; treat as deny unless the caller has a
    /// fallback authorization scheme.
    NotApplicable,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

// ============================================================================
// Evaluation Result
// ============================================================================

/// One applicable policy with its evaluation trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedPolicy {
    pub policy_id: PolicyId,
    pub effect: Effect,
    /// Every rule evaluated for this policy: subject/object spec rules
    /// followed by condition rules, in evaluation order.
    pub trace: Vec<TraceEntry>,
}

/// The explainable outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub decision: Decision,
    /// Every applicable policy in snapshot order, not only the deciding one.
    pub applied: Vec<AppliedPolicy>,
    /// Obligations attached by marker rules of applicable policies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<Obligation>,
    /// Attribute values dropped during resolution (constraint violations).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolution_notes: Vec<ResolutionNote>,
    /// Human-readable explanation citing the deciding policy.
    pub reason: String,
}

// ============================================================================
// Public API
// ============================================================================

/// Evaluates a request against a snapshot, with every attribute inlined
/// on the request.
pub fn decide(request: &EvaluationRequest, snapshot: &PolicySnapshot) -> EvaluationResult {
    decide_with_provider(request, snapshot, &NoStoredAttributes)
}

/// Evaluates a request against a snapshot, looking up stored attributes
/// for referenced identities through `provider`.
///
/// # Postcondition
///
/// Always returns exactly one of allow / deny / not-applicable; rule- and
/// policy-level anomalies are absorbed into the trace, never raised.
pub fn decide_with_provider(
    request: &EvaluationRequest,
    snapshot: &PolicySnapshot,
    provider: &dyn AttributeProvider,
) -> EvaluationResult {
    let (env, resolution_notes) = build_environment(request, snapshot, provider);

    let mut applied = Vec::new();
    let mut obligations = Vec::new();

    for policy in snapshot.active_policies() {
        let matched = is_candidate(policy, request, &env);
        if !matched.candidate {
            continue;
        }
        debug!(policy = %policy.id, "policy is a candidate");

        let (applicable, condition_trace) = evaluate_rules(&policy.conditions, &env);
        let mut trace = matched.trace;
        trace.extend(condition_trace);

        if !applicable {
            debug!(policy = %policy.id, "candidate conditions not satisfied");
            continue;
        }

        collect_obligations(&trace, &mut obligations);
        applied.push(AppliedPolicy {
            policy_id: policy.id.clone(),
            effect: policy.effect,
            trace,
        });
    }

    // Deny-overrides: the first applicable deny wins; otherwise the first
    // applicable allow; otherwise nothing applied.
    let deciding_deny = applied.iter().find(|p| p.effect == Effect::Deny);
    let (decision, reason) = if let Some(denying) = deciding_deny {
        (
            Decision::Deny,
            format!("denied by policy '{}'", denying.policy_id),
        )
    } else if let Some(allowing) = applied.first() {
        (
            Decision::Allow,
            format!("allowed by policy '{}'", allowing.policy_id),
        )
    } else {
        (Decision::NotApplicable, "no matching policy".to_string())
    };

    match decision {
        Decision::Allow => info!(
            action = %request.action,
            snapshot = %snapshot.version(),
            reason = %reason,
            "access allowed"
        ),
        Decision::Deny => warn!(
            action = %request.action,
            snapshot = %snapshot.version(),
            reason = %reason,
            "access denied"
        ),
        Decision::NotApplicable => debug!(
            action = %request.action,
            snapshot = %snapshot.version(),
            "no applicable policy"
        ),
    }

    EvaluationResult {
        decision,
        applied,
        obligations,
        resolution_notes,
        reason,
    }
}

/// Acquires a snapshot from `store` and evaluates against it.
///
/// Snapshot acquisition is the one terminal failure: on error no decision
/// exists and the caller must fail closed (treat as deny).
pub fn decide_via_store(
    store: &dyn PolicyStore,
    scope: &Scope,
    request: &EvaluationRequest,
) -> StoreResult<EvaluationResult> {
    let snapshot = store.snapshot(scope)?;
    Ok(decide(request, &snapshot))
}

// ============================================================================
// Environment Assembly
// ============================================================================

/// Builds the full attribute environment for one request: subject,
/// resource, action, and context slices.
fn build_environment(
    request: &EvaluationRequest,
    snapshot: &PolicySnapshot,
    provider: &dyn AttributeProvider,
) -> (AttributeEnvironment, Vec<ResolutionNote>) {
    let registry = snapshot.definitions();
    let mut env = AttributeEnvironment::new();
    let mut notes = Vec::new();

    let empty = crate::policy::AttributeMap::new();
    let slices = [
        (
            EntityRole::Subject,
            request.subject.id.as_ref().map(|id| id.as_str()),
            &request.subject.attributes,
        ),
        (
            EntityRole::Resource,
            request.object.id.as_ref().map(|id| id.as_str()),
            &request.object.attributes,
        ),
        (EntityRole::Action, Some(request.action.as_str()), &empty),
        (EntityRole::Context, None, &request.context),
    ];

    for (role, id, inline) in slices {
        let slice = resolve(role, id, inline, registry, provider);
        for (name, value) in slice.values {
            env.insert(role, name, value);
        }
        notes.extend(slice.notes);
    }

    (env, notes)
}

/// Pulls obligations out of a policy's trace entries.
fn collect_obligations(trace: &[TraceEntry], obligations: &mut Vec<Obligation>) {
    for entry in trace {
        if let Some(TraceNote::Obligation(obligation)) = &entry.note {
            obligations.push(obligation.clone());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
