//! Policy matching: does a policy's action set and subject/object specs
//! apply to a concrete request?
//!
//! Matching is independent of the policy's own condition list; a matching
//! policy is a *candidate*, and only condition evaluation decides whether
//! it becomes *applicable*.

use crate::attributes::AttributeEnvironment;
use crate::evaluator::{TraceEntry, evaluate_rules};
use crate::policy::{EntitySpec, Policy};
use crate::request::EvaluationRequest;

/// Outcome of the candidate test, with trace entries for any
/// attribute-based spec rules that were evaluated along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub candidate: bool,
    pub trace: Vec<TraceEntry>,
}

impl MatchOutcome {
    fn no_match(trace: Vec<TraceEntry>) -> Self {
        Self {
            candidate: false,
            trace,
        }
    }
}

/// Candidate test: action membership, then subject spec, then object spec.
/// All three must hold independently.
pub fn is_candidate(
    policy: &Policy,
    request: &EvaluationRequest,
    env: &AttributeEnvironment,
) -> MatchOutcome {
    if !policy.actions.contains(&request.action) {
        return MatchOutcome::no_match(Vec::new());
    }

    let mut trace = Vec::new();

    let subject_matches = match &policy.subject {
        EntitySpec::Specific(id) => request.subject.id.as_ref() == Some(id),
        EntitySpec::AttributeBased(rules) => {
            let (matched, spec_trace) = evaluate_rules(rules, env);
            trace.extend(spec_trace);
            matched
        }
    };
    if !subject_matches {
        return MatchOutcome::no_match(trace);
    }

    let object_matches = match &policy.object {
        EntitySpec::Specific(id) => request.object.id.as_ref() == Some(id),
        EntitySpec::AttributeBased(rules) => {
            let (matched, spec_trace) = evaluate_rules(rules, env);
            trace.extend(spec_trace);
            matched
        }
    };
    if !object_matches {
        return MatchOutcome::no_match(trace);
    }

    MatchOutcome {
        candidate: true,
        trace,
    }
}

// ============================================================================
// Tests
// ============================================================================
