//! Rule evaluation and condition combination.
//!
//! One rule evaluates against the request's attribute environment to a
//! boolean plus a trace entry; a rule list folds strictly left to right
//! using each rule's link to the next. Anything that goes wrong inside a
//! rule (missing attribute, malformed operand) fails that rule alone and
//! is recorded on its trace entry; evaluation of other rules and policies
//! always continues.

use std::cmp::Ordering;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeEnvironment, AttributeValue};
use crate::policy::{LogicalLink, Operator, Rule};

// ============================================================================
// Obligations
// ============================================================================

/// A side-obligation a marker rule attaches for out-of-band enforcement.
///
/// The engine only reports obligations; enforcing them (collecting
/// approvals, verifying a ticket) is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Obligation {
    /// Approvals required at the named levels before the action proceeds.
    Approval { levels: Vec<String> },
    /// A ticket of the named type must reference this action.
    Ticket { ticket_type: String },
}

// ============================================================================
// Trace
// ============================================================================

/// Why a rule came out the way it did, beyond its boolean result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceNote {
    /// The referenced attribute was absent from the environment.
    UnresolvedAttribute,
    /// The rule itself is malformed (wrong operand kind, empty window).
    InvalidRule { detail: String },
    /// Marker rule attached an obligation.
    Obligation(Obligation),
}

/// Trace record for one evaluated rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Rendered field reference, e.g. `subject.role`.
    pub field: String,
    /// Wire name of the operator, e.g. `greater_than`.
    pub operator: String,
    /// Whether the rule was satisfied.
    pub satisfied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<TraceNote>,
}

/// Result of evaluating one rule: the verdict, the link it carries to the
/// next rule, and the trace record.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub satisfied: bool,
    pub link: Option<LogicalLink>,
    pub trace: TraceEntry,
}

// ============================================================================
// Rule Evaluation
// ============================================================================

/// Evaluates a single rule against the environment.
///
/// Never fails: every anomaly maps to `satisfied = false` with a note on
/// the trace entry (marker operators excepted, which are always
/// satisfied and only attach their obligation).
pub fn evaluate_rule(rule: &Rule, env: &AttributeEnvironment) -> RuleOutcome {
    let value = env.get(rule.field.role, &rule.field.name);
    let (satisfied, note) = apply_operator(&rule.operator, value);

    RuleOutcome {
        satisfied,
        link: rule.link,
        trace: TraceEntry {
            field: rule.field.to_string(),
            operator: rule.operator.name().to_string(),
            satisfied,
            note,
        },
    }
}

/// The operator semantics table.
///
/// Strings compare case-sensitively, numbers with IEEE double semantics,
/// dates as instants.
fn apply_operator(
    operator: &Operator,
    value: Option<&AttributeValue>,
) -> (bool, Option<TraceNote>) {
    match operator {
        Operator::Equals(expected) => match value {
            Some(v) => (v == expected, None),
            None => unresolved(),
        },
        Operator::NotEquals(expected) => match value {
            Some(v) => (v != expected, None),
            None => unresolved(),
        },

        Operator::Contains(needle) | Operator::NotContains(needle) => {
            if !needle.is_scalar() {
                return invalid(format!(
                    "{} operand must be a scalar, got {}",
                    operator.name(),
                    needle.type_name()
                ));
            }
            let negate = matches!(operator, Operator::NotContains(_));
            match value {
                Some(AttributeValue::List(items)) => (items.contains(needle) != negate, None),
                // Non-array attribute never contains (nor not-contains) anything.
                Some(_) => (false, None),
                None => unresolved(),
            }
        }

        Operator::GreaterThan(bound) | Operator::LessThan(bound) => {
            if bound.as_number().is_none() && bound.as_timestamp().is_none() {
                return invalid(format!(
                    "{} operand must be a number or timestamp, got {}",
                    operator.name(),
                    bound.type_name()
                ));
            }
            let wanted = if matches!(operator, Operator::GreaterThan(_)) {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            match value {
                Some(v) => (v.compare(bound) == Some(wanted), None),
                None => unresolved(),
            }
        }

        Operator::In(set) | Operator::NotIn(set) => {
            let negate = matches!(operator, Operator::NotIn(_));
            match value {
                Some(v) if v.is_scalar() => (set.contains(v) != negate, None),
                // Membership is defined for scalars only.
                Some(_) => (false, None),
                None => unresolved(),
            }
        }

        Operator::TimeBetween(window) => match value {
            Some(AttributeValue::Timestamp(ts)) => match window.contains(*ts) {
                Some(inside) => (inside, None),
                None => invalid("time window end does not follow its start".to_string()),
            },
            Some(_) => (false, None),
            None => unresolved(),
        },

        Operator::DayOfWeek(days) => match value {
            Some(AttributeValue::Timestamp(ts)) => (days.contains(&ts.weekday()), None),
            Some(_) => (false, None),
            None => unresolved(),
        },

        // Markers: always satisfied, obligation goes on the trace.
        Operator::RequiresApproval { levels } => (
            true,
            Some(TraceNote::Obligation(Obligation::Approval {
                levels: levels.clone(),
            })),
        ),
        Operator::RequiresTicket { ticket_type } => (
            true,
            Some(TraceNote::Obligation(Obligation::Ticket {
                ticket_type: ticket_type.clone(),
            })),
        ),
    }
}

fn unresolved() -> (bool, Option<TraceNote>) {
    (false, Some(TraceNote::UnresolvedAttribute))
}

fn invalid(detail: String) -> (bool, Option<TraceNote>) {
    (false, Some(TraceNote::InvalidRule { detail }))
}

// ============================================================================
// Condition Combinator
// ============================================================================

/// Folds rule outcomes strictly left to right.
///
/// The accumulator starts at the first rule's result; each subsequent
/// result is combined using the link attached to the rule *before* it.
/// There is no precedence and no parenthesization:
/// `[A(OR), B(AND), C]` combines as `((A OR B) AND C)`. An empty list is
/// true. A missing link on a non-final rule combines as `And`.
pub fn combine(outcomes: &[RuleOutcome]) -> bool {
    let Some(first) = outcomes.first() else {
        return true;
    };

    let mut acc = first.satisfied;
    for window in outcomes.windows(2) {
        let link = window[0].link.unwrap_or(LogicalLink::And);
        acc = match link {
            LogicalLink::And => acc && window[1].satisfied,
            LogicalLink::Or => acc || window[1].satisfied,
        };
    }
    acc
}

/// Evaluates a whole rule list: every rule is evaluated (so the trace is
/// complete), then the outcomes fold per [`combine`].
pub fn evaluate_rules(rules: &[Rule], env: &AttributeEnvironment) -> (bool, Vec<TraceEntry>) {
    let outcomes: Vec<RuleOutcome> = rules.iter().map(|r| evaluate_rule(r, env)).collect();
    let verdict = combine(&outcomes);
    (verdict, outcomes.into_iter().map(|o| o.trace).collect())
}

// ============================================================================
// Tests
// ============================================================================
