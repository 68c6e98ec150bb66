//! Pre-built policies for common access postures.
//!
//! These cover the patterns most deployments start from: time-of-day
//! gating, a clearance floor for classified material, and change-control
//! obligations for privileged actions. Each constructor returns a plain
//! [`Policy`]; callers add them to a snapshot like any hand-written one.

use chrono::{NaiveTime, Weekday};

use palisade_types::ActionId;

use crate::attributes::AttributeValue;
use crate::policy::{AttributeRef, Effect, LogicalLink, Operator, Policy, Rule, TimeWindow};

/// Context attribute carrying the request timestamp.
pub const CURRENT_TIME: &str = "currentTime";
/// Subject attribute carrying the numeric clearance level.
pub const CLEARANCE_LEVEL: &str = "clearanceLevel";
/// Resource attribute carrying the classification label.
pub const CLASSIFICATION: &str = "classification";

fn hm(hour: u32, minute: u32) -> NaiveTime {
    // Both components are compile-time constants in this module.
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid wall-clock time")
}

/// Allows the given actions during business hours (09:00-17:00 UTC,
/// weekdays), keyed on the `currentTime` context attribute.
pub fn business_hours_access(
    id: &str,
    actions: impl IntoIterator<Item = ActionId>,
) -> Policy {
    let mut policy = Policy::new(id, Effect::Allow)
        .with_condition(
            Rule::new(
                AttributeRef::context(CURRENT_TIME),
                Operator::TimeBetween(TimeWindow::daily(hm(9, 0), hm(17, 0))),
            )
            .with_link(LogicalLink::And),
        )
        .with_condition(Rule::new(
            AttributeRef::context(CURRENT_TIME),
            Operator::DayOfWeek(vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ]),
        ));
    for action in actions {
        policy = policy.with_action(action);
    }
    policy
}

/// Denies the given actions outside business hours: overnight
/// (17:00-09:00 UTC, wrapping midnight) or on weekends.
pub fn after_hours_lockout(
    id: &str,
    actions: impl IntoIterator<Item = ActionId>,
) -> Policy {
    let mut policy = Policy::new(id, Effect::Deny)
        .with_condition(
            Rule::new(
                AttributeRef::context(CURRENT_TIME),
                Operator::TimeBetween(TimeWindow::daily(hm(17, 0), hm(9, 0))),
            )
            .with_link(LogicalLink::Or),
        )
        .with_condition(Rule::new(
            AttributeRef::context(CURRENT_TIME),
            Operator::DayOfWeek(vec![Weekday::Sat, Weekday::Sun]),
        ));
    for action in actions {
        policy = policy.with_action(action);
    }
    policy
}

/// Denies the given actions on resources carrying one of the listed
/// classifications when the subject's clearance is below `floor`.
///
/// A subject with no resolved `clearanceLevel` escapes this deny (the
/// guard fails closed on the missing attribute) but is not thereby
/// allowed anything; pair with an explicit allow policy for cleared
/// subjects.
pub fn clearance_floor(
    id: &str,
    actions: impl IntoIterator<Item = ActionId>,
    classifications: impl IntoIterator<Item = AttributeValue>,
    floor: f64,
) -> Policy {
    let mut policy = Policy::new(id, Effect::Deny)
        .with_condition(
            Rule::new(
                AttributeRef::resource(CLASSIFICATION),
                Operator::In(classifications.into_iter().collect()),
            )
            .with_link(LogicalLink::And),
        )
        .with_condition(Rule::new(
            AttributeRef::subject(CLEARANCE_LEVEL),
            Operator::NotIn(clearance_values_at_or_above(floor)),
        ));
    for action in actions {
        policy = policy.with_action(action);
    }
    policy
}

/// Clearance levels are small integers; enumerate the acceptable ones so
/// the guard also catches subjects with no resolved clearance at all.
fn clearance_values_at_or_above(floor: f64) -> Vec<AttributeValue> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let floor = floor.max(0.0).round() as u32;
    (floor..=10).map(|l| AttributeValue::Number(f64::from(l))).collect()
}

/// Allows the given actions but attaches approval and ticket obligations
/// for out-of-band change control.
pub fn change_control(
    id: &str,
    actions: impl IntoIterator<Item = ActionId>,
    approval_levels: impl IntoIterator<Item = String>,
    ticket_type: &str,
) -> Policy {
    let mut policy = Policy::new(id, Effect::Allow)
        .with_condition(
            Rule::new(
                AttributeRef::subject(CLEARANCE_LEVEL),
                Operator::RequiresApproval {
                    levels: approval_levels.into_iter().collect(),
                },
            )
            .with_link(LogicalLink::And),
        )
        .with_condition(Rule::new(
            AttributeRef::subject(CLEARANCE_LEVEL),
            Operator::RequiresTicket {
                ticket_type: ticket_type.to_string(),
            },
        ));
    for action in actions {
        policy = policy.with_action(action);
    }
    policy
}

// ============================================================================
// Tests
// ============================================================================
