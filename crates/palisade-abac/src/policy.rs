//! Policy definitions: effects, rules, operators, and snapshots.
//!
//! A policy names the actions it governs, who it applies to (subject and
//! object specs), and an ordered condition list with explicit logical
//! chaining. The engine only ever reads policies out of an immutable
//! [`PolicySnapshot`]; creation and editing belong to the management layer.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use palisade_types::{ActionId, PolicyId, ResourceId, SnapshotVersion, SubjectId};

use crate::attributes::{
    AttributeDefinition, AttributeValue, DefinitionRegistry, EntityRole, UnknownEntityRole,
};

// ============================================================================
// Effect
// ============================================================================

/// The effect of a policy: allow or deny access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Grant access.
    Allow,
    /// Deny access (overrides any allow).
    Deny,
}

impl Default for Effect {
    /// Defaults to `Deny` (safe default: deny unless explicitly allowed).
    fn default() -> Self {
        Self::Deny
    }
}

impl Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

// ============================================================================
// Logical Link
// ============================================================================

/// How a rule combines with the rule that follows it.
///
/// The last rule in a list carries no link. There is no operator
/// precedence: rule lists fold strictly left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalLink {
    And,
    Or,
}

// ============================================================================
// Attribute Reference
// ============================================================================

/// A rule's target attribute: role plus attribute name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeRef {
    pub role: EntityRole,
    pub name: String,
}

impl AttributeRef {
    pub fn new(role: EntityRole, name: impl Into<String>) -> Self {
        Self {
            role,
            name: name.into(),
        }
    }

    pub fn subject(name: impl Into<String>) -> Self {
        Self::new(EntityRole::Subject, name)
    }

    pub fn resource(name: impl Into<String>) -> Self {
        Self::new(EntityRole::Resource, name)
    }

    pub fn context(name: impl Into<String>) -> Self {
        Self::new(EntityRole::Context, name)
    }
}

impl Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.role, self.name)
    }
}

/// Error produced when a dotted attribute reference cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidAttributeRef {
    #[error("attribute reference must be '<role>.<name>', got {0:?}")]
    MissingDot(String),
    #[error(transparent)]
    UnknownRole(#[from] UnknownEntityRole),
}

impl FromStr for AttributeRef {
    type Err = InvalidAttributeRef;

    /// Parses the `"subject.role"` form used at the request boundary.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (role, name) = s
            .split_once('.')
            .ok_or_else(|| InvalidAttributeRef::MissingDot(s.to_string()))?;
        Ok(Self::new(role.parse::<EntityRole>()?, name))
    }
}

// ============================================================================
// Time Window
// ============================================================================

/// A window of time a `TimeBetween` rule tests against.
///
/// Both forms are inclusive of the start and exclusive of the end.
/// Daily windows are interpreted in UTC and may wrap midnight
/// (`22:00`–`06:00` covers the complement interval).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    /// Recurring daily window between two wall-clock times.
    Daily { start: NaiveTime, end: NaiveTime },
    /// One-off window between two absolute instants.
    Absolute {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl TimeWindow {
    pub fn daily(start: NaiveTime, end: NaiveTime) -> Self {
        Self::Daily { start, end }
    }

    pub fn absolute(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::Absolute { start, end }
    }

    /// Whether the instant falls inside `[start, end)`.
    ///
    /// Returns `None` for a malformed window (an absolute window whose end
    /// does not follow its start); the evaluator turns that into an
    /// invalid-rule trace note rather than an error.
    pub fn contains(&self, ts: DateTime<Utc>) -> Option<bool> {
        match self {
            Self::Daily { start, end } => {
                let t = ts.time();
                if start <= end {
                    Some(*start <= t && t < *end)
                } else {
                    // Wraps midnight.
                    Some(t >= *start || t < *end)
                }
            }
            Self::Absolute { start, end } => {
                if end <= start {
                    return None;
                }
                Some(*start <= ts && ts < *end)
            }
        }
    }
}

// ============================================================================
// Operator
// ============================================================================

/// The fixed rule operator set.
///
/// Each operator carries its own operand type, so a loaded snapshot can
/// never hold an operand shape the operator does not understand; the
/// remaining malformed cases (wrong operand *kind*, empty windows) fail
/// that one rule with an invalid-rule trace note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Exact value equality.
    Equals(AttributeValue),
    /// Exact value inequality.
    NotEquals(AttributeValue),
    /// Array attribute includes the scalar operand.
    Contains(AttributeValue),
    /// Array attribute excludes the scalar operand.
    NotContains(AttributeValue),
    /// Strict numeric or date comparison.
    GreaterThan(AttributeValue),
    /// Strict numeric or date comparison.
    LessThan(AttributeValue),
    /// Scalar attribute is a member of the operand set.
    In(Vec<AttributeValue>),
    /// Scalar attribute is not a member of the operand set.
    NotIn(Vec<AttributeValue>),
    /// Context timestamp falls within the window.
    TimeBetween(TimeWindow),
    /// Context timestamp's weekday is in the operand set.
    DayOfWeek(Vec<Weekday>),
    /// Always satisfied; attaches an approval obligation to the trace.
    RequiresApproval { levels: Vec<String> },
    /// Always satisfied; attaches a ticket obligation to the trace.
    RequiresTicket { ticket_type: String },
}

impl Operator {
    /// Wire name of the operator, used in traces.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Equals(_) => "equals",
            Self::NotEquals(_) => "not_equals",
            Self::Contains(_) => "contains",
            Self::NotContains(_) => "not_contains",
            Self::GreaterThan(_) => "greater_than",
            Self::LessThan(_) => "less_than",
            Self::In(_) => "in",
            Self::NotIn(_) => "not_in",
            Self::TimeBetween(_) => "time_between",
            Self::DayOfWeek(_) => "day_of_week",
            Self::RequiresApproval { .. } => "requires_approval",
            Self::RequiresTicket { .. } => "requires_ticket",
        }
    }
}

// ============================================================================
// Rule
// ============================================================================

/// A single condition rule.
///
/// `link` describes how this rule combines with the *next* rule in its
/// list; the final rule carries none. A missing link on a non-final rule
/// combines as `And`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub field: AttributeRef,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LogicalLink>,
}

impl Rule {
    pub fn new(field: AttributeRef, operator: Operator) -> Self {
        Self {
            field,
            operator,
            link: None,
        }
    }

    /// Sets the logical link to the next rule.
    pub fn with_link(mut self, link: LogicalLink) -> Self {
        self.link = Some(link);
        self
    }
}

// ============================================================================
// Entity Spec
// ============================================================================

/// Who a policy applies to: one concrete identity, or anyone matching a
/// rule list evaluated against that entity's attributes.
///
/// `AttributeBased` with an empty rule list matches every entity (an
/// empty condition list combines to true).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySpec<Id> {
    /// Exactly this identity.
    Specific(Id),
    /// Any entity whose attributes satisfy the rules.
    AttributeBased(Vec<Rule>),
}

impl<Id> EntitySpec<Id> {
    /// Spec matching every entity.
    pub fn any() -> Self {
        Self::AttributeBased(Vec::new())
    }
}

// ============================================================================
// Policy
// ============================================================================

/// An access control policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub effect: Effect,
    /// Who the policy applies to.
    pub subject: EntitySpec<SubjectId>,
    /// Which resources the policy applies to.
    pub object: EntitySpec<ResourceId>,
    /// Actions the policy governs.
    pub actions: BTreeSet<ActionId>,
    /// Conditions evaluated in addition to subject/object match.
    pub conditions: Vec<Rule>,
    /// Inactive policies are never candidates.
    pub active: bool,
}

impl Policy {
    /// Creates a policy applying to every subject and object, governing no
    /// actions yet.
    pub fn new(id: impl Into<PolicyId>, effect: Effect) -> Self {
        Self {
            id: id.into(),
            effect,
            subject: EntitySpec::any(),
            object: EntitySpec::any(),
            actions: BTreeSet::new(),
            conditions: Vec::new(),
            active: true,
        }
    }

    /// Adds an action to the governed set (builder pattern).
    pub fn with_action(mut self, action: impl Into<ActionId>) -> Self {
        self.actions.insert(action.into());
        self
    }

    /// Sets the subject spec.
    pub fn with_subject(mut self, spec: EntitySpec<SubjectId>) -> Self {
        self.subject = spec;
        self
    }

    /// Sets the object spec.
    pub fn with_object(mut self, spec: EntitySpec<ResourceId>) -> Self {
        self.object = spec;
        self
    }

    /// Appends a condition rule.
    pub fn with_condition(mut self, rule: Rule) -> Self {
        self.conditions.push(rule);
        self
    }

    /// Marks the policy inactive.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

// ============================================================================
// Policy Snapshot
// ============================================================================

/// An immutable, versioned view of policies and attribute definitions.
///
/// Every evaluation uses exactly one snapshot end to end. The surrounding
/// store swaps whole snapshots atomically; nothing inside one is ever
/// mutated after [`PolicySnapshotBuilder::build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    version: SnapshotVersion,
    policies: Vec<Policy>,
    definitions: DefinitionRegistry,
}

impl PolicySnapshot {
    pub fn builder() -> PolicySnapshotBuilder {
        PolicySnapshotBuilder::default()
    }

    /// Snapshot with no policies and no definitions.
    pub fn empty(version: SnapshotVersion) -> Self {
        Self {
            version,
            policies: Vec::new(),
            definitions: DefinitionRegistry::new(),
        }
    }

    pub fn version(&self) -> SnapshotVersion {
        self.version
    }

    /// All policies in snapshot order, inactive ones included.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Active policies in snapshot order. This order is the conflict
    /// resolution tie-break, so it is stable by construction.
    pub fn active_policies(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter().filter(|p| p.active)
    }

    pub fn definitions(&self) -> &DefinitionRegistry {
        &self.definitions
    }
}

/// Builder assembling a snapshot before it is frozen.
#[derive(Debug, Default)]
pub struct PolicySnapshotBuilder {
    version: SnapshotVersion,
    policies: Vec<Policy>,
    definitions: DefinitionRegistry,
}

impl PolicySnapshotBuilder {
    pub fn version(mut self, version: impl Into<SnapshotVersion>) -> Self {
        self.version = version.into();
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn definition(mut self, definition: AttributeDefinition) -> Self {
        self.definitions.insert(definition);
        self
    }

    pub fn build(self) -> PolicySnapshot {
        PolicySnapshot {
            version: self.version,
            policies: self.policies,
            definitions: self.definitions,
        }
    }
}

/// Convenience alias used at the request boundary for inline maps.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_default_effect_is_deny() {
        assert_eq!(Effect::default(), Effect::Deny);
    }

    #[test]
    fn test_attribute_ref_display_and_parse() {
        let field = AttributeRef::subject("role");
        assert_eq!(field.to_string(), "subject.role");

        let parsed: AttributeRef = "context.currentTime".parse().unwrap();
        assert_eq!(parsed.role, EntityRole::Context);
        assert_eq!(parsed.name, "currentTime");

        assert!(matches!(
            "norole".parse::<AttributeRef>(),
            Err(InvalidAttributeRef::MissingDot(_))
        ));
        assert!(matches!(
            "principal.role".parse::<AttributeRef>(),
            Err(InvalidAttributeRef::UnknownRole(_))
        ));
    }

    #[test]
    fn test_daily_window_contains() {
        let window = TimeWindow::daily(t(9, 0), t(17, 0));
        let at = |h, m| Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap();

        assert_eq!(window.contains(at(10, 0)), Some(true));
        // Inclusive start, exclusive end.
        assert_eq!(window.contains(at(9, 0)), Some(true));
        assert_eq!(window.contains(at(17, 0)), Some(false));
        assert_eq!(window.contains(at(22, 0)), Some(false));
    }

    #[test]
    fn test_daily_window_wraps_midnight() {
        let window = TimeWindow::daily(t(22, 0), t(6, 0));
        let at = |h| Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap();

        assert_eq!(window.contains(at(23)), Some(true));
        assert_eq!(window.contains(at(3)), Some(true));
        assert_eq!(window.contains(at(6)), Some(false));
        assert_eq!(window.contains(at(12)), Some(false));
    }

    #[test]
    fn test_absolute_window() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let window = TimeWindow::absolute(start, end);

        assert_eq!(
            window.contains(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()),
            Some(true)
        );
        assert_eq!(window.contains(start), Some(true));
        assert_eq!(window.contains(end), Some(false));
    }

    #[test]
    fn test_inverted_absolute_window_is_malformed() {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(TimeWindow::absolute(start, end).contains(start), None);
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(Operator::Equals(AttributeValue::Bool(true)).name(), "equals");
        assert_eq!(
            Operator::TimeBetween(TimeWindow::daily(t(9, 0), t(17, 0))).name(),
            "time_between"
        );
        assert_eq!(
            Operator::RequiresTicket {
                ticket_type: "change".to_string()
            }
            .name(),
            "requires_ticket"
        );
    }

    #[test]
    fn test_policy_builder() {
        let policy = Policy::new("p1", Effect::Allow)
            .with_action("read")
            .with_action("list")
            .with_condition(Rule::new(
                AttributeRef::subject("role"),
                Operator::Equals(AttributeValue::string("admin")),
            ));

        assert_eq!(policy.id, PolicyId::new("p1"));
        assert_eq!(policy.actions.len(), 2);
        assert_eq!(policy.conditions.len(), 1);
        assert!(policy.active);
        assert_eq!(policy.subject, EntitySpec::any());
    }

    #[test]
    fn test_snapshot_active_filter_keeps_order() {
        let snapshot = PolicySnapshot::builder()
            .version(3u64)
            .policy(Policy::new("a", Effect::Allow).with_action("read"))
            .policy(Policy::new("b", Effect::Deny).with_action("read").deactivated())
            .policy(Policy::new("c", Effect::Deny).with_action("read"))
            .build();

        let active: Vec<&str> = snapshot
            .active_policies()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(active, vec!["a", "c"]);
        assert_eq!(snapshot.policies().len(), 3);
        assert_eq!(u64::from(snapshot.version()), 3);
    }

    #[test]
    fn test_policy_serialization_roundtrip() {
        let policy = Policy::new("p1", Effect::Deny)
            .with_action("delete")
            .with_subject(EntitySpec::Specific(SubjectId::new("alice")))
            .with_condition(
                Rule::new(
                    AttributeRef::resource("classification"),
                    Operator::In(vec![
                        AttributeValue::string("secret"),
                        AttributeValue::string("confidential"),
                    ]),
                )
                .with_link(LogicalLink::And),
            )
            .with_condition(Rule::new(
                AttributeRef::context("currentTime"),
                Operator::TimeBetween(TimeWindow::daily(t(9, 0), t(17, 0))),
            ));

        let json = serde_json::to_string(&policy).expect("serialize policy");
        let parsed: Policy = serde_json::from_str(&json).expect("deserialize policy");
        assert_eq!(parsed, policy);
    }

    #[test]
    fn test_effect_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Effect::Allow).unwrap(), "\"allow\"");
        assert_eq!(serde_json::to_string(&Effect::Deny).unwrap(), "\"deny\"");
    }

    #[test]
    fn test_snapshot_serialization_roundtrip() {
        let snapshot = PolicySnapshot::builder()
            .version(7u64)
            .policy(Policy::new("p1", Effect::Allow).with_action("read"))
            .definition(crate::attributes::AttributeDefinition::new(
                "role",
                crate::attributes::AttributeType::String,
                EntityRole::Subject,
            ))
            .build();

        let json = serde_json::to_string(&snapshot).expect("serialize snapshot");
        let parsed: PolicySnapshot = serde_json::from_str(&json).expect("deserialize snapshot");
        assert_eq!(parsed, snapshot);
    }
}
