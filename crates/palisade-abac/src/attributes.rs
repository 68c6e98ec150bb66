//! Attribute values, definitions, and the per-request attribute environment.
//!
//! Attributes drive every decision the engine makes. They enter the system
//! from three places, in decreasing precedence:
//! 1. Inline attributes supplied on the evaluation request
//! 2. Stored attributes looked up from an [`AttributeProvider`]
//! 3. Defaults declared on an [`AttributeDefinition`]
//!
//! Resolution is pure: given the same request, provider contents, and
//! definition registry it always produces the same environment.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

// ============================================================================
// Attribute Value
// ============================================================================

/// A typed attribute value.
///
/// The engine never carries raw untyped values: everything a rule can
/// compare against is one of these variants, resolved once at snapshot
/// build or request time.
///
/// The untagged serde representation keeps wire payloads natural
/// (`{"role": "admin", "clearanceLevel": 3}`); variant order matters so
/// that RFC 3339 strings deserialize as timestamps before falling back to
/// plain strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    Timestamp(DateTime<Utc>),
    String(String),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// True for every variant except `List`.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_))
    }

    /// Variant name for traces and violation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Timestamp(_) => "timestamp",
            Self::String(_) => "string",
            Self::List(_) => "array",
        }
    }

    /// Ordering between two values of the same comparable kind.
    ///
    /// Numbers compare with IEEE semantics (`NaN` is unordered);
    /// timestamps compare as instants. Everything else is unordered.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

// ============================================================================
// Entity Role
// ============================================================================

/// Which participant of a request an attribute describes.
///
/// `Context` covers request-environment attributes (current time, risk
/// level); attribute definitions written against the management layer's
/// `environment` category deserialize into it via the serde alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRole {
    Subject,
    Resource,
    Action,
    #[serde(alias = "environment")]
    Context,
}

impl Display for EntityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Subject => "subject",
            Self::Resource => "resource",
            Self::Action => "action",
            Self::Context => "context",
        };
        write!(f, "{name}")
    }
}

/// Error produced when parsing an entity role or attribute reference fails.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown entity role {0:?} (expected subject, resource, action, or context)")]
pub struct UnknownEntityRole(pub String);

impl FromStr for EntityRole {
    type Err = UnknownEntityRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subject" => Ok(Self::Subject),
            "resource" | "object" => Ok(Self::Resource),
            "action" => Ok(Self::Action),
            "context" | "environment" => Ok(Self::Context),
            other => Err(UnknownEntityRole(other.to_string())),
        }
    }
}

// ============================================================================
// Attribute Definitions
// ============================================================================

/// Declared data type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Number,
    Boolean,
    Date,
    Array,
}

/// Value constraints a definition may impose.
///
/// `allowed_values` is the enum constraint; `min`/`max` bound numeric
/// values inclusively.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<AttributeValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl AttributeConstraints {
    /// Enum constraint: the value must be one of the given set.
    pub fn one_of(values: impl IntoIterator<Item = AttributeValue>) -> Self {
        Self {
            allowed_values: Some(values.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Inclusive numeric range constraint.
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            ..Self::default()
        }
    }
}

/// Declaration of an attribute: its name, type, the role it applies to,
/// optional constraints, and an optional default value.
///
/// Definitions are created by the management layer and are immutable once
/// loaded into a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub data_type: AttributeType,
    pub applicable_to: EntityRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<AttributeConstraints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<AttributeValue>,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, data_type: AttributeType, applicable_to: EntityRole) -> Self {
        Self {
            name: name.into(),
            data_type,
            applicable_to,
            constraints: None,
            default: None,
        }
    }

    /// Sets the constraint set.
    pub fn with_constraints(mut self, constraints: AttributeConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Sets the default value used when no value is supplied or stored.
    pub fn with_default(mut self, default: impl Into<AttributeValue>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Registry of attribute definitions keyed by `(role, name)`.
///
/// Part of the policy snapshot; the engine receives it explicitly and
/// never consults any ambient/global definition source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionRegistry {
    definitions: BTreeMap<(EntityRole, String), AttributeDefinition>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a definition, replacing any previous one for the same
    /// `(role, name)` pair.
    pub fn insert(&mut self, definition: AttributeDefinition) {
        self.definitions.insert(
            (definition.applicable_to, definition.name.clone()),
            definition,
        );
    }

    pub fn lookup(&self, role: EntityRole, name: &str) -> Option<&AttributeDefinition> {
        self.definitions.get(&(role, name.to_string()))
    }

    /// All definitions applicable to the given role, in name order.
    pub fn for_role(&self, role: EntityRole) -> impl Iterator<Item = &AttributeDefinition> {
        self.definitions
            .iter()
            .filter(move |((r, _), _)| *r == role)
            .map(|(_, def)| def)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

// ============================================================================
// Attribute Environment
// ============================================================================

/// The resolved attribute map for one evaluation.
///
/// Built fresh per request and owned exclusively by that evaluation;
/// nothing is shared or mutated across calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeEnvironment {
    values: BTreeMap<(EntityRole, String), AttributeValue>,
}

impl AttributeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, role: EntityRole, name: &str) -> Option<&AttributeValue> {
        self.values.get(&(role, name.to_string()))
    }

    pub fn insert(&mut self, role: EntityRole, name: impl Into<String>, value: AttributeValue) {
        self.values.insert((role, name.into()), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// Attribute Provider
// ============================================================================

/// Collaborator supplying stored attributes for a referenced identity.
///
/// The engine never fetches attributes over the network itself; callers
/// either inline everything on the request or hand the engine a provider
/// backed by whatever directory they maintain.
pub trait AttributeProvider {
    /// Stored attributes for `id` in the given role. Unknown identities
    /// yield an empty map, never an error.
    fn stored(&self, role: EntityRole, id: &str) -> BTreeMap<String, AttributeValue>;
}

/// Provider for callers that inline every attribute on the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStoredAttributes;

impl AttributeProvider for NoStoredAttributes {
    fn stored(&self, _role: EntityRole, _id: &str) -> BTreeMap<String, AttributeValue> {
        BTreeMap::new()
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// A constraint violation observed while resolving attributes.
///
/// Violations never abort evaluation; the offending value is dropped
/// (fail-closed) and the violation is surfaced on the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintViolation {
    /// Value is outside the definition's enum constraint.
    OutsideAllowedSet { value: AttributeValue },
    /// Numeric value below the declared minimum.
    BelowMinimum { value: f64, min: f64 },
    /// Numeric value above the declared maximum.
    AboveMaximum { value: f64, max: f64 },
}

/// One recorded resolution anomaly: which attribute, and what went wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionNote {
    pub role: EntityRole,
    pub attribute: String,
    pub violation: ConstraintViolation,
}

/// One role's slice of the environment plus anything dropped on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSlice {
    pub values: BTreeMap<String, AttributeValue>,
    pub notes: Vec<ResolutionNote>,
}

/// Resolves one role's attributes.
///
/// Precedence: inline request attributes over stored attributes over
/// definition defaults. Attributes without a registered definition are
/// carried as supplied; definitions add defaults and constraint
/// validation, they do not gate which attributes exist.
pub fn resolve(
    role: EntityRole,
    id: Option<&str>,
    inline: &BTreeMap<String, AttributeValue>,
    registry: &DefinitionRegistry,
    provider: &dyn AttributeProvider,
) -> ResolvedSlice {
    let mut values = match id {
        Some(id) => provider.stored(role, id),
        None => BTreeMap::new(),
    };

    // Inline values win over stored ones.
    for (name, value) in inline {
        values.insert(name.clone(), value.clone());
    }

    // Definition defaults fill what is still absent.
    for definition in registry.for_role(role) {
        if !values.contains_key(&definition.name) {
            if let Some(default) = &definition.default {
                values.insert(definition.name.clone(), default.clone());
            }
        }
    }

    // Constraint validation: violating values become unresolved.
    let mut notes = Vec::new();
    values.retain(|name, value| match check_constraints(role, name, value, registry) {
        None => true,
        Some(violation) => {
            warn!(
                role = %role,
                attribute = %name,
                violation = ?violation,
                "attribute dropped by constraint validation"
            );
            notes.push(ResolutionNote {
                role,
                attribute: name.clone(),
                violation,
            });
            false
        }
    });

    ResolvedSlice { values, notes }
}

/// Checks a value against its definition's constraints, if any.
fn check_constraints(
    role: EntityRole,
    name: &str,
    value: &AttributeValue,
    registry: &DefinitionRegistry,
) -> Option<ConstraintViolation> {
    let constraints = registry.lookup(role, name)?.constraints.as_ref()?;

    if let Some(allowed) = &constraints.allowed_values {
        // Array values are validated element-wise against the enum set.
        let ok = match value {
            AttributeValue::List(items) => items.iter().all(|item| allowed.contains(item)),
            scalar => allowed.contains(scalar),
        };
        if !ok {
            return Some(ConstraintViolation::OutsideAllowedSet {
                value: value.clone(),
            });
        }
    }

    if let Some(n) = value.as_number() {
        if let Some(min) = constraints.min {
            if n < min {
                return Some(ConstraintViolation::BelowMinimum { value: n, min });
            }
        }
        if let Some(max) = constraints.max {
            if n > max {
                return Some(ConstraintViolation::AboveMaximum { value: n, max });
            }
        }
    }

    None
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn attrs(pairs: &[(&str, AttributeValue)]) -> BTreeMap<String, AttributeValue> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    struct Directory;

    impl AttributeProvider for Directory {
        fn stored(&self, role: EntityRole, id: &str) -> BTreeMap<String, AttributeValue> {
            if role == EntityRole::Subject && id == "alice" {
                attrs(&[
                    ("department", AttributeValue::string("IT")),
                    ("role", AttributeValue::string("analyst")),
                ])
            } else {
                BTreeMap::new()
            }
        }
    }

    #[test]
    fn test_inline_wins_over_stored() {
        let inline = attrs(&[("role", AttributeValue::string("admin"))]);
        let slice = resolve(
            EntityRole::Subject,
            Some("alice"),
            &inline,
            &DefinitionRegistry::new(),
            &Directory,
        );

        assert_eq!(
            slice.values.get("role"),
            Some(&AttributeValue::string("admin"))
        );
        // Stored attributes not overridden are kept.
        assert_eq!(
            slice.values.get("department"),
            Some(&AttributeValue::string("IT"))
        );
        assert!(slice.notes.is_empty());
    }

    #[test]
    fn test_default_fills_absent_attribute() {
        let mut registry = DefinitionRegistry::new();
        registry.insert(
            AttributeDefinition::new("riskLevel", AttributeType::String, EntityRole::Context)
                .with_default("low"),
        );

        let slice = resolve(
            EntityRole::Context,
            None,
            &BTreeMap::new(),
            &registry,
            &NoStoredAttributes,
        );

        assert_eq!(
            slice.values.get("riskLevel"),
            Some(&AttributeValue::string("low"))
        );
    }

    #[test]
    fn test_supplied_value_beats_default() {
        let mut registry = DefinitionRegistry::new();
        registry.insert(
            AttributeDefinition::new("riskLevel", AttributeType::String, EntityRole::Context)
                .with_default("low"),
        );

        let inline = attrs(&[("riskLevel", AttributeValue::string("high"))]);
        let slice = resolve(
            EntityRole::Context,
            None,
            &inline,
            &registry,
            &NoStoredAttributes,
        );

        assert_eq!(
            slice.values.get("riskLevel"),
            Some(&AttributeValue::string("high"))
        );
    }

    #[test]
    fn test_enum_violation_drops_value_and_records_note() {
        let mut registry = DefinitionRegistry::new();
        registry.insert(
            AttributeDefinition::new("department", AttributeType::String, EntityRole::Subject)
                .with_constraints(AttributeConstraints::one_of([
                    AttributeValue::string("IT"),
                    AttributeValue::string("finance"),
                ])),
        );

        let inline = attrs(&[("department", AttributeValue::string("marketing"))]);
        let slice = resolve(
            EntityRole::Subject,
            None,
            &inline,
            &registry,
            &NoStoredAttributes,
        );

        // Fail-closed: the attribute is unresolved, not an error.
        assert!(slice.values.get("department").is_none());
        assert_eq!(slice.notes.len(), 1);
        assert_eq!(slice.notes[0].attribute, "department");
        assert!(matches!(
            slice.notes[0].violation,
            ConstraintViolation::OutsideAllowedSet { .. }
        ));
    }

    #[test]
    fn test_range_violation_drops_value() {
        let mut registry = DefinitionRegistry::new();
        registry.insert(
            AttributeDefinition::new("clearanceLevel", AttributeType::Number, EntityRole::Subject)
                .with_constraints(AttributeConstraints::range(Some(0.0), Some(5.0))),
        );

        let inline = attrs(&[("clearanceLevel", AttributeValue::Number(9.0))]);
        let slice = resolve(
            EntityRole::Subject,
            None,
            &inline,
            &registry,
            &NoStoredAttributes,
        );

        assert!(slice.values.get("clearanceLevel").is_none());
        assert!(matches!(
            slice.notes[0].violation,
            ConstraintViolation::AboveMaximum { value, max } if value == 9.0 && max == 5.0
        ));
    }

    #[test]
    fn test_undefined_attribute_passes_through() {
        let inline = attrs(&[("shoeSize", AttributeValue::Number(44.0))]);
        let slice = resolve(
            EntityRole::Subject,
            None,
            &inline,
            &DefinitionRegistry::new(),
            &NoStoredAttributes,
        );
        assert_eq!(
            slice.values.get("shoeSize"),
            Some(&AttributeValue::Number(44.0))
        );
    }

    #[test]
    fn test_value_compare() {
        let a = AttributeValue::Number(1.0);
        let b = AttributeValue::Number(2.0);
        assert_eq!(a.compare(&b), Some(Ordering::Less));

        let t1 = AttributeValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let t2 = AttributeValue::Timestamp(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(t2.compare(&t1), Some(Ordering::Greater));

        // Mixed kinds are unordered.
        assert_eq!(a.compare(&t1), None);
        assert_eq!(
            AttributeValue::string("3").compare(&AttributeValue::Number(3.0)),
            None
        );
    }

    #[test]
    fn test_nan_is_unordered_and_unequal() {
        let nan = AttributeValue::Number(f64::NAN);
        assert_eq!(nan.compare(&AttributeValue::Number(1.0)), None);
        assert_ne!(nan, nan.clone());
    }

    #[test]
    fn test_untagged_value_deserialization() {
        let v: AttributeValue = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(v, AttributeValue::string("admin"));

        let v: AttributeValue = serde_json::from_str("3.5").unwrap();
        assert_eq!(v, AttributeValue::Number(3.5));

        let v: AttributeValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, AttributeValue::Bool(true));

        // RFC 3339 strings become timestamps, not strings.
        let v: AttributeValue = serde_json::from_str("\"2024-01-01T10:00:00Z\"").unwrap();
        assert!(matches!(v, AttributeValue::Timestamp(_)));

        let v: AttributeValue = serde_json::from_str("[\"a\", 1.0]").unwrap();
        assert_eq!(
            v,
            AttributeValue::List(vec![
                AttributeValue::string("a"),
                AttributeValue::Number(1.0)
            ])
        );
    }

    #[test]
    fn test_entity_role_parsing() {
        assert_eq!("subject".parse(), Ok(EntityRole::Subject));
        assert_eq!("object".parse(), Ok(EntityRole::Resource));
        assert_eq!("environment".parse(), Ok(EntityRole::Context));
        assert!("principal".parse::<EntityRole>().is_err());
    }

    #[test]
    fn test_registry_lookup_is_role_scoped() {
        let mut registry = DefinitionRegistry::new();
        registry.insert(AttributeDefinition::new(
            "owner",
            AttributeType::String,
            EntityRole::Resource,
        ));

        assert!(registry.lookup(EntityRole::Resource, "owner").is_some());
        assert!(registry.lookup(EntityRole::Subject, "owner").is_none());
    }

    #[test]
    fn test_environment_get_and_insert() {
        let mut env = AttributeEnvironment::new();
        env.insert(EntityRole::Subject, "role", AttributeValue::string("admin"));

        assert_eq!(
            env.get(EntityRole::Subject, "role"),
            Some(&AttributeValue::string("admin"))
        );
        assert!(env.get(EntityRole::Resource, "role").is_none());
        assert_eq!(env.len(), 1);
    }
}
