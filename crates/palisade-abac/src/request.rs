//! The evaluation request: one subject, one object, one action, plus
//! context attributes.
//!
//! The transport layer normalizes its "id or inline object" unions into
//! [`EntityRef`] before anything reaches the engine, so evaluation never
//! branches on the shape of a reference.

use serde::{Deserialize, Serialize};

use palisade_types::{ActionId, ResourceId, SubjectId};

use crate::attributes::AttributeValue;
use crate::policy::AttributeMap;

// ============================================================================
// Entity Reference
// ============================================================================

/// A normalized reference to a request participant: an optional concrete
/// identity plus inline attribute overrides.
///
/// Inline attributes take precedence over anything stored against the
/// identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "Id: Serialize",
    deserialize = "Id: Deserialize<'de>"
))]
pub struct EntityRef<Id> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(default, skip_serializing_if = "AttributeMap::is_empty")]
    pub attributes: AttributeMap,
}

impl<Id> EntityRef<Id> {
    /// Reference by identity, with no inline attributes.
    pub fn by_id(id: impl Into<Id>) -> Self {
        Self {
            id: Some(id.into()),
            attributes: AttributeMap::new(),
        }
    }

    /// Anonymous reference described only by inline attributes.
    pub fn anonymous() -> Self {
        Self {
            id: None,
            attributes: AttributeMap::new(),
        }
    }

    /// Adds an inline attribute (builder pattern).
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

// ============================================================================
// Evaluation Request
// ============================================================================

/// One access question: may `subject` perform `action` on `object`?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub subject: EntityRef<SubjectId>,
    pub object: EntityRef<ResourceId>,
    pub action: ActionId,
    /// Request-environment attributes (current time, risk level, ...).
    #[serde(default, skip_serializing_if = "AttributeMap::is_empty")]
    pub context: AttributeMap,
}

impl EvaluationRequest {
    pub fn new(action: impl Into<ActionId>) -> Self {
        Self {
            subject: EntityRef::anonymous(),
            object: EntityRef::anonymous(),
            action: action.into(),
            context: AttributeMap::new(),
        }
    }

    /// Sets the subject reference.
    pub fn with_subject(mut self, subject: EntityRef<SubjectId>) -> Self {
        self.subject = subject;
        self
    }

    /// Sets the object reference.
    pub fn with_object(mut self, object: EntityRef<ResourceId>) -> Self {
        self.object = object;
        self
    }

    /// Adds a context attribute (builder pattern).
    pub fn with_context_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.context.insert(name.into(), value.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = EvaluationRequest::new("read")
            .with_subject(EntityRef::by_id("alice").with_attribute("role", "admin"))
            .with_object(EntityRef::anonymous().with_attribute("classification", "public"))
            .with_context_attribute("riskLevel", "low");

        assert_eq!(request.action, ActionId::new("read"));
        assert_eq!(request.subject.id, Some(SubjectId::new("alice")));
        assert_eq!(
            request.subject.attributes.get("role"),
            Some(&AttributeValue::string("admin"))
        );
        assert!(request.object.id.is_none());
        assert_eq!(
            request.context.get("riskLevel"),
            Some(&AttributeValue::string("low"))
        );
    }

    #[test]
    fn test_request_wire_shape() {
        let request = EvaluationRequest::new("read")
            .with_subject(EntityRef::by_id("alice"))
            .with_object(EntityRef::by_id("doc-1"));

        let json = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(json["subject"]["id"], "alice");
        assert_eq!(json["object"]["id"], "doc-1");
        assert_eq!(json["action"], "read");
        // Empty maps are omitted from the wire shape.
        assert!(json.get("context").is_none());

        let parsed: EvaluationRequest =
            serde_json::from_value(json).expect("deserialize request");
        assert_eq!(parsed, request);
    }
}
