//! # palisade-types: Core types for Palisade
//!
//! This crate contains shared identifier types used across the Palisade
//! system:
//! - Entity IDs ([`SubjectId`], [`ResourceId`], [`ActionId`], [`PolicyId`])
//! - Tenancy scoping ([`Scope`])
//! - Snapshot versioning ([`SnapshotVersion`])
//!
//! All identifiers are opaque to the evaluation engine: it only ever
//! compares them for equality, so they stay thin wrappers over their
//! backing representation.

use std::fmt::{self, Debug, Display};

use serde::{Deserialize, Serialize};

// ============================================================================
// String-backed identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:?})"), self.0)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }
    };
}

string_id! {
    /// Unique identifier for a subject (the requesting principal).
    SubjectId
}

string_id! {
    /// Unique identifier for a resource (the protected object).
    ResourceId
}

string_id! {
    /// Identifier for a protected action (e.g. `read`, `delete`).
    ActionId
}

string_id! {
    /// Unique identifier for a policy within a snapshot.
    PolicyId
}

string_id! {
    /// Tenancy scope a policy snapshot is drawn from (workspace or
    /// application boundary). Opaque to the engine; the policy store
    /// uses it to select which policies a caller may see.
    Scope
}

// ============================================================================
// Snapshot version - Copy (cheap 8-byte value)
// ============================================================================

/// Monotonic version of a policy snapshot.
///
/// Assigned by the management layer on every snapshot rebuild. The engine
/// only reads it for explainability; it never compares versions across
/// snapshots.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SnapshotVersion(u64);

impl SnapshotVersion {
    pub fn new(version: u64) -> Self {
        Self(version)
    }
}

impl Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SnapshotVersion {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SnapshotVersion> for u64 {
    fn from(version: SnapshotVersion) -> Self {
        version.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_id_display() {
        let id = SubjectId::new("alice");
        assert_eq!(id.to_string(), "alice");
        assert_eq!(id.as_str(), "alice");
    }

    #[test]
    fn test_debug_shows_type_name() {
        let id = PolicyId::new("p1");
        assert_eq!(format!("{id:?}"), "PolicyId(\"p1\")");
    }

    #[test]
    fn test_from_conversions() {
        let a: ActionId = "read".into();
        let b = ActionId::from("read".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = ResourceId::new("doc-7");
        let json = serde_json::to_string(&id).expect("serialize id");
        assert_eq!(json, "\"doc-7\"");

        let parsed: ResourceId = serde_json::from_str(&json).expect("deserialize id");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_snapshot_version_roundtrip() {
        let v = SnapshotVersion::new(42);
        assert_eq!(u64::from(v), 42);
        assert_eq!(v.to_string(), "42");
        assert_eq!(SnapshotVersion::from(42), v);
    }

    #[test]
    fn test_scope_ordering_is_stable() {
        let mut scopes = vec![Scope::new("b"), Scope::new("a"), Scope::new("c")];
        scopes.sort();
        assert_eq!(scopes[0].as_str(), "a");
        assert_eq!(scopes[2].as_str(), "c");
    }
}
