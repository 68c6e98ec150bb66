//! The policy store collaborator.
//!
//! Supplying a snapshot is the only operation in the whole engine that can
//! fail terminally: when no snapshot can be produced there is no decision,
//! and callers must treat the absence of a decision as deny.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use palisade_types::Scope;

use crate::policy::PolicySnapshot;

/// Error type for snapshot acquisition.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The backing store could not be reached.
    #[error("policy store unavailable: {reason}")]
    Unavailable { reason: String },

    /// No snapshot has been loaded for the requested scope.
    #[error("no policy snapshot loaded for scope '{scope}'")]
    ScopeNotLoaded { scope: Scope },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Collaborator handing out immutable policy snapshots.
///
/// Implementations return only active policies within the caller's scope.
/// The engine treats the snapshot as a pure read and never mutates it.
pub trait PolicyStore {
    /// The current snapshot for `scope`.
    fn snapshot(&self, scope: &Scope) -> Result<Arc<PolicySnapshot>>;
}

/// In-memory store for embedding and tests.
///
/// Snapshots are swapped whole: readers clone the `Arc` under a short
/// lock, so an in-flight evaluation keeps the snapshot it started with
/// while the management layer publishes a replacement.
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    snapshots: RwLock<BTreeMap<Scope, Arc<PolicySnapshot>>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a snapshot for `scope`, replacing any previous one.
    /// Returns the previous snapshot, if any.
    pub fn publish(
        &self,
        scope: Scope,
        snapshot: PolicySnapshot,
    ) -> Result<Option<Arc<PolicySnapshot>>> {
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| SnapshotError::Unavailable {
                reason: "snapshot lock poisoned".to_string(),
            })?;
        Ok(snapshots.insert(scope, Arc::new(snapshot)))
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn snapshot(&self, scope: &Scope) -> Result<Arc<PolicySnapshot>> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| SnapshotError::Unavailable {
                reason: "snapshot lock poisoned".to_string(),
            })?;
        snapshots
            .get(scope)
            .cloned()
            .ok_or_else(|| SnapshotError::ScopeNotLoaded {
                scope: scope.clone(),
            })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Effect, Policy, PolicySnapshot};

    fn snapshot(version: u64) -> PolicySnapshot {
        PolicySnapshot::builder()
            .version(version)
            .policy(Policy::new("p1", Effect::Allow).with_action("read"))
            .build()
    }

    #[test]
    fn test_missing_scope_is_terminal_error() {
        let store = InMemoryPolicyStore::new();
        let err = store.snapshot(&Scope::new("acme")).unwrap_err();
        assert!(matches!(err, SnapshotError::ScopeNotLoaded { .. }));
        assert_eq!(
            err.to_string(),
            "no policy snapshot loaded for scope 'acme'"
        );
    }

    #[test]
    fn test_publish_and_read() {
        let store = InMemoryPolicyStore::new();
        store.publish(Scope::new("acme"), snapshot(1)).unwrap();

        let snap = store.snapshot(&Scope::new("acme")).unwrap();
        assert_eq!(u64::from(snap.version()), 1);
    }

    #[test]
    fn test_swap_leaves_in_flight_snapshot_intact() {
        let store = InMemoryPolicyStore::new();
        let scope = Scope::new("acme");
        store.publish(scope.clone(), snapshot(1)).unwrap();

        // An "in-flight evaluation" holds the old Arc across the swap.
        let held = store.snapshot(&scope).unwrap();
        let previous = store.publish(scope.clone(), snapshot(2)).unwrap();

        assert_eq!(u64::from(held.version()), 1);
        assert_eq!(u64::from(previous.unwrap().version()), 1);
        assert_eq!(u64::from(store.snapshot(&scope).unwrap().version()), 2);
    }

    #[test]
    fn test_scopes_are_isolated() {
        let store = InMemoryPolicyStore::new();
        store.publish(Scope::new("acme"), snapshot(1)).unwrap();

        assert!(store.snapshot(&Scope::new("acme")).is_ok());
        assert!(store.snapshot(&Scope::new("globex")).is_err());
    }
}
