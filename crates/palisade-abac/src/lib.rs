//! # palisade-abac: Attribute-Based Access Control
//!
//! Grants or denies access to a protected action on a resource, for a
//! given subject, by evaluating policies against runtime attribute values.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Evaluation Request                          │
//! │  (Subject + Object + Action + Context)       │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Decision Engine                             │
//! │  ├─ Resolve attributes per role              │
//! │  ├─ Match candidate policies                 │
//! │  ├─ Fold condition rules left to right       │
//! │  └─ Resolve conflicts (deny-overrides)       │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Evaluation Result                           │
//! │  - Decision (Allow/Deny/NotApplicable)       │
//! │  - Applicable policies with rule traces      │
//! │  - Obligations + human-readable reason       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Evaluation is pure and synchronous: it reads one immutable
//! [`policy::PolicySnapshot`] end to end, allocates its own attribute
//! environment per request, and performs no I/O. Any number of
//! evaluations may run in parallel against a shared snapshot; the
//! surrounding [`store::PolicyStore`] swaps snapshots atomically.
//!
//! ## Examples
//!
//! ```
//! use palisade_abac::attributes::AttributeValue;
//! use palisade_abac::engine::{Decision, decide};
//! use palisade_abac::policy::{
//!     AttributeRef, Effect, EntitySpec, Operator, Policy, PolicySnapshot, Rule,
//! };
//! use palisade_abac::request::{EntityRef, EvaluationRequest};
//!
//! let snapshot = PolicySnapshot::builder()
//!     .version(1u64)
//!     .policy(
//!         Policy::new("admins-read", Effect::Allow)
//!             .with_action("read")
//!             .with_subject(EntitySpec::AttributeBased(vec![Rule::new(
//!                 AttributeRef::subject("role"),
//!                 Operator::Equals(AttributeValue::string("admin")),
//!             )])),
//!     )
//!     .build();
//!
//! let request = EvaluationRequest::new("read")
//!     .with_subject(EntityRef::by_id("alice").with_attribute("role", "admin"))
//!     .with_object(EntityRef::by_id("doc-1"));
//!
//! let result = decide(&request, &snapshot);
//! assert_eq!(result.decision, Decision::Allow);
//! ```

pub mod attributes;
pub mod engine;
pub mod evaluator;
pub mod matcher;
pub mod policy;
pub mod request;
pub mod standard;
pub mod store;

// Kani proofs for bounded model checking
#[cfg(any(test, kani))]
mod kani_proofs;

pub use attributes::{
    AttributeDefinition, AttributeEnvironment, AttributeProvider, AttributeValue,
    DefinitionRegistry, EntityRole, NoStoredAttributes,
};
pub use engine::{
    AppliedPolicy, Decision, EvaluationResult, decide, decide_via_store, decide_with_provider,
};
pub use evaluator::{Obligation, TraceEntry, TraceNote};
pub use policy::{
    AttributeRef, Effect, EntitySpec, LogicalLink, Operator, Policy, PolicySnapshot, Rule,
    TimeWindow,
};
pub use request::{EntityRef, EvaluationRequest};
pub use store::{InMemoryPolicyStore, PolicyStore, SnapshotError};
